//! Normal data page layout.
//!
//! # Layout
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       2     free space offset (FSO, big-endian u16)
//! 2       ...   data items, appended at FSO
//! ```
//!
//! Bytes `[FSO, PAGE_SIZE)` are free. Normal inserts only ever move FSO
//! forward; the two `recover_*` writers exist for crash recovery and write
//! at a logged offset regardless of FSO.

use crate::common::config::PAGE_SIZE;
use crate::common::{Error, Result};
use crate::storage::page::{PageData, PageWriteGuard};

const FSO_OFFSET: usize = 0;
const DATA_OFFSET: usize = 2;

/// Most bytes a single normal page can hold.
pub const MAX_FREE_SPACE: usize = PAGE_SIZE - DATA_OFFSET;

/// A fresh normal page: empty, FSO pointing just past the header.
pub fn init_data() -> PageData {
    let mut data = PageData::new();
    set_fso(&mut data, DATA_OFFSET as u16);
    data
}

/// Current free space offset.
pub fn fso(data: &PageData) -> u16 {
    let raw = &data.as_slice()[FSO_OFFSET..DATA_OFFSET];
    u16::from_be_bytes([raw[0], raw[1]])
}

fn set_fso(data: &mut PageData, offset: u16) {
    data.as_mut_slice()[FSO_OFFSET..DATA_OFFSET].copy_from_slice(&offset.to_be_bytes());
}

/// Bytes left between FSO and the end of the page.
pub fn free_space(data: &PageData) -> usize {
    PAGE_SIZE.saturating_sub(fso(data) as usize)
}

/// Append `raw` at FSO and return the offset it was written at.
///
/// The caller logs an insert record carrying this same offset before
/// calling, while still holding the page lock.
pub fn insert(page: &mut PageWriteGuard<'_>, raw: &[u8]) -> Result<u16> {
    let offset = fso(page);
    check_bounds(page, offset as usize, raw.len())?;

    page.set_dirty(true);
    let start = offset as usize;
    page.as_mut_slice()[start..start + raw.len()].copy_from_slice(raw);
    set_fso(page, offset + raw.len() as u16);

    Ok(offset)
}

/// Write `raw` at `offset`, raising FSO if the write ends past it.
///
/// Applying the same insert twice leaves the page unchanged, which is what
/// lets recovery redo inserts that may already be on disk.
pub fn recover_insert(page: &mut PageWriteGuard<'_>, raw: &[u8], offset: u16) -> Result<()> {
    check_bounds(page, offset as usize, raw.len())?;

    page.set_dirty(true);
    let start = offset as usize;
    page.as_mut_slice()[start..start + raw.len()].copy_from_slice(raw);

    let end = offset + raw.len() as u16;
    if fso(page) < end {
        set_fso(page, end);
    }
    Ok(())
}

/// Write `raw` at `offset`. FSO is left alone.
pub fn recover_update(page: &mut PageWriteGuard<'_>, raw: &[u8], offset: u16) -> Result<()> {
    check_bounds(page, offset as usize, raw.len())?;

    page.set_dirty(true);
    let start = offset as usize;
    page.as_mut_slice()[start..start + raw.len()].copy_from_slice(raw);
    Ok(())
}

fn check_bounds(page: &PageWriteGuard<'_>, offset: usize, len: usize) -> Result<()> {
    if offset < DATA_OFFSET || offset + len > PAGE_SIZE {
        return Err(Error::PageOverflow {
            page: page.page_id().0,
            offset,
            len,
        });
    }
    Ok(())
}
