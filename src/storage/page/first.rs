//! First page layout: the validity check.
//!
//! # Layout
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 100     8     open stamp (random, written at every open)
//! 108     8     close stamp (copy of the open stamp, written at clean close)
//! ```
//!
//! If the two stamps differ at startup the previous session never reached
//! its clean shutdown and the log has to be replayed.

use rand::Rng;

use crate::storage::page::{PageData, PageWriteGuard};

const VC_OFFSET: usize = 100;
const VC_LEN: usize = 8;

/// A fresh first page carrying a new open stamp.
pub fn init_data() -> PageData {
    let mut data = PageData::new();
    stamp_open(&mut data);
    data
}

/// Write a new random open stamp.
pub fn set_vc_open(page: &mut PageWriteGuard<'_>) {
    page.set_dirty(true);
    stamp_open(page);
}

fn stamp_open(data: &mut PageData) {
    let stamp: [u8; VC_LEN] = rand::thread_rng().gen();
    data.as_mut_slice()[VC_OFFSET..VC_OFFSET + VC_LEN].copy_from_slice(&stamp);
}

/// Copy the open stamp into the close slot.
pub fn set_vc_close(page: &mut PageWriteGuard<'_>) {
    page.set_dirty(true);
    page.as_mut_slice()
        .copy_within(VC_OFFSET..VC_OFFSET + VC_LEN, VC_OFFSET + VC_LEN);
}

/// `true` if the last session shut down cleanly.
pub fn check_vc(data: &PageData) -> bool {
    let bytes = data.as_slice();
    bytes[VC_OFFSET..VC_OFFSET + VC_LEN] == bytes[VC_OFFSET + VC_LEN..VC_OFFSET + 2 * VC_LEN]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::PageId;
    use crate::storage::page::Page;

    #[test]
    fn test_fresh_page_fails_check() {
        // A zero stamp is astronomically unlikely; the close slot is zero.
        let data = init_data();
        assert!(!check_vc(&data));
    }

    #[test]
    fn test_close_then_check() {
        let page = Page::new(PageId::FIRST, init_data());
        let mut guard = page.lock();

        set_vc_close(&mut guard);
        assert!(check_vc(&guard));
        assert_eq!(&guard.as_slice()[100..108], &guard.as_slice()[108..116]);
        drop(guard);
        assert!(page.is_dirty());
    }

    #[test]
    fn test_reopen_invalidates_check() {
        let page = Page::new(PageId::FIRST, init_data());
        let mut guard = page.lock();

        set_vc_close(&mut guard);
        let closed = guard.as_slice()[100..108].to_vec();

        set_vc_open(&mut guard);
        assert_ne!(&guard.as_slice()[100..108], &closed[..]);
        assert!(!check_vc(&guard));
    }

    #[test]
    fn test_stamps_leave_other_bytes_alone() {
        let page = Page::new(PageId::FIRST, init_data());
        let mut guard = page.lock();
        set_vc_close(&mut guard);

        assert!(guard.as_slice()[..100].iter().all(|&b| b == 0));
        assert!(guard.as_slice()[116..].iter().all(|&b| b == 0));
    }
}
