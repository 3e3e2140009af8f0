//! Data item identifier.

use std::fmt;

use crate::common::PageId;

/// Stable identifier of a data item: page number and in-page offset packed
/// into one `u64`.
///
/// ```text
///  63            32 31      16 15         0
/// ┌────────────────┬──────────┬────────────┐
/// │    page_no     │  unused  │   offset   │
/// └────────────────┴──────────┴────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Uid(pub u64);

impl Uid {
    /// Pack a page and offset.
    #[inline]
    pub fn new(page_id: PageId, offset: u16) -> Self {
        Uid(((page_id.0 as u64) << 32) | offset as u64)
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        PageId((self.0 >> 32) as u32)
    }

    #[inline]
    pub fn offset(&self) -> u16 {
        (self.0 & 0xFFFF) as u16
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Uid({}:{})", self.page_id().0, self.offset())
    }
}
