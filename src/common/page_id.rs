//! Page identifier type.

use std::fmt;

use crate::common::config::PAGE_SIZE;

/// Identifies a page in the page file.
///
/// Page numbers are 1-based: page 1 is the validity-check page and page `n`
/// starts at byte `(n - 1) × PAGE_SIZE`. `PageId(0)` is the sentinel.
///
/// # Example
/// ```
/// use keeldb::PageId;
///
/// let page_id = PageId::new(42);
/// assert!(page_id.is_valid());
/// assert_eq!(page_id.0, 42);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(pub u32);

impl PageId {
    /// Invalid/sentinel page ID.
    pub const INVALID: PageId = PageId(0);

    /// The validity-check page.
    pub const FIRST: PageId = PageId(1);

    /// Create a new PageId.
    #[inline]
    pub fn new(id: u32) -> Self {
        PageId(id)
    }

    /// Check if this page ID is valid (not the sentinel value).
    #[inline]
    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }

    /// Byte offset of this page in the page file.
    ///
    /// # Panics
    /// Panics on the sentinel.
    #[inline]
    pub fn file_offset(&self) -> u64 {
        assert!(self.is_valid(), "page 0 has no file offset");
        (self.0 as u64 - 1) * PAGE_SIZE as u64
    }

    /// Cache key for this page.
    #[inline]
    pub fn key(&self) -> u64 {
        self.0 as u64
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "Page(INVALID)")
        } else {
            write!(f, "Page({})", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_id_new() {
        let pid = PageId::new(42);
        assert_eq!(pid.0, 42);
        assert!(pid.is_valid());
    }

    #[test]
    fn test_page_id_invalid() {
        assert!(!PageId::INVALID.is_valid());
        assert_eq!(PageId::INVALID.0, 0);
    }

    #[test]
    fn test_file_offset_is_one_based() {
        assert_eq!(PageId::FIRST.file_offset(), 0);
        assert_eq!(PageId::new(3).file_offset(), 2 * PAGE_SIZE as u64);
    }

    #[test]
    #[should_panic(expected = "page 0 has no file offset")]
    fn test_file_offset_of_sentinel() {
        PageId::INVALID.file_offset();
    }

    #[test]
    fn test_page_id_display() {
        assert_eq!(format!("{}", PageId::new(42)), "Page(42)");
        assert_eq!(format!("{}", PageId::INVALID), "Page(INVALID)");
    }
}
