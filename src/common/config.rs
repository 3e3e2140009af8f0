//! Configuration for KeelDB.
//!
//! Build-time constants shared by every component live here, together with
//! [`EngineConfig`], the runtime knobs passed to [`crate::Engine`].

/// Size of a page in bytes (8KB).
///
/// Every component agrees on this value: the page file is a sequence of
/// `PAGE_SIZE` blocks, and the free space offset of a normal page is a
/// `u16`, so the page size must stay below 64KB.
pub const PAGE_SIZE: usize = 1 << 13;

/// Minimum number of pages the page cache must be able to hold.
pub const MIN_CACHED_PAGES: usize = 10;

/// Suffix of the transaction status file.
pub const XID_FILE_SUFFIX: &str = "xid";

/// Suffix of the write-ahead log file.
pub const LOG_FILE_SUFFIX: &str = "log";

/// Suffix of the page file.
pub const DB_FILE_SUFFIX: &str = "db";

/// How the redo pass treats the payload of an insert record before writing
/// it back to its page.
///
/// The data item layer keeps a valid flag in the first byte of every raw
/// item. Redoing an insert re-establishes the bytes; this policy decides
/// whether the flag is cleared first.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum RedoInsertInvalidation {
    /// Only inserts of aborted transactions are marked invalid before being
    /// redone. Committed inserts are redone verbatim.
    #[default]
    AbortedOnly,
    /// Every redone insert is marked invalid before being written.
    Always,
}

/// Runtime configuration for an [`crate::Engine`].
///
/// # Presets
/// - [`EngineConfig::default()`] - 64MB page cache
/// - [`EngineConfig::small()`] - the smallest legal page cache, handy in tests
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Memory budget of the page cache in bytes. The cache holds at most
    /// `page_cache_bytes / PAGE_SIZE` pages at a time.
    pub page_cache_bytes: u64,
    /// Insert handling during the redo pass of crash recovery.
    pub redo_insert_invalidation: RedoInsertInvalidation,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            page_cache_bytes: 64 << 20,
            redo_insert_invalidation: RedoInsertInvalidation::default(),
        }
    }
}

impl EngineConfig {
    /// A config whose page cache holds exactly [`MIN_CACHED_PAGES`] pages.
    pub fn small() -> Self {
        Self {
            page_cache_bytes: (MIN_CACHED_PAGES * PAGE_SIZE) as u64,
            ..Default::default()
        }
    }

    /// Number of pages the page cache may hold.
    pub fn cached_pages(&self) -> usize {
        (self.page_cache_bytes / PAGE_SIZE as u64) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size_fits_free_space_offset() {
        assert!(PAGE_SIZE.is_power_of_two());
        assert!(PAGE_SIZE <= u16::MAX as usize);
    }

    #[test]
    fn test_cached_pages() {
        assert_eq!(EngineConfig::small().cached_pages(), MIN_CACHED_PAGES);
        assert_eq!(EngineConfig::default().cached_pages(), 8192);
    }

    #[test]
    fn test_default_policy() {
        assert_eq!(
            EngineConfig::default().redo_insert_invalidation,
            RedoInsertInvalidation::AbortedOnly
        );
    }
}
