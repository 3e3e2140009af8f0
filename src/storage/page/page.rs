//! Page - the fundamental 8KB unit of storage.
//!
//! [`PageData`] is the raw byte buffer that moves between disk and memory.
//! [`Page`] is a cached page: its number, its data behind a lock, and a dirty
//! flag telling the page cache whether eviction must write it back.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::common::config::PAGE_SIZE;
use crate::common::PageId;

/// Raw page contents (8KB, 4KB-aligned).
///
/// `PageData` does NOT implement `Clone` in production code; copying a page
/// should be explicit. A `#[cfg(test)]` Clone is provided for tests.
///
/// # Example
/// ```
/// use keeldb::storage::page::PageData;
///
/// let mut data = PageData::new();
/// data.as_mut_slice()[0] = 0xFF;
/// assert_eq!(data.as_slice()[0], 0xFF);
/// ```
#[repr(align(4096))]
pub struct PageData {
    data: [u8; PAGE_SIZE],
}

impl PageData {
    /// Create a new zeroed buffer.
    #[inline]
    pub fn new() -> Self {
        Self {
            data: [0u8; PAGE_SIZE],
        }
    }

    /// Build a buffer from a prefix, zero-filling the rest.
    ///
    /// # Panics
    /// Panics if `bytes` is longer than a page.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        assert!(bytes.len() <= PAGE_SIZE, "initial data larger than a page");
        let mut page = Self::new();
        page.data[..bytes.len()].copy_from_slice(bytes);
        page
    }

    /// Get immutable slice of page data.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Get mutable slice of page data.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Get the size of a page.
    #[inline]
    pub const fn size() -> usize {
        PAGE_SIZE
    }
}

impl Default for PageData {
    fn default() -> Self {
        Self::new()
    }
}

// Clone only available in tests - forces explicit copying in production
#[cfg(test)]
impl Clone for PageData {
    fn clone(&self) -> Self {
        Self::from_bytes(&self.data)
    }
}

/// A page held by the page cache.
///
/// # Thread Safety
/// - `data`: `RwLock` so callers can hold the page exclusively across a
///   read-modify-write sequence ([`Page::lock`]) or share it for reading
///   ([`Page::read`])
/// - `dirty`: `AtomicBool`, readable by the cache without taking the page lock
pub struct Page {
    page_id: PageId,
    data: RwLock<PageData>,
    dirty: AtomicBool,
}

impl Page {
    pub fn new(page_id: PageId, data: PageData) -> Self {
        Self {
            page_id,
            data: RwLock::new(data),
            dirty: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Acquire the page exclusively for mutation.
    ///
    /// Blocks while another thread holds the page.
    pub fn lock(&self) -> PageWriteGuard<'_> {
        PageWriteGuard {
            page_id: self.page_id,
            dirty: &self.dirty,
            lock: self.data.write(),
        }
    }

    /// Acquire the page for reading.
    pub fn read(&self) -> PageReadGuard<'_> {
        PageReadGuard {
            page_id: self.page_id,
            lock: self.data.read(),
        }
    }

    #[inline]
    pub fn set_dirty(&self, dirty: bool) {
        self.dirty.store(dirty, Ordering::Release);
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }
}

/// Shared access to a page's bytes.
pub struct PageReadGuard<'a> {
    page_id: PageId,
    lock: RwLockReadGuard<'a, PageData>,
}

impl PageReadGuard<'_> {
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }
}

impl Deref for PageReadGuard<'_> {
    type Target = PageData;

    #[inline]
    fn deref(&self) -> &PageData {
        &self.lock
    }
}

/// Exclusive access to a page's bytes.
///
/// Unlike a buffer pool write guard, dropping this does not mark the page
/// dirty; the page layouts call [`PageWriteGuard::set_dirty`] themselves.
pub struct PageWriteGuard<'a> {
    page_id: PageId,
    dirty: &'a AtomicBool,
    lock: RwLockWriteGuard<'a, PageData>,
}

impl PageWriteGuard<'_> {
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    #[inline]
    pub fn set_dirty(&mut self, dirty: bool) {
        self.dirty.store(dirty, Ordering::Release);
    }
}

impl Deref for PageWriteGuard<'_> {
    type Target = PageData;

    #[inline]
    fn deref(&self) -> &PageData {
        &self.lock
    }
}

impl DerefMut for PageWriteGuard<'_> {
    #[inline]
    fn deref_mut(&mut self) -> &mut PageData {
        &mut self.lock
    }
}
