//! Disk Manager - low-level file I/O for the page file.
//!
//! The [`DiskManager`] handles all direct file operations:
//! - Reading and writing pages
//! - Appending new pages
//! - Truncating the file during recovery

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::common::config::PAGE_SIZE;
use crate::common::{file, Error, PageId, Result};
use crate::storage::page::PageData;

/// Manages disk I/O for a single page file.
///
/// # File Layout
/// ```text
/// ┌─────────┬─────────┬─────────┬─────────┬─────────┐
/// │ Page 1  │ Page 2  │ Page 3  │  ...    │ Page N  │
/// │ (8KB)   │ (8KB)   │ (8KB)   │         │ (8KB)   │
/// └─────────┴─────────┴─────────┴─────────┴─────────┘
/// Offset:  0      8192    16384    ...   (N-1)×8192
/// ```
///
/// # Thread Safety
/// `DiskManager` is **single-threaded**. The page cache serializes access to
/// it behind a mutex.
///
/// # Durability
/// Every write and allocation is followed by `fsync()`.
pub struct DiskManager {
    file: File,
    /// Number of pages in the file.
    page_count: u32,
}

impl DiskManager {
    /// Create a new page file.
    ///
    /// # Errors
    /// `Error::FileExists` if the file already exists.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = file::create_new(path.as_ref())?;

        Ok(Self {
            file,
            page_count: 0,
        })
    }

    /// Open an existing page file.
    ///
    /// A trailing partial page (a torn allocation) is not counted.
    ///
    /// # Errors
    /// `Error::FileNotExists` if the file doesn't exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = file::open_existing(path.as_ref())?;

        let file_size = file.metadata()?.len();
        let page_count = (file_size / PAGE_SIZE as u64) as u32;

        Ok(Self { file, page_count })
    }

    /// Read a page from disk.
    ///
    /// # Errors
    /// Returns `Error::PageNotFound` if the page doesn't exist.
    pub fn read_page(&mut self, page_id: PageId) -> Result<PageData> {
        self.check_exists(page_id)?;

        self.file.seek(SeekFrom::Start(page_id.file_offset()))?;

        let mut page = PageData::new();
        self.file.read_exact(page.as_mut_slice())?;

        Ok(page)
    }

    /// Write a page to disk and fsync.
    ///
    /// # Errors
    /// Returns `Error::PageNotFound` if the page hasn't been allocated.
    pub fn write_page(&mut self, page_id: PageId, page: &PageData) -> Result<()> {
        self.check_exists(page_id)?;

        self.file.seek(SeekFrom::Start(page_id.file_offset()))?;
        self.file.write_all(page.as_slice())?;
        self.file.sync_all()?;

        Ok(())
    }

    /// Append a page holding `data` and fsync.
    pub fn allocate_page(&mut self, data: &PageData) -> Result<PageId> {
        let page_id = PageId::new(self.page_count + 1);

        self.file.seek(SeekFrom::Start(page_id.file_offset()))?;
        self.file.write_all(data.as_slice())?;
        self.file.sync_all()?;

        self.page_count += 1;
        Ok(page_id)
    }

    /// Append a page holding `data` only if the file still has `expected`
    /// pages. Otherwise return the current last page and write nothing.
    pub fn allocate_page_after(&mut self, expected: u32, data: &PageData) -> Result<PageId> {
        if self.page_count != expected {
            return Ok(PageId::new(self.page_count));
        }
        self.allocate_page(data)
    }

    /// Cut the file down to its first `max_page` pages.
    pub fn truncate(&mut self, max_page: u32) -> Result<()> {
        let len = max_page as u64 * PAGE_SIZE as u64;
        self.file.set_len(len)?;
        self.file.sync_all()?;
        self.page_count = max_page;
        Ok(())
    }

    /// Get the number of pages in the file.
    #[inline]
    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    /// Get the total size of the page file in bytes.
    #[inline]
    pub fn file_size(&self) -> u64 {
        (self.page_count as u64) * (PAGE_SIZE as u64)
    }

    fn check_exists(&self, page_id: PageId) -> Result<()> {
        if !page_id.is_valid() || page_id.0 > self.page_count {
            return Err(Error::PageNotFound(page_id.0));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_create_new_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        let dm = DiskManager::create(&path).unwrap();
        assert_eq!(dm.page_count(), 0);
        assert_eq!(dm.file_size(), 0);
    }

    #[test]
    fn test_create_existing_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        DiskManager::create(&path).unwrap();
        assert!(matches!(
            DiskManager::create(&path),
            Err(Error::FileExists(_))
        ));
    }

    #[test]
    fn test_open_nonexistent_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nonexistent.db");

        assert!(matches!(
            DiskManager::open(&path),
            Err(Error::FileNotExists(_))
        ));
    }

    #[test]
    fn test_allocate_is_one_based() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        let mut dm = DiskManager::create(&path).unwrap();

        let page_id = dm.allocate_page(&PageData::from_bytes(&[0xAB])).unwrap();
        assert_eq!(page_id, PageId::new(1));
        assert_eq!(dm.page_count(), 1);

        let page = dm.read_page(page_id).unwrap();
        assert_eq!(page.as_slice()[0], 0xAB);
        assert_eq!(page.as_slice()[PAGE_SIZE - 1], 0);
    }

    #[test]
    fn test_allocate_after_stale_count() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        let mut dm = DiskManager::create(&path).unwrap();
        dm.allocate_page(&PageData::new()).unwrap();

        assert_eq!(dm.allocate_page_after(1, &PageData::new()).unwrap(), PageId::new(2));
        // Someone else already grew the file past 1
        assert_eq!(dm.allocate_page_after(1, &PageData::new()).unwrap(), PageId::new(2));
        assert_eq!(dm.page_count(), 2);
    }

    #[test]
    fn test_write_and_read_page() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        let mut dm = DiskManager::create(&path).unwrap();
        dm.allocate_page(&PageData::new()).unwrap();
        let page_id = dm.allocate_page(&PageData::new()).unwrap();

        let mut page = PageData::new();
        page.as_mut_slice()[0] = 0xAB;
        page.as_mut_slice()[100] = 0xCD;
        page.as_mut_slice()[PAGE_SIZE - 1] = 0xEF;

        dm.write_page(page_id, &page).unwrap();

        let read_page = dm.read_page(page_id).unwrap();
        assert_eq!(read_page.as_slice()[0], 0xAB);
        assert_eq!(read_page.as_slice()[100], 0xCD);
        assert_eq!(read_page.as_slice()[PAGE_SIZE - 1], 0xEF);

        // Neighbour untouched
        assert_eq!(dm.read_page(PageId::new(1)).unwrap().as_slice()[0], 0);
    }

    #[test]
    fn test_persistence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        {
            let mut dm = DiskManager::create(&path).unwrap();
            dm.allocate_page(&PageData::from_bytes(&[0x42])).unwrap();
        }

        {
            let mut dm = DiskManager::open(&path).unwrap();
            assert_eq!(dm.page_count(), 1);

            let page = dm.read_page(PageId::new(1)).unwrap();
            assert_eq!(page.as_slice()[0], 0x42);
        }
    }

    #[test]
    fn test_truncate() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        let mut dm = DiskManager::create(&path).unwrap();
        for i in 0..5u8 {
            dm.allocate_page(&PageData::from_bytes(&[i])).unwrap();
        }

        dm.truncate(2).unwrap();
        assert_eq!(dm.page_count(), 2);
        assert!(matches!(
            dm.read_page(PageId::new(3)),
            Err(Error::PageNotFound(3))
        ));
        drop(dm);

        let dm = DiskManager::open(&path).unwrap();
        assert_eq!(dm.file_size(), 2 * PAGE_SIZE as u64);
    }

    #[test]
    fn test_read_invalid_page() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        let mut dm = DiskManager::create(&path).unwrap();
        dm.allocate_page(&PageData::new()).unwrap();

        assert!(dm.read_page(PageId::INVALID).is_err());
        assert!(dm.read_page(PageId::new(2)).is_err());
    }

    #[test]
    fn test_write_invalid_page() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        let mut dm = DiskManager::create(&path).unwrap();

        let result = dm.write_page(PageId::new(1), &PageData::new());
        assert!(result.is_err());
    }
}
