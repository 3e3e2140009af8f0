//! Page cache - the page file seen through a [`RefCountCache`].
//!
//! Pages are loaded from the page file on first reference and written back
//! when the last reference is released, if they were modified.

use std::path::Path;

use parking_lot::Mutex;

use crate::buffer::cache::{CacheBackend, RefCountCache};
use crate::buffer::page_guard::PageHandle;
use crate::buffer::stats::CacheStats;
use crate::common::config::{DB_FILE_SUFFIX, MIN_CACHED_PAGES};
use crate::common::{file, EngineConfig, Error, PageId, Result};
use crate::storage::page::{Page, PageData};
use crate::storage::DiskManager;

struct PageBackend {
    disk: Mutex<DiskManager>,
}

impl PageBackend {
    fn flush(&self, page: &Page) -> Result<()> {
        let data = page.read();
        self.disk.lock().write_page(page.page_id(), &data)?;
        page.set_dirty(false);
        Ok(())
    }
}

impl CacheBackend for PageBackend {
    type Item = Page;

    fn load(&self, key: u64) -> Result<Page> {
        let page_id = PageId::new(key as u32);
        let data = self.disk.lock().read_page(page_id)?;
        Ok(Page::new(page_id, data))
    }

    fn evict(&self, page: &Page) -> Result<()> {
        if page.is_dirty() {
            log::debug!("writing back page {}", page.page_id());
            self.flush(page)?;
        }
        Ok(())
    }
}

/// Caches pages of `<path>.db`.
///
/// # Thread Safety
/// Lock order is cache mutex, then page lock, then disk mutex. Eviction
/// takes all three; loads take only the disk mutex. Never call
/// [`PageCache::flush_page`] while holding the page's write guard.
pub struct PageCache {
    cache: RefCountCache<PageBackend>,
}

impl PageCache {
    /// Create `<path>.db` and a cache sized by `config`.
    ///
    /// # Errors
    /// - `Error::MemTooSmall` if the budget holds fewer than
    ///   [`MIN_CACHED_PAGES`] pages
    /// - `Error::FileExists` if the page file is already there
    pub fn create(path: &Path, config: &EngineConfig) -> Result<Self> {
        let capacity = Self::capacity_for(config)?;
        let db_path = file::with_suffix(path, DB_FILE_SUFFIX);
        let disk = DiskManager::create(&db_path)?;
        log::info!("created page file {}", db_path.display());
        Ok(Self::with_disk(disk, capacity))
    }

    /// Open an existing `<path>.db`.
    pub fn open(path: &Path, config: &EngineConfig) -> Result<Self> {
        let capacity = Self::capacity_for(config)?;
        let db_path = file::with_suffix(path, DB_FILE_SUFFIX);
        let disk = DiskManager::open(&db_path)?;
        log::info!(
            "opened page file {} ({} pages)",
            db_path.display(),
            disk.page_count()
        );
        Ok(Self::with_disk(disk, capacity))
    }

    fn capacity_for(config: &EngineConfig) -> Result<usize> {
        let pages = config.cached_pages();
        if pages < MIN_CACHED_PAGES {
            return Err(Error::MemTooSmall {
                pages,
                min: MIN_CACHED_PAGES,
            });
        }
        Ok(pages)
    }

    fn with_disk(disk: DiskManager, capacity: usize) -> Self {
        let backend = PageBackend {
            disk: Mutex::new(disk),
        };
        Self {
            cache: RefCountCache::new(backend, capacity),
        }
    }

    /// Reference page `page_id`, reading it from disk if it isn't cached.
    ///
    /// # Errors
    /// - `Error::CacheFull` if every slot is referenced
    /// - `Error::PageNotFound` if the page is past the end of the file
    pub fn get_page(&self, page_id: PageId) -> Result<PageHandle<'_>> {
        let page = self.cache.get(page_id.key())?;
        Ok(PageHandle::new(self, page))
    }

    /// Same as [`PageHandle::release`].
    pub fn release(&self, handle: PageHandle<'_>) -> Result<()> {
        handle.release()
    }

    pub(crate) fn release_page(&self, page_id: PageId) -> Result<()> {
        self.cache.release(page_id.key())
    }

    /// Append a page holding `init` to the page file.
    ///
    /// The page is written through to disk before its id is returned; it is
    /// not referenced afterwards.
    pub fn new_page(&self, init: &PageData) -> Result<PageId> {
        self.cache.backend().disk.lock().allocate_page(init)
    }

    /// Append a page holding `init` unless the file already grew past
    /// `expected` pages; either way return the last page.
    ///
    /// The count check and the append happen under the disk mutex, so
    /// concurrent callers that saw the same count add one page between them.
    pub fn new_page_after(&self, expected: u32, init: &PageData) -> Result<PageId> {
        self.cache
            .backend()
            .disk
            .lock()
            .allocate_page_after(expected, init)
    }

    /// Write `page` to disk now and clear its dirty flag.
    pub fn flush_page(&self, page: &Page) -> Result<()> {
        self.cache.backend().flush(page)
    }

    /// Cut the page file down to `max_page` pages.
    ///
    /// Only used by recovery, before any page above `max_page` is cached.
    pub fn truncate_by_page_id(&self, max_page: u32) -> Result<()> {
        self.cache.backend().disk.lock().truncate(max_page)
    }

    /// Number of pages in the page file.
    pub fn page_count(&self) -> u32 {
        self.cache.backend().disk.lock().page_count()
    }

    /// Write back every dirty cached page and empty the cache.
    pub fn close(&self) -> Result<()> {
        self.cache.close()
    }

    /// Maximum number of cached pages.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.cache.capacity()
    }

    /// Pages currently cached or being loaded.
    pub fn resident_count(&self) -> usize {
        self.cache.resident_count()
    }

    #[inline]
    pub fn stats(&self) -> &CacheStats {
        self.cache.stats()
    }
}
