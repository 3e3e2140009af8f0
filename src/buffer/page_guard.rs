//! RAII handle for cached pages.
//!
//! A [`PageHandle`] holds one reference to a page in the [`PageCache`].
//! Releasing it explicitly with [`PageHandle::release`] reports eviction
//! errors; dropping it releases too, logging any error.

use std::ops::Deref;
use std::sync::Arc;

use crate::buffer::PageCache;
use crate::common::{PageId, Result};
use crate::storage::page::Page;

/// A referenced page.
///
/// # Example
/// ```ignore
/// let page = page_cache.get_page(page_id)?;
/// let fso = normal::fso(&page.read());
/// page.release()?;
/// ```
pub struct PageHandle<'a> {
    cache: &'a PageCache,
    page: Arc<Page>,
    released: bool,
}

impl<'a> PageHandle<'a> {
    /// Called by `PageCache::get_page()`.
    pub(crate) fn new(cache: &'a PageCache, page: Arc<Page>) -> Self {
        Self {
            cache,
            page,
            released: false,
        }
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page.page_id()
    }

    /// Give the reference back to the cache.
    ///
    /// If this was the last reference and the page is dirty it is written
    /// back now, and a failed write is returned here.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.cache.release_page(self.page.page_id())
    }
}

impl Deref for PageHandle<'_> {
    type Target = Page;

    #[inline]
    fn deref(&self) -> &Page {
        &self.page
    }
}

impl Drop for PageHandle<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.cache.release_page(self.page.page_id()) {
            log::error!("releasing page {} failed: {}", self.page.page_id(), e);
        }
    }
}
