//! Caching layer.
//!
//! Resources are kept in memory while referenced and handed back to their
//! backend when the last reference goes away.
//!
//! # Components
//! - [`RefCountCache`] / [`CacheBackend`] - The generic bounded cache
//! - [`PageCache`] - Pages of the page file, written back when dirty
//! - [`PageHandle`] - RAII reference to a cached page
//! - [`CacheStats`] - Hit/miss/eviction counters

mod cache;
mod page_cache;
mod page_guard;
mod stats;

pub use cache::{CacheBackend, RefCountCache};
pub use page_cache::PageCache;
pub use page_guard::PageHandle;
pub use stats::{CacheStats, StatsSnapshot};
