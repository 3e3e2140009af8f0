//! Reference-counted resource cache.
//!
//! [`RefCountCache`] keeps at most `capacity` resources resident. A resource
//! stays resident while anyone holds a reference to it and is handed to the
//! backend's eviction hook as soon as its count drops to zero. There is no
//! replacement policy: when the cache is full, `get` fails fast with
//! [`Error::CacheFull`] instead of choosing a victim.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::buffer::stats::CacheStats;
use crate::common::{Error, Result};

/// Loads and evicts the resources held by a [`RefCountCache`].
///
/// `load` runs without the cache mutex held; `evict` runs with it held, so
/// an eviction is complete before the same key can be loaded again.
pub trait CacheBackend {
    type Item;

    /// Bring the resource for `key` into memory.
    fn load(&self, key: u64) -> Result<Self::Item>;

    /// Called once the last reference to a resource is released.
    fn evict(&self, item: &Self::Item) -> Result<()>;
}

struct CacheState<T> {
    resident: HashMap<u64, Arc<T>>,
    refs: HashMap<u64, u32>,
    /// Keys whose load is in progress.
    loading: HashSet<u64>,
    /// Resident plus in-flight resources.
    count: usize,
}

/// A bounded cache of reference-counted resources.
///
/// # Thread Safety
/// One mutex guards the bookkeeping. A thread asking for a key that another
/// thread is loading waits on `loaded` until that load finishes, then
/// retries from the top.
///
/// # Example
/// ```ignore
/// let cache = RefCountCache::new(backend, 16);
/// let item = cache.get(7)?;
/// // ... use item ...
/// cache.release(7)?;
/// ```
pub struct RefCountCache<B: CacheBackend> {
    backend: B,
    /// 0 means unbounded.
    capacity: usize,
    state: Mutex<CacheState<B::Item>>,
    loaded: Condvar,
    stats: CacheStats,
}

impl<B: CacheBackend> RefCountCache<B> {
    pub fn new(backend: B, capacity: usize) -> Self {
        Self {
            backend,
            capacity,
            state: Mutex::new(CacheState {
                resident: HashMap::new(),
                refs: HashMap::new(),
                loading: HashSet::new(),
                count: 0,
            }),
            loaded: Condvar::new(),
            stats: CacheStats::new(),
        }
    }

    /// Acquire a reference to `key`, loading it if needed.
    ///
    /// # Errors
    /// - `Error::CacheFull` if `capacity` resources are already resident
    /// - Whatever the backend's `load` returns
    pub fn get(&self, key: u64) -> Result<Arc<B::Item>> {
        let mut state = self.state.lock();

        loop {
            if state.loading.contains(&key) {
                self.loaded.wait(&mut state);
                continue;
            }

            if let Some(item) = state.resident.get(&key).cloned() {
                *state.refs.entry(key).or_insert(0) += 1;
                self.stats.record_hit();
                return Ok(item);
            }

            if self.capacity > 0 && state.count == self.capacity {
                self.stats.record_rejected();
                return Err(Error::CacheFull);
            }

            state.count += 1;
            state.loading.insert(key);
            break;
        }

        self.stats.record_miss();
        let loaded = MutexGuard::unlocked(&mut state, || self.backend.load(key));

        state.loading.remove(&key);
        let result = match loaded {
            Ok(item) => {
                let item = Arc::new(item);
                state.resident.insert(key, Arc::clone(&item));
                state.refs.insert(key, 1);
                Ok(item)
            }
            Err(e) => {
                state.count -= 1;
                Err(e)
            }
        };
        drop(state);

        self.loaded.notify_all();
        result
    }

    /// Drop one reference to `key`. The last reference evicts it.
    ///
    /// The entry is removed even when the eviction hook fails; the hook's
    /// error is returned.
    ///
    /// # Errors
    /// `Error::NotReferenced` if nobody holds `key`.
    pub fn release(&self, key: u64) -> Result<()> {
        let mut state = self.state.lock();

        let refs = state.refs.get_mut(&key).ok_or(Error::NotReferenced(key))?;
        *refs -= 1;
        if *refs > 0 {
            return Ok(());
        }

        state.refs.remove(&key);
        state.count -= 1;
        let evicted = match state.resident.remove(&key) {
            Some(item) => {
                self.stats.record_eviction();
                self.backend.evict(&item)
            }
            None => Ok(()),
        };
        drop(state);

        evicted
    }

    /// Evict every resident resource, ignoring reference counts.
    ///
    /// Every resource is attempted; the first error is returned.
    pub fn close(&self) -> Result<()> {
        let mut state = self.state.lock();
        let mut first_err = None;

        let resident: Vec<_> = state.resident.drain().collect();
        for (key, item) in resident {
            self.stats.record_eviction();
            if let Err(e) = self.backend.evict(&item) {
                log::error!("evicting key {} on close failed: {}", key, e);
                first_err.get_or_insert(e);
            }
        }

        state.refs.clear();
        state.count = state.loading.len();

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Resident plus in-flight resources.
    pub fn resident_count(&self) -> usize {
        self.state.lock().count
    }

    /// References held on `key` (0 if not resident).
    pub fn ref_count(&self, key: u64) -> u32 {
        self.state.lock().refs.get(&key).copied().unwrap_or(0)
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    const FAILING_KEY: u64 = 13;

    #[derive(Default)]
    struct TestBackend {
        loads: AtomicUsize,
        evicted: Mutex<Vec<u64>>,
        load_delay: Option<Duration>,
        fail_evict: bool,
    }

    impl CacheBackend for TestBackend {
        type Item = u64;

        fn load(&self, key: u64) -> Result<u64> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.load_delay {
                thread::sleep(delay);
            }
            if key == FAILING_KEY {
                return Err(Error::PageNotFound(key as u32));
            }
            Ok(key * 10)
        }

        fn evict(&self, item: &u64) -> Result<()> {
            self.evicted.lock().push(*item / 10);
            if self.fail_evict {
                return Err(Error::CacheFull);
            }
            Ok(())
        }
    }

    #[test]
    fn test_get_loads_once() {
        let cache = RefCountCache::new(TestBackend::default(), 4);

        assert_eq!(*cache.get(1).unwrap(), 10);
        assert_eq!(*cache.get(1).unwrap(), 10);

        assert_eq!(cache.backend().loads.load(Ordering::SeqCst), 1);
        assert_eq!(cache.ref_count(1), 2);
        assert_eq!(cache.resident_count(), 1);

        let snapshot = cache.stats().snapshot();
        assert_eq!(snapshot.hits, 1);
        assert_eq!(snapshot.misses, 1);
    }

    #[test]
    fn test_release_to_zero_evicts() {
        let cache = RefCountCache::new(TestBackend::default(), 4);

        cache.get(2).unwrap();
        cache.get(2).unwrap();

        cache.release(2).unwrap();
        assert!(cache.backend().evicted.lock().is_empty());
        assert_eq!(cache.resident_count(), 1);

        cache.release(2).unwrap();
        assert_eq!(*cache.backend().evicted.lock(), vec![2]);
        assert_eq!(cache.resident_count(), 0);
        assert_eq!(cache.ref_count(2), 0);

        // Reloaded after eviction
        cache.get(2).unwrap();
        assert_eq!(cache.backend().loads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_release_unreferenced() {
        let cache = RefCountCache::new(TestBackend::default(), 4);
        assert!(matches!(cache.release(9), Err(Error::NotReferenced(9))));

        cache.get(9).unwrap();
        cache.release(9).unwrap();
        assert!(matches!(cache.release(9), Err(Error::NotReferenced(9))));
    }

    #[test]
    fn test_full_cache_rejects() {
        let cache = RefCountCache::new(TestBackend::default(), 2);

        cache.get(1).unwrap();
        cache.get(2).unwrap();
        assert!(matches!(cache.get(3), Err(Error::CacheFull)));

        // Resident keys still hit
        cache.get(1).unwrap();

        cache.release(2).unwrap();
        assert_eq!(*cache.get(3).unwrap(), 30);
        assert_eq!(cache.stats().snapshot().rejected, 1);
    }

    #[test]
    fn test_zero_capacity_is_unbounded() {
        let cache = RefCountCache::new(TestBackend::default(), 0);
        for key in 0..100 {
            cache.get(key).unwrap();
        }
        assert_eq!(cache.resident_count(), 100);
    }

    #[test]
    fn test_failed_load_unwinds() {
        let cache = RefCountCache::new(TestBackend::default(), 1);

        assert!(matches!(
            cache.get(FAILING_KEY),
            Err(Error::PageNotFound(13))
        ));
        assert_eq!(cache.resident_count(), 0);
        assert_eq!(cache.ref_count(FAILING_KEY), 0);

        // The slot was given back
        cache.get(1).unwrap();
    }

    #[test]
    fn test_failed_evict_still_removes() {
        let backend = TestBackend {
            fail_evict: true,
            ..Default::default()
        };
        let cache = RefCountCache::new(backend, 1);

        cache.get(5).unwrap();
        assert!(cache.release(5).is_err());
        assert_eq!(cache.resident_count(), 0);
        assert!(matches!(cache.release(5), Err(Error::NotReferenced(5))));
    }

    #[test]
    fn test_close_evicts_everything() {
        let cache = RefCountCache::new(TestBackend::default(), 4);

        cache.get(1).unwrap();
        cache.get(2).unwrap();
        cache.get(2).unwrap();

        cache.close().unwrap();

        let mut evicted = cache.backend().evicted.lock().clone();
        evicted.sort_unstable();
        assert_eq!(evicted, vec![1, 2]);
        assert_eq!(cache.resident_count(), 0);
        assert_eq!(cache.ref_count(2), 0);
    }

    #[test]
    fn test_close_reports_first_error() {
        let backend = TestBackend {
            fail_evict: true,
            ..Default::default()
        };
        let cache = RefCountCache::new(backend, 4);
        cache.get(1).unwrap();
        cache.get(2).unwrap();

        assert!(matches!(cache.close(), Err(Error::CacheFull)));
        // Both were attempted
        assert_eq!(cache.backend().evicted.lock().len(), 2);
    }

    #[test]
    fn test_concurrent_get_same_key_loads_once() {
        let backend = TestBackend {
            load_delay: Some(Duration::from_millis(50)),
            ..Default::default()
        };
        let cache = Arc::new(RefCountCache::new(backend, 4));
        let mut handles = vec![];

        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            handles.push(thread::spawn(move || *cache.get(42).unwrap()));
        }

        for handle in handles {
            assert_eq!(handle.join().unwrap(), 420);
        }

        assert_eq!(cache.backend().loads.load(Ordering::SeqCst), 1);
        assert_eq!(cache.ref_count(42), 8);
        assert_eq!(cache.resident_count(), 1);
    }
}
