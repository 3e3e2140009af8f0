//! Engine - the three durable stores opened together.
//!
//! An engine at `path` owns `path.xid`, `path.log` and `path.db`. Page 1 of
//! the page file carries the validity check: a stamp written at open and
//! copied at clean close. A mismatch at open means the previous session
//! crashed, and the log is replayed before the engine is handed out.

use std::path::{Path, PathBuf};

use crate::buffer::PageCache;
use crate::common::config::PAGE_SIZE;
use crate::common::{EngineConfig, Error, PageId, Result, Uid};
use crate::concurrency::{TransactionManager, TransactionStatus, Xid};
use crate::recovery::{recover_with, LogRecord, Logger, RecoveryOptions, RecoveryReport};
use crate::storage::data_item::DataItem;
use crate::storage::page::{first, normal};

/// An in-place change of a data item, as logged by [`Engine::update`].
struct ItemUpdate<'a> {
    uid: Uid,
    old: &'a [u8],
    new: &'a [u8],
}

impl DataItem for ItemUpdate<'_> {
    fn uid(&self) -> Uid {
        self.uid
    }

    fn data(&self) -> &[u8] {
        self.new
    }

    fn old_data(&self) -> &[u8] {
        self.old
    }
}

/// Transaction status, log and page cache of one database.
///
/// # Example
/// ```no_run
/// use keeldb::{Engine, EngineConfig};
///
/// let engine = Engine::create("my_database", EngineConfig::default())?;
/// let xid = engine.begin()?;
/// let uid = engine.insert(xid, b"\x00\x00\x05hello")?;
/// engine.commit(xid)?;
/// assert_eq!(engine.read(uid, 8)?, b"\x00\x00\x05hello");
/// engine.close()?;
/// # Ok::<(), keeldb::Error>(())
/// ```
///
/// Dropping an engine without [`Engine::close`] leaves the files as a crash
/// would; the next [`Engine::open`] recovers.
pub struct Engine {
    path: PathBuf,
    config: EngineConfig,
    tm: TransactionManager,
    logger: Logger,
    pc: PageCache,
}

impl Engine {
    /// Create a new database at `path`.
    ///
    /// # Errors
    /// `Error::FileExists` if any of the three files is already there.
    pub fn create<P: AsRef<Path>>(path: P, config: EngineConfig) -> Result<Self> {
        let path = path.as_ref();
        let tm = TransactionManager::create(path)?;
        let logger = Logger::create(path)?;
        let pc = PageCache::create(path, &config)?;

        pc.new_page(&first::init_data())?;
        log::info!("created database {}", path.display());

        Ok(Self {
            path: path.to_path_buf(),
            config,
            tm,
            logger,
            pc,
        })
    }

    /// Open an existing database, recovering it if it was not closed
    /// cleanly.
    pub fn open<P: AsRef<Path>>(path: P, config: EngineConfig) -> Result<Self> {
        let path = path.as_ref();
        let tm = TransactionManager::open(path)?;
        let logger = Logger::open(path)?;
        let pc = PageCache::open(path, &config)?;

        let engine = Self {
            path: path.to_path_buf(),
            config,
            tm,
            logger,
            pc,
        };

        if !engine.check_first_page()? {
            log::warn!(
                "{} was not closed cleanly, replaying the log",
                path.display()
            );
            engine.recover()?;
        }
        engine.stamp_open()?;

        log::info!("opened database {}", path.display());
        Ok(engine)
    }

    /// Write back every page and mark the shutdown clean.
    pub fn close(self) -> Result<()> {
        self.pc.close()?;

        let page = self.pc.get_page(PageId::FIRST)?;
        {
            let mut guard = page.lock();
            first::set_vc_close(&mut guard);
        }
        let flushed = self.pc.flush_page(&page);
        let released = page.release();
        flushed?;
        released?;

        log::info!("closed database {}", self.path.display());
        Ok(())
    }

    /// Replay the log against the page file.
    ///
    /// `open` does this on its own after a crash.
    pub fn recover(&self) -> Result<RecoveryReport> {
        let options = RecoveryOptions {
            redo_insert_invalidation: self.config.redo_insert_invalidation,
        };
        recover_with(&self.tm, &self.logger, &self.pc, &options)
    }

    fn check_first_page(&self) -> Result<bool> {
        let page = self.pc.get_page(PageId::FIRST)?;
        let clean = first::check_vc(&page.read());
        page.release()?;
        Ok(clean)
    }

    fn stamp_open(&self) -> Result<()> {
        let page = self.pc.get_page(PageId::FIRST)?;
        {
            let mut guard = page.lock();
            first::set_vc_open(&mut guard);
        }
        let flushed = self.pc.flush_page(&page);
        let released = page.release();
        flushed?;
        released
    }

    pub fn begin(&self) -> Result<Xid> {
        self.tm.begin()
    }

    pub fn commit(&self, xid: Xid) -> Result<()> {
        self.tm.commit(xid)
    }

    pub fn abort(&self, xid: Xid) -> Result<()> {
        self.tm.abort(xid)
    }

    pub fn is_active(&self, xid: Xid) -> Result<bool> {
        self.tm.is_active(xid)
    }

    pub fn is_committed(&self, xid: Xid) -> Result<bool> {
        self.tm.is_committed(xid)
    }

    pub fn is_aborted(&self, xid: Xid) -> Result<bool> {
        self.tm.is_aborted(xid)
    }

    pub fn status(&self, xid: Xid) -> Result<TransactionStatus> {
        self.tm.status(xid)
    }

    /// Append a raw data item on behalf of `xid`.
    ///
    /// The item goes to the last page if it fits there, otherwise to a
    /// fresh page. The insert record is durable before the page changes.
    ///
    /// # Errors
    /// `Error::DataTooLarge` if `raw` can't fit even an empty page.
    pub fn insert(&self, xid: Xid, raw: &[u8]) -> Result<Uid> {
        if raw.len() > normal::MAX_FREE_SPACE {
            return Err(Error::DataTooLarge {
                len: raw.len(),
                max: normal::MAX_FREE_SPACE,
            });
        }

        let mut page_id = match self.pc.page_count() {
            last if last > PageId::FIRST.0 => PageId::new(last),
            last => self.pc.new_page_after(last, &normal::init_data())?,
        };

        loop {
            if let Some(uid) = self.try_insert(xid, page_id, raw)? {
                return Ok(uid);
            }
            // Full. Only the first caller to see it full grows the file.
            page_id = self.pc.new_page_after(page_id.0, &normal::init_data())?;
        }
    }

    fn try_insert(&self, xid: Xid, page_id: PageId, raw: &[u8]) -> Result<Option<Uid>> {
        let page = self.pc.get_page(page_id)?;
        let inserted = (|| -> Result<Option<Uid>> {
            let mut guard = page.lock();
            if normal::free_space(&guard) < raw.len() {
                return Ok(None);
            }

            let offset = normal::fso(&guard);
            self.logger
                .log(&LogRecord::insert(xid, page_id, offset, raw).encode())?;
            normal::insert(&mut guard, raw)?;
            Ok(Some(Uid::new(page_id, offset)))
        })();
        let released = page.release();

        let inserted = inserted?;
        released?;
        Ok(inserted)
    }

    /// Overwrite the item at `uid` with `raw` (same length as the stored
    /// bytes being replaced) on behalf of `xid`.
    pub fn update(&self, xid: Xid, uid: Uid, raw: &[u8]) -> Result<()> {
        let page = self.pc.get_page(uid.page_id())?;
        let updated = (|| -> Result<()> {
            let mut guard = page.lock();
            let start = uid.offset() as usize;
            let end = Self::item_end(uid, raw.len(), normal::fso(&guard))?;

            let old = guard.as_slice()[start..end].to_vec();
            let item = ItemUpdate { uid, old: &old, new: raw };
            self.logger.log(&LogRecord::update(xid, &item).encode())?;

            guard.set_dirty(true);
            guard.as_mut_slice()[start..end].copy_from_slice(raw);
            Ok(())
        })();
        let released = page.release();

        updated?;
        released
    }

    /// `len` bytes of the item at `uid`.
    pub fn read(&self, uid: Uid, len: usize) -> Result<Vec<u8>> {
        let page = self.pc.get_page(uid.page_id())?;
        let bytes = {
            let guard = page.read();
            Self::item_end(uid, len, normal::fso(&guard))
                .map(|end| guard.as_slice()[uid.offset() as usize..end].to_vec())
        };
        let released = page.release();

        let bytes = bytes?;
        released?;
        Ok(bytes)
    }

    /// End of `len` bytes at `uid`, which must lie within the used part of
    /// a normal page.
    fn item_end(uid: Uid, len: usize, fso: u16) -> Result<usize> {
        let start = uid.offset() as usize;
        let end = start + len;
        if uid.page_id() == PageId::FIRST || start < 2 || end > fso as usize || end > PAGE_SIZE {
            return Err(Error::PageOverflow {
                page: uid.page_id().0,
                offset: start,
                len,
            });
        }
        Ok(end)
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn transaction_manager(&self) -> &TransactionManager {
        &self.tm
    }

    #[inline]
    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    #[inline]
    pub fn page_cache(&self) -> &PageCache {
        &self.pc
    }
}
