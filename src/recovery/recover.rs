//! Crash recovery.
//!
//! Rule: a page is only modified after the log record describing the
//! modification is durable. Recovery replays the log against the page file:
//!
//! 1. Truncate the page file to the highest page the log mentions.
//! 2. Redo, in log order, every record of a committed transaction and every
//!    insert of an aborted one.
//! 3. Undo, newest first, every record of a transaction still active at the
//!    crash and every insert of an aborted one, then mark that transaction
//!    aborted.
//!
//! An insert is undone by writing the item back with its valid flag set;
//! there is no physical delete. Updates of aborted transactions are left
//! alone by both passes: a later committed update may own the same bytes,
//! and an active transaction rolled back by an earlier run is aborted by
//! the next one.

use std::collections::BTreeMap;
use std::fmt;

use crate::buffer::PageCache;
use crate::common::{PageId, RedoInsertInvalidation, Result};
use crate::concurrency::{TransactionManager, TransactionStatus, Xid};
use crate::recovery::{LogRecord, Logger};
use crate::storage::data_item::set_raw_invalid;
use crate::storage::page::{normal, PageWriteGuard};

/// Knobs for [`recover_with`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RecoveryOptions {
    pub redo_insert_invalidation: RedoInsertInvalidation,
}

/// What a recovery run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Records re-applied by the redo pass.
    pub redone: usize,
    /// Records reverted by the undo pass.
    pub undone: usize,
    /// Transactions rolled back and marked aborted, ascending.
    pub rolled_back: Vec<Xid>,
    /// Page file length after truncation.
    pub page_count: u32,
}

impl fmt::Display for RecoveryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "redone {} records, undone {} records, rolled back {} transactions, {} pages",
            self.redone,
            self.undone,
            self.rolled_back.len(),
            self.page_count
        )
    }
}

/// Recover with the default options.
pub fn recover(tm: &TransactionManager, logger: &Logger, pc: &PageCache) -> Result<RecoveryReport> {
    recover_with(tm, logger, pc, &RecoveryOptions::default())
}

/// Bring the page file back to the state the log and the status table
/// describe.
///
/// Running it again on the result changes nothing.
///
/// # Errors
/// Any I/O, page or decoding failure stops recovery and is returned as is.
pub fn recover_with(
    tm: &TransactionManager,
    logger: &Logger,
    pc: &PageCache,
    options: &RecoveryOptions,
) -> Result<RecoveryReport> {
    log::info!("recovery started");

    let max_page = max_logged_page(logger)?;
    pc.truncate_by_page_id(max_page)?;
    log::info!("truncated page file to {} pages", max_page);

    let redone = redo(tm, logger, pc, options.redo_insert_invalidation)?;
    let (undone, rolled_back) = undo(tm, logger, pc)?;

    let report = RecoveryReport {
        redone,
        undone,
        rolled_back,
        page_count: pc.page_count(),
    };
    log::info!("recovery finished: {}", report);
    Ok(report)
}

fn max_logged_page(logger: &Logger) -> Result<u32> {
    logger.rewind();
    let mut max_page = PageId::FIRST.0;
    while let Some(payload) = logger.next()? {
        let record = LogRecord::decode(&payload)?;
        max_page = max_page.max(record.page_id().0);
    }
    Ok(max_page)
}

fn redo(
    tm: &TransactionManager,
    logger: &Logger,
    pc: &PageCache,
    invalidation: RedoInsertInvalidation,
) -> Result<usize> {
    logger.rewind();
    let mut redone = 0;

    while let Some(payload) = logger.next()? {
        let record = LogRecord::decode(&payload)?;
        match tm.status(record.xid())? {
            TransactionStatus::Active => continue,
            TransactionStatus::Aborted if matches!(record, LogRecord::Update { .. }) => continue,
            _ => {}
        }

        match record {
            LogRecord::Insert {
                xid,
                page_id,
                offset,
                mut data,
            } => {
                let invalidate = match invalidation {
                    RedoInsertInvalidation::Always => true,
                    RedoInsertInvalidation::AbortedOnly => tm.is_aborted(xid)?,
                };
                if invalidate {
                    set_raw_invalid(&mut data);
                }
                log::debug!("redo insert xid={} page={} offset={}", xid, page_id, offset);
                with_page(pc, page_id, |page| normal::recover_insert(page, &data, offset))?;
            }
            LogRecord::Update { xid, uid, new, .. } => {
                log::debug!("redo update xid={} {}", xid, uid);
                with_page(pc, uid.page_id(), |page| {
                    normal::recover_update(page, &new, uid.offset())
                })?;
            }
        }
        redone += 1;
    }

    Ok(redone)
}

fn undo(
    tm: &TransactionManager,
    logger: &Logger,
    pc: &PageCache,
) -> Result<(usize, Vec<Xid>)> {
    logger.rewind();
    let mut pending: BTreeMap<Xid, Vec<LogRecord>> = BTreeMap::new();

    while let Some(payload) = logger.next()? {
        let record = LogRecord::decode(&payload)?;
        let rollback = match tm.status(record.xid())? {
            TransactionStatus::Active => true,
            TransactionStatus::Aborted => matches!(record, LogRecord::Insert { .. }),
            TransactionStatus::Committed => false,
        };
        if rollback {
            pending.entry(record.xid()).or_default().push(record);
        }
    }

    let mut undone = 0;
    let mut rolled_back = Vec::with_capacity(pending.len());

    for (xid, records) in pending {
        for record in records.into_iter().rev() {
            match record {
                LogRecord::Insert {
                    page_id,
                    offset,
                    mut data,
                    ..
                } => {
                    log::debug!("undo insert xid={} page={} offset={}", xid, page_id, offset);
                    set_raw_invalid(&mut data);
                    with_page(pc, page_id, |page| normal::recover_insert(page, &data, offset))?;
                }
                LogRecord::Update { uid, old, .. } => {
                    log::debug!("undo update xid={} {}", xid, uid);
                    with_page(pc, uid.page_id(), |page| {
                        normal::recover_update(page, &old, uid.offset())
                    })?;
                }
            }
            undone += 1;
        }

        tm.abort(xid)?;
        rolled_back.push(xid);
    }

    Ok((undone, rolled_back))
}

/// Run `f` on page `page_id` under its write lock. The page is released
/// whether or not `f` succeeds.
fn with_page<F>(pc: &PageCache, page_id: PageId, f: F) -> Result<()>
where
    F: FnOnce(&mut PageWriteGuard<'_>) -> Result<()>,
{
    let page = pc.get_page(page_id)?;
    let applied = {
        let mut guard = page.lock();
        f(&mut guard)
    };
    let released = page.release();
    applied?;
    released
}
