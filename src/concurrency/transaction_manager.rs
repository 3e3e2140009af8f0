//! Transaction Manager - the persistent transaction status table.
//!
//! # File Layout (`<path>.xid`)
//! ```text
//! ┌──────────────┬──────────┬──────────┬─────┬──────────┐
//! │ counter (8B) │ xid 1    │ xid 2    │ ... │ xid N    │
//! │ big-endian   │ status   │ status   │     │ status   │
//! └──────────────┴──────────┴──────────┴─────┴──────────┘
//! ```
//! The status of transaction `xid` is the byte at `8 + (xid - 1)`. The
//! counter is the highest id ever handed out, so a sound file is exactly
//! `8 + counter` bytes long.

use std::fmt;
use std::fs::File;
use std::os::unix::fs::FileExt;
use std::path::Path;

use parking_lot::Mutex;

use crate::common::config::XID_FILE_SUFFIX;
use crate::common::{file, Error, Result};

/// Transaction identifier.
pub type Xid = u64;

/// The virtual transaction used for system writes. Always committed.
pub const SUPER_XID: Xid = 0;

const HEADER_LEN: u64 = 8;

/// On-disk status of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TransactionStatus {
    Active = 0,
    Committed = 1,
    Aborted = 2,
}

impl TransactionStatus {
    fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0 => Ok(Self::Active),
            1 => Ok(Self::Committed),
            2 => Ok(Self::Aborted),
            _ => Err(Error::BadStatusFile),
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Active => "active",
            Self::Committed => "committed",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Hands out transaction ids and records their outcome.
///
/// # Thread Safety
/// `begin` is serialized by the counter mutex. Status reads and writes use
/// positional I/O on distinct bytes and need no lock. Every write is synced
/// before the call returns.
pub struct TransactionManager {
    file: File,
    counter: Mutex<Xid>,
}

impl TransactionManager {
    /// Create `<path>.xid` with a zero counter.
    ///
    /// # Errors
    /// `Error::FileExists` if the status file is already there.
    pub fn create(path: &Path) -> Result<Self> {
        let xid_path = file::with_suffix(path, XID_FILE_SUFFIX);
        let file = file::create_new(&xid_path)?;

        file.write_all_at(&0u64.to_be_bytes(), 0)?;
        file.sync_all()?;
        log::info!("created transaction status file {}", xid_path.display());

        Ok(Self {
            file,
            counter: Mutex::new(0),
        })
    }

    /// Open `<path>.xid` and validate its length against its counter.
    ///
    /// # Errors
    /// - `Error::FileNotExists` if the status file is missing
    /// - `Error::BadStatusFile` if the length and the counter disagree
    pub fn open(path: &Path) -> Result<Self> {
        let xid_path = file::with_suffix(path, XID_FILE_SUFFIX);
        let file = file::open_existing(&xid_path)?;

        let len = file.metadata()?.len();
        if len < HEADER_LEN {
            return Err(Error::BadStatusFile);
        }

        let mut header = [0u8; HEADER_LEN as usize];
        file.read_exact_at(&mut header, 0)?;
        let counter = u64::from_be_bytes(header);

        if counter.checked_add(HEADER_LEN) != Some(len) {
            log::warn!(
                "status file {} is {} bytes but its counter is {}",
                xid_path.display(),
                len,
                counter
            );
            return Err(Error::BadStatusFile);
        }

        log::info!(
            "opened transaction status file {} (counter {})",
            xid_path.display(),
            counter
        );
        Ok(Self {
            file,
            counter: Mutex::new(counter),
        })
    }

    /// Start a transaction and return its id.
    ///
    /// The new id's status byte is written before the counter. A crash in
    /// between leaves one byte more than the counter accounts for, and the
    /// next [`TransactionManager::open`] rejects the file with
    /// `Error::BadStatusFile`.
    pub fn begin(&self) -> Result<Xid> {
        let mut counter = self.counter.lock();
        let xid = *counter + 1;

        self.write_status(xid, TransactionStatus::Active)?;

        self.file.write_all_at(&xid.to_be_bytes(), 0)?;
        self.file.sync_all()?;
        *counter = xid;

        log::debug!("began transaction {}", xid);
        Ok(xid)
    }

    /// Mark `xid` committed. Does not check that it was active.
    pub fn commit(&self, xid: Xid) -> Result<()> {
        self.write_status(xid, TransactionStatus::Committed)
    }

    /// Mark `xid` aborted. Does not check that it was active.
    pub fn abort(&self, xid: Xid) -> Result<()> {
        self.write_status(xid, TransactionStatus::Aborted)
    }

    pub fn is_active(&self, xid: Xid) -> Result<bool> {
        if xid == SUPER_XID {
            return Ok(false);
        }
        Ok(self.status(xid)? == TransactionStatus::Active)
    }

    pub fn is_committed(&self, xid: Xid) -> Result<bool> {
        if xid == SUPER_XID {
            return Ok(true);
        }
        Ok(self.status(xid)? == TransactionStatus::Committed)
    }

    pub fn is_aborted(&self, xid: Xid) -> Result<bool> {
        if xid == SUPER_XID {
            return Ok(false);
        }
        Ok(self.status(xid)? == TransactionStatus::Aborted)
    }

    /// Read the recorded status of `xid`.
    ///
    /// # Errors
    /// - `Error::Io` if `xid` was never handed out
    /// - `Error::BadStatusFile` if the byte is not a known status
    pub fn status(&self, xid: Xid) -> Result<TransactionStatus> {
        if xid == SUPER_XID {
            return Ok(TransactionStatus::Committed);
        }
        let mut byte = [0u8; 1];
        self.file.read_exact_at(&mut byte, Self::status_offset(xid))?;
        TransactionStatus::from_byte(byte[0])
    }

    /// Highest id handed out so far.
    pub fn xid_counter(&self) -> Xid {
        *self.counter.lock()
    }

    fn write_status(&self, xid: Xid, status: TransactionStatus) -> Result<()> {
        // The super transaction has no status byte
        if xid == SUPER_XID {
            return Ok(());
        }
        self.file
            .write_all_at(&[status as u8], Self::status_offset(xid))?;
        self.file.sync_all()?;
        Ok(())
    }

    #[inline]
    fn status_offset(xid: Xid) -> u64 {
        HEADER_LEN + (xid - 1)
    }
}
