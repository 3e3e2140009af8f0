//! Logger - the append-only write-ahead log.
//!
//! # File Layout (`<path>.log`)
//! ```text
//! ┌───────────────┬──────────┬──────────┬─────┬──────────┬──────────┐
//! │ xChecksum (4) │ record 1 │ record 2 │ ... │ record N │ bad tail │
//! └───────────────┴──────────┴──────────┴─────┴──────────┴──────────┘
//!
//! record: [size: 4][checksum: 4][payload: size]
//! ```
//! `checksum` covers the payload. `xChecksum` chains over every complete
//! record (size, checksum and payload). A bad tail is whatever a crash left
//! behind mid-append; it is cut off when the log is opened.

use std::fs::File;
use std::os::unix::fs::FileExt;
use std::path::Path;

use parking_lot::Mutex;

use crate::common::config::LOG_FILE_SUFFIX;
use crate::common::{file, Error, Result};
use crate::recovery::checksum::checksum;

const HEADER_LEN: u64 = 4;
const RECORD_HEADER_LEN: u64 = 8;

struct LoggerInner {
    file: File,
    /// Read cursor for `next`.
    position: u64,
    /// End of the last complete record.
    file_size: u64,
    x_checksum: i32,
}

impl LoggerInner {
    /// Next complete, checksum-valid record (header included).
    fn next_record(&mut self) -> Result<Option<Vec<u8>>> {
        if self.position + RECORD_HEADER_LEN > self.file_size {
            return Ok(None);
        }

        let mut size = [0u8; 4];
        self.file.read_exact_at(&mut size, self.position)?;
        let size = u32::from_be_bytes(size) as u64;
        if self.position + RECORD_HEADER_LEN + size > self.file_size {
            return Ok(None);
        }

        let mut record = vec![0u8; (RECORD_HEADER_LEN + size) as usize];
        self.file.read_exact_at(&mut record, self.position)?;

        let stored = i32::from_be_bytes([record[4], record[5], record[6], record[7]]);
        if checksum(0, &record[RECORD_HEADER_LEN as usize..]) != stored {
            return Ok(None);
        }

        self.position += record.len() as u64;
        Ok(Some(record))
    }

    /// Chain the checksum of every complete record. Leaves the cursor at
    /// the end of the last one.
    fn chain_checksum(&mut self) -> Result<i32> {
        self.position = HEADER_LEN;

        let mut x_check = 0;
        while let Some(record) = self.next_record()? {
            x_check = checksum(x_check, &record);
        }
        Ok(x_check)
    }

    /// Verify the header checksum and cut off the bad tail.
    fn check_and_remove_tail(&mut self) -> Result<()> {
        let x_check = self.chain_checksum()?;
        if x_check != self.x_checksum {
            return Err(Error::BadLogFile);
        }

        if self.position < self.file_size {
            log::warn!(
                "discarding {} byte bad tail of the log",
                self.file_size - self.position
            );
        }
        self.file.set_len(self.position)?;
        self.file.sync_all()?;
        self.file_size = self.position;
        self.position = HEADER_LEN;
        Ok(())
    }
}

/// The write-ahead log.
///
/// # Thread Safety
/// One mutex serializes appends, reads, rewinds and truncation. `log`
/// returns only after the record and the new header are synced.
pub struct Logger {
    inner: Mutex<LoggerInner>,
}

impl Logger {
    /// Create `<path>.log` holding a zero header checksum.
    ///
    /// # Errors
    /// `Error::FileExists` if the log is already there.
    pub fn create(path: &Path) -> Result<Self> {
        let log_path = file::with_suffix(path, LOG_FILE_SUFFIX);
        let file = file::create_new(&log_path)?;

        file.write_all_at(&0i32.to_be_bytes(), 0)?;
        file.sync_all()?;
        log::info!("created log {}", log_path.display());

        Ok(Self {
            inner: Mutex::new(LoggerInner {
                file,
                position: HEADER_LEN,
                file_size: HEADER_LEN,
                x_checksum: 0,
            }),
        })
    }

    /// Open `<path>.log`, verify it and drop any bad tail.
    ///
    /// # Errors
    /// - `Error::FileNotExists` if the log is missing
    /// - `Error::BadLogFile` if the header is short or its checksum does not
    ///   match the complete records
    pub fn open(path: &Path) -> Result<Self> {
        let log_path = file::with_suffix(path, LOG_FILE_SUFFIX);
        let file = file::open_existing(&log_path)?;

        let file_size = file.metadata()?.len();
        if file_size < HEADER_LEN {
            return Err(Error::BadLogFile);
        }

        let mut header = [0u8; HEADER_LEN as usize];
        file.read_exact_at(&mut header, 0)?;

        let mut inner = LoggerInner {
            file,
            position: HEADER_LEN,
            file_size,
            x_checksum: i32::from_be_bytes(header),
        };
        inner.check_and_remove_tail()?;

        log::info!(
            "opened log {} ({} bytes)",
            log_path.display(),
            inner.file_size
        );
        Ok(Self {
            inner: Mutex::new(inner),
        })
    }

    /// Append `payload` as one record and sync.
    pub fn log(&self, payload: &[u8]) -> Result<()> {
        let mut record = Vec::with_capacity(RECORD_HEADER_LEN as usize + payload.len());
        record.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        record.extend_from_slice(&checksum(0, payload).to_be_bytes());
        record.extend_from_slice(payload);

        let mut inner = self.inner.lock();
        let end = inner.file_size;
        inner.file.write_all_at(&record, end)?;

        let x_checksum = checksum(inner.x_checksum, &record);
        inner.file.write_all_at(&x_checksum.to_be_bytes(), 0)?;
        inner.file.sync_all()?;

        inner.x_checksum = x_checksum;
        inner.file_size = end + record.len() as u64;
        Ok(())
    }

    /// Next payload from the cursor, or `None` at the end of the valid log.
    pub fn next(&self) -> Result<Option<Vec<u8>>> {
        let mut inner = self.inner.lock();
        let record = inner.next_record()?;
        Ok(record.map(|mut r| r.split_off(RECORD_HEADER_LEN as usize)))
    }

    /// Move the cursor back to the first record.
    pub fn rewind(&self) {
        self.inner.lock().position = HEADER_LEN;
    }

    /// Cut the file at `len` bytes (never into the header) and rewrite the
    /// header checksum over the records that are still complete. A record
    /// cut in half is dropped as a bad tail on the next open.
    pub fn truncate(&self, len: u64) -> Result<()> {
        let len = len.max(HEADER_LEN);
        let mut inner = self.inner.lock();
        inner.file.set_len(len)?;
        inner.file_size = len;

        let x_checksum = inner.chain_checksum()?;
        inner.file.write_all_at(&x_checksum.to_be_bytes(), 0)?;
        inner.file.sync_all()?;
        inner.x_checksum = x_checksum;
        inner.position = HEADER_LEN;
        Ok(())
    }

    /// Length of the valid log, header included.
    pub fn file_len(&self) -> u64 {
        self.inner.lock().file_size
    }

    /// The running header checksum.
    pub fn x_checksum(&self) -> i32 {
        self.inner.lock().x_checksum
    }
}
