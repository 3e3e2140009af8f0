//! Error types for KeelDB.

use std::path::PathBuf;

use thiserror::Error;

/// Convenient Result type alias.
///
/// Instead of writing `Result<T, Error>` everywhere, we can write `Result<T>`.
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors in KeelDB.
///
/// None of these are recovered from inside the crate. A failing durability
/// primitive is reported to the caller, and [`crate::Engine::open`] refuses
/// to hand out an engine whose recovery did not complete.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from a file read, write, sync or truncation.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The generic cache is holding `capacity` resources already.
    #[error("Cache is full")]
    CacheFull,

    /// A key was released more times than it was acquired.
    #[error("Cache key {0} is not referenced")]
    NotReferenced(u64),

    /// `create` found the file already present.
    #[error("File already exists: {}", .0.display())]
    FileExists(PathBuf),

    /// `open` did not find the file.
    #[error("File does not exist: {}", .0.display())]
    FileNotExists(PathBuf),

    /// The file exists but cannot be opened for both reading and writing.
    #[error("File cannot be read or written: {}", .0.display())]
    FileCannotReadWrite(PathBuf),

    /// Log header checksum does not match the complete records.
    #[error("Bad log file")]
    BadLogFile,

    /// Status file length disagrees with its own counter.
    #[error("Bad transaction status file")]
    BadStatusFile,

    /// A log payload that does not decode as an insert or update record.
    #[error("Bad log record: {0}")]
    BadLogRecord(String),

    /// Requested page does not exist in the page file.
    #[error("Page {0} not found")]
    PageNotFound(u32),

    /// A write would run past the end of a page.
    #[error("Write of {len} bytes at offset {offset} overflows page {page}")]
    PageOverflow { page: u32, offset: usize, len: usize },

    /// The page cache budget is below the minimum page count.
    #[error("Page cache of {pages} pages is below the minimum of {min}")]
    MemTooSmall { pages: usize, min: usize },

    /// A data item larger than a normal page can hold.
    #[error("Data of {len} bytes exceeds the maximum of {max}")]
    DataTooLarge { len: usize, max: usize },
}
