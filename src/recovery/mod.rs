//! Write-ahead logging and crash recovery.
//!
//! - [`Logger`] - The append-only, checksummed log file
//! - [`LogRecord`] - Insert and update record payloads
//! - [`recover`] - Redo/undo replay of the log after a crash

mod checksum;
mod log_record;
mod logger;
mod recover;

pub use checksum::checksum;
pub use log_record::LogRecord;
pub use logger::Logger;
pub use recover::{recover, recover_with, RecoveryOptions, RecoveryReport};
