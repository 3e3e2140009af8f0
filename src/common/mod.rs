//! Common types and utilities shared across KeelDB.
//!
//! This module contains fundamental primitives used throughout the codebase:
//! - Configuration constants and [`EngineConfig`]
//! - Error types
//! - Identifiers (PageId, Uid)
//! - File open helpers

pub mod config;
pub mod error;
pub mod file;
mod page_id;
mod uid;

pub use config::{EngineConfig, RedoInsertInvalidation};
pub use error::{Error, Result};
pub use page_id::PageId;
pub use uid::Uid;
