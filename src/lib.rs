//! KeelDB - the durability core of an embedded transactional storage engine.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          Engine                                 │
//! │            begin / commit / abort / insert / update             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌───────────────────┐  ┌──────────────────┐  ┌──────────────┐  │
//! │  │ TransactionManager│  │      Logger      │  │  PageCache   │  │
//! │  │  (concurrency/)   │  │   (recovery/)    │  │  (buffer/)   │  │
//! │  │   <path>.xid      │  │   <path>.log     │  │ RefCountCache│  │
//! │  └───────────────────┘  └──────────────────┘  └──────┬───────┘  │
//! │                              ↑                       ↓          │
//! │                    recover(): redo + undo     ┌──────────────┐  │
//! │                                               │ DiskManager  │  │
//! │                                               │  <path>.db   │  │
//! │                                               │  (storage/)  │  │
//! │                                               └──────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (PageId, Uid, Error, config)
//! - [`buffer`] - Reference-counted caching of pages
//! - [`storage`] - Disk I/O, page layouts and the data item boundary
//! - [`concurrency`] - Transaction ids and statuses
//! - [`recovery`] - Write-ahead logging and crash recovery
//!
//! # Quick Start
//! ```no_run
//! use keeldb::{Engine, EngineConfig};
//!
//! let engine = Engine::create("my_database", EngineConfig::default()).unwrap();
//! let xid = engine.begin().unwrap();
//! let uid = engine.insert(xid, b"\x00\x00\x02hi").unwrap();
//! engine.commit(xid).unwrap();
//! engine.close().unwrap();
//!
//! // Reopening after a crash replays the log first.
//! let engine = Engine::open("my_database", EngineConfig::default()).unwrap();
//! assert_eq!(engine.read(uid, 5).unwrap(), b"\x00\x00\x02hi");
//! ```

pub mod buffer;
pub mod common;
pub mod concurrency;
mod engine;
pub mod recovery;
pub mod storage;

// Re-export commonly used items at crate root for convenience
pub use common::config::PAGE_SIZE;
pub use common::{EngineConfig, Error, PageId, RedoInsertInvalidation, Result, Uid};

pub use buffer::{CacheBackend, PageCache, PageHandle, RefCountCache};
pub use concurrency::{TransactionManager, TransactionStatus, Xid, SUPER_XID};
pub use engine::Engine;
pub use recovery::{recover, LogRecord, Logger, RecoveryReport};
pub use storage::page::Page;
pub use storage::DiskManager;
