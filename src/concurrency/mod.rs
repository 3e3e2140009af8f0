//! Transaction bookkeeping.
//!
//! - [`TransactionManager`] - Transaction ids and their persistent status

mod transaction_manager;

pub use transaction_manager::{TransactionManager, TransactionStatus, Xid, SUPER_XID};
