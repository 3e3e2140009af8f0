//! Page types and layouts.
//!
//! This module contains:
//! - [`PageData`] - The raw 8KB data container
//! - [`Page`] - A cached page with its lock and dirty flag
//! - [`normal`] - Free-space-offset layout of data pages
//! - [`first`] - Validity-check layout of page 1

pub mod first;
pub mod normal;
#[allow(clippy::module_inception)]
mod page;

pub use page::{Page, PageData, PageReadGuard, PageWriteGuard};
