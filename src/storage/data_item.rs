//! Boundary with the data item layer.
//!
//! Data items are encoded by a higher layer; this crate only needs their
//! identifier, their current and pre-image bytes when logging an update,
//! and a way to flip the valid flag of a raw item in place.
//!
//! # Raw item layout
//! ```text
//! [valid: 1][size: 2][data: size]
//! ```
//! `valid == 0` means the item is live; anything else means it has been
//! logically deleted.

use crate::common::Uid;

/// Offset of the valid flag inside a raw data item.
pub const VALID_FLAG_OFFSET: usize = 0;

const INVALID: u8 = 1;

/// The view of a data item the log needs to record an update.
pub trait DataItem {
    /// Where the item lives.
    fn uid(&self) -> Uid;

    /// Current raw bytes (after the update).
    fn data(&self) -> &[u8];

    /// Raw bytes before the update. Same length as [`DataItem::data`].
    fn old_data(&self) -> &[u8];
}

/// Mark a raw data item as logically deleted.
///
/// There is no physical delete; undoing an insert means writing the item
/// back with this flag set.
pub fn set_raw_invalid(raw: &mut [u8]) {
    if let Some(flag) = raw.get_mut(VALID_FLAG_OFFSET) {
        *flag = INVALID;
    }
}

/// `true` unless the item's valid flag has been set.
pub fn is_raw_valid(raw: &[u8]) -> bool {
    raw.get(VALID_FLAG_OFFSET).is_some_and(|&flag| flag != INVALID)
}
