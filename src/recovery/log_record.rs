//! Log record payloads.
//!
//! # Insert
//! ```text
//! [type=0: 1][xid: 8][page: 4][offset: 2][data]
//! ```
//! # Update
//! ```text
//! [type=1: 1][xid: 8][uid: 8][old: n][new: n]
//! ```
//! All integers are big-endian. The old and new images of an update have the
//! same length, so `n = (len - 17) / 2`.

use crate::common::{Error, PageId, Result, Uid};
use crate::concurrency::Xid;
use crate::storage::data_item::DataItem;

const INSERT_TYPE: u8 = 0;
const UPDATE_TYPE: u8 = 1;

const XID_OFFSET: usize = 1;
const INSERT_PAGE_OFFSET: usize = XID_OFFSET + 8;
const INSERT_POSITION_OFFSET: usize = INSERT_PAGE_OFFSET + 4;
const INSERT_DATA_OFFSET: usize = INSERT_POSITION_OFFSET + 2;
const UPDATE_UID_OFFSET: usize = XID_OFFSET + 8;
const UPDATE_DATA_OFFSET: usize = UPDATE_UID_OFFSET + 8;

/// A decoded log payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogRecord {
    /// `data` was appended to `page_id` at `offset`.
    Insert {
        xid: Xid,
        page_id: PageId,
        offset: u16,
        data: Vec<u8>,
    },
    /// The bytes of the item at `uid` changed from `old` to `new`.
    Update {
        xid: Xid,
        uid: Uid,
        old: Vec<u8>,
        new: Vec<u8>,
    },
}

impl LogRecord {
    /// Record for inserting `data` at `offset` of `page_id`.
    pub fn insert(xid: Xid, page_id: PageId, offset: u16, data: &[u8]) -> Self {
        Self::Insert {
            xid,
            page_id,
            offset,
            data: data.to_vec(),
        }
    }

    /// Record for an update of `item` from its old image to its current one.
    pub fn update(xid: Xid, item: &impl DataItem) -> Self {
        Self::Update {
            xid,
            uid: item.uid(),
            old: item.old_data().to_vec(),
            new: item.data().to_vec(),
        }
    }

    pub fn xid(&self) -> Xid {
        match self {
            Self::Insert { xid, .. } | Self::Update { xid, .. } => *xid,
        }
    }

    /// Page the record touches.
    pub fn page_id(&self) -> PageId {
        match self {
            Self::Insert { page_id, .. } => *page_id,
            Self::Update { uid, .. } => uid.page_id(),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::Insert {
                xid,
                page_id,
                offset,
                data,
            } => {
                let mut buf = Vec::with_capacity(INSERT_DATA_OFFSET + data.len());
                buf.push(INSERT_TYPE);
                buf.extend_from_slice(&xid.to_be_bytes());
                buf.extend_from_slice(&page_id.0.to_be_bytes());
                buf.extend_from_slice(&offset.to_be_bytes());
                buf.extend_from_slice(data);
                buf
            }
            Self::Update { xid, uid, old, new } => {
                let mut buf = Vec::with_capacity(UPDATE_DATA_OFFSET + old.len() + new.len());
                buf.push(UPDATE_TYPE);
                buf.extend_from_slice(&xid.to_be_bytes());
                buf.extend_from_slice(&uid.0.to_be_bytes());
                buf.extend_from_slice(old);
                buf.extend_from_slice(new);
                buf
            }
        }
    }

    /// # Errors
    /// `Error::BadLogRecord` for an unknown type byte, a payload shorter than
    /// its header, or an update whose two images differ in length.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let Some(&kind) = payload.first() else {
            return Err(Error::BadLogRecord("empty payload".into()));
        };

        match kind {
            INSERT_TYPE => {
                if payload.len() < INSERT_DATA_OFFSET {
                    return Err(Error::BadLogRecord(format!(
                        "insert record of {} bytes",
                        payload.len()
                    )));
                }
                Ok(Self::Insert {
                    xid: read_u64(payload, XID_OFFSET),
                    page_id: PageId::new(u32::from_be_bytes(fixed(
                        payload,
                        INSERT_PAGE_OFFSET,
                    ))),
                    offset: u16::from_be_bytes(fixed(payload, INSERT_POSITION_OFFSET)),
                    data: payload[INSERT_DATA_OFFSET..].to_vec(),
                })
            }
            UPDATE_TYPE => {
                if payload.len() < UPDATE_DATA_OFFSET
                    || (payload.len() - UPDATE_DATA_OFFSET) % 2 != 0
                {
                    return Err(Error::BadLogRecord(format!(
                        "update record of {} bytes",
                        payload.len()
                    )));
                }
                let n = (payload.len() - UPDATE_DATA_OFFSET) / 2;
                let images = &payload[UPDATE_DATA_OFFSET..];
                Ok(Self::Update {
                    xid: read_u64(payload, XID_OFFSET),
                    uid: Uid(read_u64(payload, UPDATE_UID_OFFSET)),
                    old: images[..n].to_vec(),
                    new: images[n..].to_vec(),
                })
            }
            other => Err(Error::BadLogRecord(format!("unknown record type {}", other))),
        }
    }
}

fn fixed<const N: usize>(buf: &[u8], at: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&buf[at..at + N]);
    out
}

fn read_u64(buf: &[u8], at: usize) -> u64 {
    u64::from_be_bytes(fixed(buf, at))
}
