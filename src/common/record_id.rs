//! Record identifier type.

use std::fmt;

use crate::common::PageId;

/// Locates a record in the heap file a tree indexes.
///
/// The index never dereferences a `RecordId`; it is an opaque (page, slot)
/// pair stored next to the key in leaf entries and handed back verbatim by
/// scans. Equality against the caller's record id is all the index needs,
/// when deleting an exact (key, rid) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId {
    /// Heap page holding the record.
    pub page: PageId,
    /// Slot within that page.
    pub slot: u16,
}

impl RecordId {
    /// Encoded size in leaf entries: u32 page + u16 slot.
    pub const ENCODED_SIZE: usize = 6;

    /// Create a new RecordId.
    #[inline]
    pub fn new(page: PageId, slot: u16) -> Self {
        RecordId { page, slot }
    }

    /// Encode into `buf`, which must be at least `ENCODED_SIZE` bytes.
    pub fn write_to(&self, buf: &mut [u8]) {
        buf[..4].copy_from_slice(&self.page.0.to_le_bytes());
        buf[4..6].copy_from_slice(&self.slot.to_le_bytes());
    }

    /// Decode from the first `ENCODED_SIZE` bytes of `buf`.
    pub fn from_bytes(buf: &[u8]) -> Self {
        let page = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let slot = u16::from_le_bytes([buf[4], buf[5]]);
        RecordId {
            page: PageId::new(page),
            slot,
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rid({}, {})", self.page.0, self.slot)
    }
}
