//! On-page node layout for B+-tree leaves and index nodes.
//!
//! Both node kinds share one layout after the page header:
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 13      4     prev page (leaf: left sibling; index: leftmost child)
//! 17      4     next page (leaf: right sibling; index: unused)
//! 21      2     entry count
//! 23      2     used cell bytes
//! 25      ...   cells, contiguous and sorted by key
//! ```
//!
//! A cell is the encoded key followed by the payload: a 6-byte record id
//! in leaves, a 4-byte child page id in index nodes. Cells are
//! variable-length for text keys, so position lookups walk from the
//! front; nodes are one page, so the walk is short.
//!
//! Storing the leftmost child of an index node in the prev-page field
//! keeps the cell format uniform: every cell pairs a separator key with
//! the child for keys at or above it.

use std::cmp::Ordering;

use crate::common::config::PAGE_SIZE;
use crate::common::{Error, PageId, RecordId, Result};
use crate::storage::page::{Page, PageHeader, PageType};

use super::key::{Key, KeyType};

pub const OFFSET_PREV: usize = PageHeader::SIZE;
pub const OFFSET_NEXT: usize = OFFSET_PREV + 4;
pub const OFFSET_ENTRY_COUNT: usize = OFFSET_NEXT + 4;
pub const OFFSET_USED_BYTES: usize = OFFSET_ENTRY_COUNT + 2;
pub const CELLS_START: usize = OFFSET_USED_BYTES + 2;

/// Bytes available for cells in a node.
pub const NODE_CAPACITY: usize = PAGE_SIZE - CELLS_START;

/// What a key maps to: a record id in leaves, a child page in index
/// nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    Record(RecordId),
    Child(PageId),
}

impl Payload {
    pub fn encoded_size(&self) -> usize {
        match self {
            Payload::Record(_) => RecordId::ENCODED_SIZE,
            Payload::Child(_) => 4,
        }
    }
}

/// A decoded node cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: Key,
    pub payload: Payload,
}

impl Entry {
    pub fn encoded_size(&self) -> usize {
        self.key.encoded_size() + self.payload.encoded_size()
    }
}

fn read_u16(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

fn write_u16(data: &mut [u8], offset: usize, value: u16) {
    data[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

fn write_u32(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

/// Read-only view over a node page.
#[derive(Clone, Copy)]
pub struct NodeView<'a> {
    page: &'a Page,
    key_type: KeyType,
}

impl<'a> NodeView<'a> {
    pub fn new(page: &'a Page, key_type: KeyType) -> Self {
        Self { page, key_type }
    }

    pub fn is_leaf(&self) -> bool {
        self.page.header().page_type == PageType::BTreeLeaf
    }

    fn payload_size(&self) -> usize {
        match self.page.header().page_type {
            PageType::BTreeLeaf => RecordId::ENCODED_SIZE,
            PageType::BTreeIndex => 4,
            other => unreachable!("not a b+-tree node: {other:?}"),
        }
    }

    pub fn entry_count(&self) -> usize {
        read_u16(self.page.as_slice(), OFFSET_ENTRY_COUNT) as usize
    }

    pub fn used_bytes(&self) -> usize {
        read_u16(self.page.as_slice(), OFFSET_USED_BYTES) as usize
    }

    pub fn available_space(&self) -> usize {
        NODE_CAPACITY - self.used_bytes()
    }

    /// Left sibling for a leaf, leftmost child for an index node.
    pub fn prev_page(&self) -> PageId {
        PageId::new(read_u32(self.page.as_slice(), OFFSET_PREV))
    }

    /// Right sibling for a leaf.
    pub fn next_page(&self) -> PageId {
        PageId::new(read_u32(self.page.as_slice(), OFFSET_NEXT))
    }

    /// Byte offset of the cell at `pos`, walking from the front.
    fn entry_offset(&self, pos: usize) -> usize {
        let data = self.page.as_slice();
        let payload = self.payload_size();
        let mut offset = CELLS_START;
        for _ in 0..pos {
            offset += self.key_size_at(data, offset) + payload;
        }
        offset
    }

    fn key_size_at(&self, data: &[u8], offset: usize) -> usize {
        match self.key_type {
            KeyType::Int => 4,
            KeyType::Text => 2 + read_u16(data, offset) as usize,
        }
    }

    /// Decode the entry at `pos`.
    ///
    /// # Panics
    /// Panics if `pos` is out of range.
    pub fn entry(&self, pos: usize) -> Entry {
        assert!(pos < self.entry_count(), "entry position out of range");

        let data = self.page.as_slice();
        let offset = self.entry_offset(pos);
        let (key, key_size) = Key::read_from(self.key_type, &data[offset..]);

        let payload = match self.page.header().page_type {
            PageType::BTreeLeaf => {
                Payload::Record(RecordId::from_bytes(&data[offset + key_size..]))
            }
            _ => Payload::Child(PageId::new(read_u32(data, offset + key_size))),
        };

        Entry { key, payload }
    }

    /// Child page id of the entry at `pos` (index nodes).
    pub fn child_at(&self, pos: usize) -> PageId {
        match self.entry(pos).payload {
            Payload::Child(child) => child,
            Payload::Record(_) => unreachable!("leaf entries carry record ids"),
        }
    }

    /// Route an insertion: the child for the last separator at or below
    /// `key`, or the leftmost child when every separator is above it.
    ///
    /// Duplicates therefore descend toward the rightmost leaf that can
    /// hold them, matching the leaf-level rule that equal keys land after
    /// existing equals.
    pub fn route(&self, key: &Key) -> PageId {
        let data = self.page.as_slice();
        let payload = self.payload_size();
        let mut child = self.prev_page();
        let mut offset = CELLS_START;

        for _ in 0..self.entry_count() {
            let (separator, key_size) = Key::read_from(self.key_type, &data[offset..]);
            if separator.compare(key) == Ordering::Greater {
                break;
            }
            child = PageId::new(read_u32(data, offset + key_size));
            offset += key_size + payload;
        }
        child
    }

    /// Route a leftmost-duplicate search: the child for the last
    /// separator strictly below `key`, or the leftmost child. `None`
    /// descends to the tree's first leaf.
    ///
    /// Because an equal separator routes left of its child here, the
    /// descent can land on a leaf whose keys are all below the target;
    /// callers continue along the sibling chain.
    pub fn route_leftmost(&self, key: Option<&Key>) -> PageId {
        let Some(key) = key else {
            return self.prev_page();
        };

        let data = self.page.as_slice();
        let payload = self.payload_size();
        let mut child = self.prev_page();
        let mut offset = CELLS_START;

        for _ in 0..self.entry_count() {
            let (separator, key_size) = Key::read_from(self.key_type, &data[offset..]);
            if separator.compare(key) != Ordering::Less {
                break;
            }
            child = PageId::new(read_u32(data, offset + key_size));
            offset += key_size + payload;
        }
        child
    }
}

/// Mutable access to a node page.
pub struct NodeMut<'a> {
    page: &'a mut Page,
    key_type: KeyType,
    page_id: PageId,
}

impl<'a> NodeMut<'a> {
    pub fn new(page: &'a mut Page, key_type: KeyType, page_id: PageId) -> Self {
        Self {
            page,
            key_type,
            page_id,
        }
    }

    /// Format a fresh page as an empty node of the given kind.
    pub fn init(
        page: &'a mut Page,
        page_type: PageType,
        key_type: KeyType,
        page_id: PageId,
    ) -> Self {
        assert!(
            page_type == PageType::BTreeLeaf || page_type == PageType::BTreeIndex,
            "not a b+-tree node type"
        );

        page.reset();
        page.set_header(&PageHeader::new(page_type));

        let data = page.as_mut_slice();
        write_u32(data, OFFSET_PREV, PageId::INVALID.0);
        write_u32(data, OFFSET_NEXT, PageId::INVALID.0);
        write_u16(data, OFFSET_ENTRY_COUNT, 0);
        write_u16(data, OFFSET_USED_BYTES, 0);

        Self::new(page, key_type, page_id)
    }

    pub fn view(&self) -> NodeView<'_> {
        NodeView::new(self.page, self.key_type)
    }

    pub fn set_prev_page(&mut self, page_id: PageId) {
        write_u32(self.page.as_mut_slice(), OFFSET_PREV, page_id.0);
    }

    pub fn set_next_page(&mut self, page_id: PageId) {
        write_u32(self.page.as_mut_slice(), OFFSET_NEXT, page_id.0);
    }

    /// Insert an entry in sorted position.
    ///
    /// Equal keys land after existing equals, so the first entry of a
    /// duplicate run keeps its place.
    ///
    /// # Errors
    /// `Error::NodeFull` if the entry does not fit. Callers size-check
    /// first; hitting this mid-split leaves the tree unusable.
    pub fn insert(&mut self, entry: &Entry) -> Result<()> {
        let size = entry.encoded_size();
        let (count, used) = {
            let view = self.view();
            if size > view.available_space() {
                return Err(Error::NodeFull(self.page_id.0));
            }
            (view.entry_count(), view.used_bytes())
        };

        // First cell with a strictly greater key is the insert point.
        let payload_size = entry.payload.encoded_size();
        let mut offset = CELLS_START;
        {
            let data = self.page.as_slice();
            for _ in 0..count {
                let (key, key_size) = Key::read_from(self.key_type, &data[offset..]);
                if key.compare(&entry.key) == Ordering::Greater {
                    break;
                }
                offset += key_size + payload_size;
            }
        }

        let end = CELLS_START + used;
        let data = self.page.as_mut_slice();
        data.copy_within(offset..end, offset + size);

        let key_size = entry.key.write_to(&mut data[offset..]);
        match &entry.payload {
            Payload::Record(rid) => rid.write_to(&mut data[offset + key_size..]),
            Payload::Child(child) => write_u32(data, offset + key_size, child.0),
        }

        write_u16(data, OFFSET_ENTRY_COUNT, (count + 1) as u16);
        write_u16(data, OFFSET_USED_BYTES, (used + size) as u16);
        Ok(())
    }

    /// Remove and return the entry at `pos`, shifting later cells left.
    ///
    /// # Panics
    /// Panics if `pos` is out of range.
    pub fn remove(&mut self, pos: usize) -> Entry {
        let (entry, offset, count, used) = {
            let view = self.view();
            (
                view.entry(pos),
                view.entry_offset(pos),
                view.entry_count(),
                view.used_bytes(),
            )
        };
        let size = entry.encoded_size();

        let end = CELLS_START + used;
        let data = self.page.as_mut_slice();
        data.copy_within(offset + size..end, offset);

        write_u16(data, OFFSET_ENTRY_COUNT, (count - 1) as u16);
        write_u16(data, OFFSET_USED_BYTES, (used - size) as u16);
        entry
    }

    /// Move every entry of this node into `dst`, which must be an empty
    /// node of the same kind.
    pub fn transfer_all(&mut self, dst: &mut NodeMut<'_>) {
        assert_eq!(dst.view().entry_count(), 0, "destination node not empty");
        assert_eq!(
            self.page.header().page_type,
            dst.page.header().page_type,
            "node kinds differ"
        );

        let count = self.view().entry_count();
        let used = self.view().used_bytes();

        dst.page.as_mut_slice()[CELLS_START..CELLS_START + used]
            .copy_from_slice(&self.page.as_slice()[CELLS_START..CELLS_START + used]);
        write_u16(dst.page.as_mut_slice(), OFFSET_ENTRY_COUNT, count as u16);
        write_u16(dst.page.as_mut_slice(), OFFSET_USED_BYTES, used as u16);

        let data = self.page.as_mut_slice();
        write_u16(data, OFFSET_ENTRY_COUNT, 0);
        write_u16(data, OFFSET_USED_BYTES, 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf_entry(key: i32, rid_page: u32) -> Entry {
        Entry {
            key: Key::Int(key),
            payload: Payload::Record(RecordId::new(PageId::new(rid_page), 0)),
        }
    }

    fn new_leaf(page: &mut Page) -> NodeMut<'_> {
        NodeMut::init(page, PageType::BTreeLeaf, KeyType::Int, PageId::new(1))
    }

    #[test]
    fn test_init_empty_node() {
        let mut page = Page::new();
        let node = new_leaf(&mut page);

        let view = node.view();
        assert!(view.is_leaf());
        assert_eq!(view.entry_count(), 0);
        assert_eq!(view.available_space(), NODE_CAPACITY);
        assert!(!view.prev_page().is_valid());
        assert!(!view.next_page().is_valid());
    }

    #[test]
    fn test_insert_keeps_sorted_order() {
        let mut page = Page::new();
        let mut node = new_leaf(&mut page);

        for key in [5, 1, 9, 3, 7] {
            node.insert(&leaf_entry(key, 0)).unwrap();
        }

        let view = node.view();
        assert_eq!(view.entry_count(), 5);
        let keys: Vec<_> = (0..5).map(|i| view.entry(i).key).collect();
        assert_eq!(
            keys,
            vec![Key::Int(1), Key::Int(3), Key::Int(5), Key::Int(7), Key::Int(9)]
        );
    }

    #[test]
    fn test_duplicates_land_after_equals() {
        let mut page = Page::new();
        let mut node = new_leaf(&mut page);

        node.insert(&leaf_entry(5, 10)).unwrap();
        node.insert(&leaf_entry(5, 20)).unwrap();
        node.insert(&leaf_entry(5, 30)).unwrap();

        let view = node.view();
        let rids: Vec<_> = (0..3)
            .map(|i| match view.entry(i).payload {
                Payload::Record(rid) => rid.page.0,
                _ => panic!("leaf payload"),
            })
            .collect();
        assert_eq!(rids, vec![10, 20, 30]);
    }

    #[test]
    fn test_remove_shifts_cells() {
        let mut page = Page::new();
        let mut node = new_leaf(&mut page);

        for key in 0..4 {
            node.insert(&leaf_entry(key, key as u32)).unwrap();
        }

        let removed = node.remove(1);
        assert_eq!(removed.key, Key::Int(1));

        let view = node.view();
        assert_eq!(view.entry_count(), 3);
        let keys: Vec<_> = (0..3).map(|i| view.entry(i).key).collect();
        assert_eq!(keys, vec![Key::Int(0), Key::Int(2), Key::Int(3)]);
    }

    #[test]
    fn test_insert_full_node_fails() {
        let mut page = Page::new();
        let mut node = new_leaf(&mut page);

        // Int leaf cells are 10 bytes each.
        let capacity = NODE_CAPACITY / 10;
        for key in 0..capacity as i32 {
            node.insert(&leaf_entry(key, 0)).unwrap();
        }

        let err = node.insert(&leaf_entry(-1, 0)).unwrap_err();
        assert!(matches!(err, Error::NodeFull(1)));
    }

    #[test]
    fn test_text_keys_variable_cells() {
        let mut page = Page::new();
        let mut node = NodeMut::init(
            &mut page,
            PageType::BTreeLeaf,
            KeyType::Text,
            PageId::new(1),
        );

        for word in ["pine", "fir", "tamarack", "spruce"] {
            node.insert(&Entry {
                key: Key::Text(word.into()),
                payload: Payload::Record(RecordId::new(PageId::new(0), 0)),
            })
            .unwrap();
        }

        let view = node.view();
        let keys: Vec<_> = (0..4)
            .map(|i| match view.entry(i).key {
                Key::Text(s) => s,
                _ => panic!("text key"),
            })
            .collect();
        assert_eq!(keys, vec!["fir", "pine", "spruce", "tamarack"]);
    }

    #[test]
    fn test_transfer_all() {
        let mut page_a = Page::new();
        let mut page_b = Page::new();
        let mut src = new_leaf(&mut page_a);
        let mut dst = NodeMut::init(
            &mut page_b,
            PageType::BTreeLeaf,
            KeyType::Int,
            PageId::new(2),
        );

        for key in 0..5 {
            src.insert(&leaf_entry(key, 0)).unwrap();
        }
        src.transfer_all(&mut dst);

        assert_eq!(src.view().entry_count(), 0);
        assert_eq!(src.view().available_space(), NODE_CAPACITY);
        assert_eq!(dst.view().entry_count(), 5);
        assert_eq!(dst.view().entry(4).key, Key::Int(4));
    }

    fn index_node(page: &mut Page) -> NodeMut<'_> {
        let mut node =
            NodeMut::init(page, PageType::BTreeIndex, KeyType::Int, PageId::new(1));
        // Leftmost child 100; separators 10 -> 101, 20 -> 102.
        node.set_prev_page(PageId::new(100));
        for (key, child) in [(10, 101), (20, 102)] {
            node.insert(&Entry {
                key: Key::Int(key),
                payload: Payload::Child(PageId::new(child)),
            })
            .unwrap();
        }
        node
    }

    #[test]
    fn test_route_insertion() {
        let mut page = Page::new();
        let node = index_node(&mut page);
        let view = node.view();

        assert_eq!(view.route(&Key::Int(5)), PageId::new(100));
        assert_eq!(view.route(&Key::Int(10)), PageId::new(101));
        assert_eq!(view.route(&Key::Int(15)), PageId::new(101));
        assert_eq!(view.route(&Key::Int(20)), PageId::new(102));
        assert_eq!(view.route(&Key::Int(99)), PageId::new(102));
    }

    #[test]
    fn test_route_leftmost() {
        let mut page = Page::new();
        let node = index_node(&mut page);
        let view = node.view();

        assert_eq!(view.route_leftmost(None), PageId::new(100));
        assert_eq!(view.route_leftmost(Some(&Key::Int(5))), PageId::new(100));
        // An equal separator routes left: the run may start in the
        // preceding leaf.
        assert_eq!(view.route_leftmost(Some(&Key::Int(10))), PageId::new(100));
        assert_eq!(view.route_leftmost(Some(&Key::Int(11))), PageId::new(101));
        assert_eq!(view.route_leftmost(Some(&Key::Int(25))), PageId::new(102));
    }
}
