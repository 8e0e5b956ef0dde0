//! Tree header page codec.
//!
//! Each tree owns one header page, registered under its name in the
//! directory. The header carries the root pointer and the key
//! configuration; everything else about the tree is reachable from the
//! root.

use crate::common::{Error, PageId, Result};
use crate::storage::page::{Page, PageHeader, PageType};

use super::key::KeyType;

/// What `delete` does to an underfull leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletePolicy {
    /// Remove the entry and leave the node as is, even empty. Empty
    /// leaves stay in the sibling chain and are skipped by searches.
    Naive,
    /// Merge or redistribute on underflow. Not implemented: rejected at
    /// creation and again if found in a header.
    Full,
}

impl DeletePolicy {
    pub(crate) fn as_u8(self) -> u8 {
        match self {
            DeletePolicy::Naive => 0,
            DeletePolicy::Full => 1,
        }
    }

    pub(crate) fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(DeletePolicy::Naive),
            1 => Some(DeletePolicy::Full),
            _ => None,
        }
    }
}

/// Magic stamped into every header page.
pub(super) const MAGIC: u32 = 1989;

const OFFSET_MAGIC: usize = PageHeader::SIZE;
const OFFSET_ROOT: usize = OFFSET_MAGIC + 4;
const OFFSET_KEY_TYPE: usize = OFFSET_ROOT + 4;
const OFFSET_POLICY: usize = OFFSET_KEY_TYPE + 1;
const OFFSET_MAX_KEY_SIZE: usize = OFFSET_POLICY + 1;

/// In-memory image of a tree's header page.
///
/// The tree handle caches this and writes it back whenever the root
/// changes, so the header page is not kept pinned between operations.
#[derive(Debug, Clone, Copy)]
pub(super) struct TreeHeader {
    /// Root node, or `PageId::INVALID` for an empty tree.
    pub root: PageId,
    pub key_type: KeyType,
    pub delete_policy: DeletePolicy,
    pub max_key_size: u16,
}

impl TreeHeader {
    pub fn read_from(page: &Page, page_id: PageId) -> Result<Self> {
        if page.header().page_type != PageType::BTreeHeader {
            return Err(Error::Corrupted(page_id.0));
        }

        let data = page.as_slice();
        let magic = u32::from_le_bytes([
            data[OFFSET_MAGIC],
            data[OFFSET_MAGIC + 1],
            data[OFFSET_MAGIC + 2],
            data[OFFSET_MAGIC + 3],
        ]);
        if magic != MAGIC {
            return Err(Error::Corrupted(page_id.0));
        }

        let root = PageId::new(u32::from_le_bytes([
            data[OFFSET_ROOT],
            data[OFFSET_ROOT + 1],
            data[OFFSET_ROOT + 2],
            data[OFFSET_ROOT + 3],
        ]));
        let key_type =
            KeyType::from_u8(data[OFFSET_KEY_TYPE]).ok_or(Error::Corrupted(page_id.0))?;
        let delete_policy =
            DeletePolicy::from_u8(data[OFFSET_POLICY]).ok_or(Error::Corrupted(page_id.0))?;
        let max_key_size =
            u16::from_le_bytes([data[OFFSET_MAX_KEY_SIZE], data[OFFSET_MAX_KEY_SIZE + 1]]);

        Ok(Self {
            root,
            key_type,
            delete_policy,
            max_key_size,
        })
    }

    pub fn write_to(&self, page: &mut Page) {
        page.set_header(&PageHeader::new(PageType::BTreeHeader));

        let data = page.as_mut_slice();
        data[OFFSET_MAGIC..OFFSET_MAGIC + 4].copy_from_slice(&MAGIC.to_le_bytes());
        data[OFFSET_ROOT..OFFSET_ROOT + 4].copy_from_slice(&self.root.0.to_le_bytes());
        data[OFFSET_KEY_TYPE] = self.key_type.as_u8();
        data[OFFSET_POLICY] = self.delete_policy.as_u8();
        data[OFFSET_MAX_KEY_SIZE..OFFSET_MAX_KEY_SIZE + 2]
            .copy_from_slice(&self.max_key_size.to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_roundtrip() {
        let header = TreeHeader {
            root: PageId::new(7),
            key_type: KeyType::Text,
            delete_policy: DeletePolicy::Naive,
            max_key_size: 250,
        };

        let mut page = Page::new();
        header.write_to(&mut page);

        let read = TreeHeader::read_from(&page, PageId::new(3)).unwrap();
        assert_eq!(read.root, PageId::new(7));
        assert_eq!(read.key_type, KeyType::Text);
        assert_eq!(read.delete_policy, DeletePolicy::Naive);
        assert_eq!(read.max_key_size, 250);
    }

    #[test]
    fn test_empty_tree_root_sentinel() {
        let header = TreeHeader {
            root: PageId::INVALID,
            key_type: KeyType::Int,
            delete_policy: DeletePolicy::Naive,
            max_key_size: 4,
        };

        let mut page = Page::new();
        header.write_to(&mut page);

        let read = TreeHeader::read_from(&page, PageId::new(1)).unwrap();
        assert!(!read.root.is_valid());
    }

    #[test]
    fn test_bad_magic_is_corruption() {
        let header = TreeHeader {
            root: PageId::INVALID,
            key_type: KeyType::Int,
            delete_policy: DeletePolicy::Naive,
            max_key_size: 4,
        };

        let mut page = Page::new();
        header.write_to(&mut page);
        page.as_mut_slice()[OFFSET_MAGIC] ^= 0xFF;

        assert!(matches!(
            TreeHeader::read_from(&page, PageId::new(1)),
            Err(Error::Corrupted(1))
        ));
    }

    #[test]
    fn test_wrong_page_type_is_corruption() {
        let page = Page::new();
        assert!(matches!(
            TreeHeader::read_from(&page, PageId::new(1)),
            Err(Error::Corrupted(1))
        ));
    }
}
