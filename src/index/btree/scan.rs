//! Forward range scan over the leaf chain.

use std::cmp::Ordering;

use crate::buffer::{PageReadGuard, PageStore};
use crate::common::{RecordId, Result};

use super::key::{Key, KeyType};
use super::node::{NodeView, Payload};

/// A forward iterator over the entries of one tree, in key order.
///
/// The scan pins exactly one leaf at a time and moves rightward along
/// the sibling chain; the pin is released by [`TreeScan::close`], by
/// exhaustion, or by drop. A scan is not restartable: once finished or
/// closed it stays empty.
///
/// Mutating the tree while a scan is open is excluded by the borrow
/// checker (the scan borrows the tree handle shared).
pub struct TreeScan<'a> {
    store: &'a PageStore,
    key_type: KeyType,
    /// Inclusive upper bound, or `None` for an unbounded scan.
    hi: Option<Key>,
    /// The currently pinned leaf; `None` once finished.
    leaf: Option<PageReadGuard<'a>>,
    pos: usize,
}

impl<'a> TreeScan<'a> {
    pub(super) fn new(
        store: &'a PageStore,
        key_type: KeyType,
        hi: Option<Key>,
        leaf: Option<PageReadGuard<'a>>,
        pos: usize,
    ) -> Self {
        Self {
            store,
            key_type,
            hi,
            leaf,
            pos,
        }
    }

    pub(super) fn empty(store: &'a PageStore, key_type: KeyType) -> Self {
        Self::new(store, key_type, None, None, 0)
    }

    /// Release the pinned leaf and end the scan. Idempotent; dropping the
    /// scan has the same effect.
    pub fn close(&mut self) {
        self.leaf = None;
    }

    /// Advance to the next non-empty leaf, or finish the scan.
    fn advance_leaf(&mut self) -> Result<()> {
        loop {
            let Some(guard) = self.leaf.take() else {
                return Ok(());
            };
            let next = NodeView::new(&guard, self.key_type).next_page();
            drop(guard);

            if !next.is_valid() {
                return Ok(());
            }

            let guard = self.store.fetch_page_read(next)?;
            let count = NodeView::new(&guard, self.key_type).entry_count();
            self.leaf = Some(guard);
            self.pos = 0;
            if count > 0 {
                return Ok(());
            }
        }
    }
}

impl Iterator for TreeScan<'_> {
    type Item = Result<(Key, RecordId)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = {
                let guard = self.leaf.as_ref()?;
                let view = NodeView::new(guard, self.key_type);
                (self.pos < view.entry_count()).then(|| view.entry(self.pos))
            };

            let Some(entry) = entry else {
                // Leaf exhausted: step along the chain.
                if let Err(e) = self.advance_leaf() {
                    self.close();
                    return Some(Err(e));
                }
                if self.leaf.is_none() {
                    return None;
                }
                continue;
            };

            if let Some(hi) = &self.hi {
                if entry.key.compare(hi) == Ordering::Greater {
                    self.close();
                    return None;
                }
            }

            self.pos += 1;
            return match entry.payload {
                Payload::Record(rid) => Some(Ok((entry.key, rid))),
                Payload::Child(_) => unreachable!("leaf entries carry record ids"),
            };
        }
    }
}
