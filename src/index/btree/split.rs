//! Node splitting.
//!
//! Splits keep sibling nodes balanced by free space rather than entry
//! count, which handles variable-length text keys: the node that ends up
//! with fewer, larger entries is just as full as its sibling.

use std::cmp::Ordering;

use tracing::trace;

use crate::buffer::PageStore;
use crate::common::{PageId, Result};
use crate::storage::page::{Page, PageType};

use super::key::{Key, KeyType};
use super::node::{Entry, NodeMut, Payload};

/// Split an overflowing leaf, placing `new` in the half it sorts into.
///
/// Returns the separator to push up: a copy of the sibling's first key,
/// paired with the sibling's page id. The sibling is spliced into the
/// chain after the original, and the old successor's back-pointer is
/// updated to keep the chain doubly linked.
pub(super) fn split_leaf(
    store: &PageStore,
    key_type: KeyType,
    page: &mut Page,
    page_id: PageId,
    new: &Entry,
) -> Result<(Key, PageId)> {
    let mut sibling_guard = store.new_page()?;
    let sibling_id = sibling_guard.page_id();

    let mut original = NodeMut::new(page, key_type, page_id);
    let old_next = original.view().next_page();
    let mut sibling = NodeMut::init(
        &mut sibling_guard,
        PageType::BTreeLeaf,
        key_type,
        sibling_id,
    );

    redistribute(&mut original, &mut sibling, new)?;

    sibling.set_prev_page(page_id);
    sibling.set_next_page(old_next);
    original.set_next_page(sibling_id);
    if old_next.is_valid() {
        let mut next_guard = store.fetch_page_write(old_next)?;
        NodeMut::new(&mut next_guard, key_type, old_next).set_prev_page(sibling_id);
    }

    let up_key = sibling.view().entry(0).key;
    trace!(original = page_id.0, sibling = sibling_id.0, "leaf split");
    Ok((up_key, sibling_id))
}

/// Split an overflowing index node.
///
/// Unlike a leaf split, the separator moves up rather than being copied:
/// the sibling's first entry is removed and its child becomes the
/// sibling's leftmost child.
pub(super) fn split_index(
    store: &PageStore,
    key_type: KeyType,
    page: &mut Page,
    page_id: PageId,
    new: &Entry,
) -> Result<(Key, PageId)> {
    let mut sibling_guard = store.new_page()?;
    let sibling_id = sibling_guard.page_id();

    let mut original = NodeMut::new(page, key_type, page_id);
    let mut sibling = NodeMut::init(
        &mut sibling_guard,
        PageType::BTreeIndex,
        key_type,
        sibling_id,
    );

    redistribute(&mut original, &mut sibling, new)?;

    let first = sibling.remove(0);
    let Payload::Child(leftmost) = first.payload else {
        unreachable!("index entries carry child ids");
    };
    sibling.set_prev_page(leftmost);

    trace!(original = page_id.0, sibling = sibling_id.0, "index split");
    Ok((first.key, sibling_id))
}

/// Rebalance every entry of `original` (which cannot fit `new`) across
/// itself and the empty `sibling`, then place `new` in the half it
/// belongs to.
fn redistribute(
    original: &mut NodeMut<'_>,
    sibling: &mut NodeMut<'_>,
    new: &Entry,
) -> Result<()> {
    original.transfer_all(sibling);

    // Move entries back from the sibling's head until the original is no
    // freer than the sibling.
    let mut undo: Option<Entry> = None;
    while original.view().available_space() > sibling.view().available_space() {
        if sibling.view().entry_count() == 0 {
            break;
        }
        let moved = sibling.remove(0);
        original.insert(&moved)?;
        undo = Some(moved);
    }
    let Some(undo) = undo else {
        unreachable!("splitting an overflowing node moves at least one entry");
    };

    // If the incoming entry belongs in the original but the last move
    // left the original fuller, undo that move.
    let new_goes_left = new.key.compare(&undo.key) == Ordering::Less;
    if new_goes_left
        && original.view().available_space() < sibling.view().available_space()
    {
        let last = original.view().entry_count() - 1;
        let moved = original.remove(last);
        sibling.insert(&moved)?;
    }

    if new_goes_left {
        original.insert(new)?;
    } else {
        sibling.insert(new)?;
    }
    Ok(())
}
