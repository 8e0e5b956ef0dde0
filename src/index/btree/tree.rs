//! The B+-tree handle: lifecycle, insertion, deletion, search, scan,
//! destroy.

use std::cmp::Ordering;
use std::sync::Arc;

use tracing::debug;

use crate::buffer::{PageReadGuard, PageStore};
use crate::common::{Error, PageId, RecordId, Result};
use crate::storage::page::PageType;

use super::header::{DeletePolicy, TreeHeader};
use super::key::{Key, KeyType};
use super::node::{self, Entry, NodeMut, NodeView, Payload};
use super::scan::TreeScan;
use super::split;
use super::trace::TraceSink;

/// Aggregate shape of a tree, as reported by [`BTree::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeStats {
    /// Levels from the root down to the leaves; 0 for an empty tree.
    pub depth: usize,
    /// Total nodes, leaves included.
    pub node_count: usize,
    pub leaf_count: usize,
    /// Leaf entries, i.e. indexed (key, rid) pairs.
    pub entry_count: usize,
}

/// A handle to one named B+-tree in a page store.
///
/// Mutators take `&mut self` and scans borrow `&self`, so within a single
/// handle the borrow checker enforces one writer with no concurrent
/// scans. Serializing access across multiple handles to the same tree is
/// the caller's job.
pub struct BTree {
    store: Arc<PageStore>,
    name: String,
    header_page: PageId,
    header: TreeHeader,
    trace: Option<Box<dyn TraceSink>>,
}

impl BTree {
    /// Open the tree registered under `name`, creating it if absent.
    ///
    /// When the tree already exists, its stored configuration wins and
    /// `max_key_size`/`delete_policy` are ignored, but a `key_type`
    /// mismatch is an error.
    ///
    /// `max_key_size` bounds [`Key::length`] and is validated so a node
    /// always holds at least two entries of maximal size.
    ///
    /// # Errors
    /// - `Error::UnsupportedDeletePolicy` for [`DeletePolicy::Full`]
    /// - `Error::MaxKeySizeTooLarge` if two maximal entries cannot share
    ///   a node
    /// - `Error::KeyTypeMismatch` if the tree exists with a different
    ///   key type
    pub fn create(
        store: Arc<PageStore>,
        name: &str,
        key_type: KeyType,
        max_key_size: usize,
        delete_policy: DeletePolicy,
    ) -> Result<Self> {
        if delete_policy != DeletePolicy::Naive {
            return Err(Error::UnsupportedDeletePolicy(delete_policy));
        }

        // Worst-case cell: length-prefixed key plus a leaf record id.
        let worst_cell = 2 + max_key_size + RecordId::ENCODED_SIZE;
        if max_key_size > u16::MAX as usize || 2 * worst_cell > node::NODE_CAPACITY {
            return Err(Error::MaxKeySizeTooLarge(max_key_size));
        }

        if let Some(header_page) = store.lookup(name)? {
            let tree = Self::open_at(store, name, header_page)?;
            if tree.header.key_type != key_type {
                return Err(Error::KeyTypeMismatch {
                    expected: tree.header.key_type,
                    actual: key_type,
                });
            }
            return Ok(tree);
        }

        let header = TreeHeader {
            root: PageId::INVALID,
            key_type,
            delete_policy,
            max_key_size: max_key_size as u16,
        };
        let header_page = {
            let mut guard = store.new_page()?;
            header.write_to(&mut guard);
            guard.page_id()
        };
        if let Err(e) = store.register(name, header_page) {
            // Registration failed; best effort to return the page.
            let _ = store.free_page(header_page);
            return Err(e);
        }

        debug!(tree = name, header = header_page.0, "created tree");
        Ok(Self {
            store,
            name: name.to_string(),
            header_page,
            header,
            trace: None,
        })
    }

    /// Open an existing tree.
    ///
    /// # Errors
    /// `Error::TreeNotFound` if no tree is registered under `name`.
    pub fn open(store: Arc<PageStore>, name: &str) -> Result<Self> {
        let Some(header_page) = store.lookup(name)? else {
            return Err(Error::TreeNotFound(name.to_string()));
        };
        Self::open_at(store, name, header_page)
    }

    fn open_at(store: Arc<PageStore>, name: &str, header_page: PageId) -> Result<Self> {
        let header = {
            let guard = store.fetch_page_read(header_page)?;
            TreeHeader::read_from(&guard, header_page)?
        };

        Ok(Self {
            store,
            name: name.to_string(),
            header_page,
            header,
            trace: None,
        })
    }

    /// Persist the header and flush every cached page.
    pub fn close(self) -> Result<()> {
        {
            let mut guard = self.store.fetch_page_write(self.header_page)?;
            self.header.write_to(&mut guard);
        }
        self.store.flush_all_pages()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key_type(&self) -> KeyType {
        self.header.key_type
    }

    pub fn delete_policy(&self) -> DeletePolicy {
        self.header.delete_policy
    }

    pub fn max_key_size(&self) -> usize {
        self.header.max_key_size as usize
    }

    pub fn is_empty(&self) -> bool {
        !self.header.root.is_valid()
    }

    /// Install a trace sink observing search descents and destroy.
    pub fn set_trace(&mut self, sink: Box<dyn TraceSink>) {
        self.trace = Some(sink);
    }

    pub fn clear_trace(&mut self) {
        self.trace = None;
    }

    /// Insert a (key, rid) pair.
    ///
    /// Duplicate keys are allowed, even exact (key, rid) duplicates; a
    /// new entry lands after its existing equals.
    pub fn insert(&mut self, key: &Key, rid: RecordId) -> Result<()> {
        self.check_key(key)?;
        let entry = Entry {
            key: key.clone(),
            payload: Payload::Record(rid),
        };

        if !self.header.root.is_valid() {
            // First insert: the root is a single leaf.
            let root_id = {
                let mut guard = self.store.new_page()?;
                let pid = guard.page_id();
                let mut node =
                    NodeMut::init(&mut guard, PageType::BTreeLeaf, self.header.key_type, pid);
                node.insert(&entry)?;
                pid
            };
            debug!(tree = %self.name, root = root_id.0, "created root leaf");
            return self.update_root(root_id);
        }

        if let Some((up_key, up_child)) = self.insert_into(self.header.root, &entry)? {
            // The root split: grow a new index root above both halves.
            let old_root = self.header.root;
            let new_root = {
                let mut guard = self.store.new_page()?;
                let pid = guard.page_id();
                let mut node =
                    NodeMut::init(&mut guard, PageType::BTreeIndex, self.header.key_type, pid);
                node.set_prev_page(old_root);
                node.insert(&Entry {
                    key: up_key,
                    payload: Payload::Child(up_child),
                })?;
                pid
            };
            debug!(tree = %self.name, root = new_root.0, "root split, tree grew");
            self.update_root(new_root)?;
        }
        Ok(())
    }

    /// Recursive insert. Returns the pushed-up (separator, new sibling)
    /// when the node at `page_id` split.
    ///
    /// The parent's pin is released before recursing and re-acquired only
    /// if a push-up comes back, so at most one level is pinned per frame
    /// of the descent plus whatever a split holds briefly.
    fn insert_into(&self, page_id: PageId, entry: &Entry) -> Result<Option<(Key, PageId)>> {
        let key_type = self.header.key_type;
        let mut guard = self.store.fetch_page_write(page_id)?;

        match guard.header().page_type {
            PageType::BTreeLeaf => {
                let mut node = NodeMut::new(&mut guard, key_type, page_id);
                if entry.encoded_size() <= node.view().available_space() {
                    node.insert(entry)?;
                    Ok(None)
                } else {
                    let up =
                        split::split_leaf(&self.store, key_type, &mut guard, page_id, entry)?;
                    Ok(Some(up))
                }
            }
            PageType::BTreeIndex => {
                let child = NodeView::new(&guard, key_type).route(&entry.key);
                drop(guard);

                let Some((up_key, up_child)) = self.insert_into(child, entry)? else {
                    return Ok(None);
                };
                let up = Entry {
                    key: up_key,
                    payload: Payload::Child(up_child),
                };

                let mut guard = self.store.fetch_page_write(page_id)?;
                let mut node = NodeMut::new(&mut guard, key_type, page_id);
                if up.encoded_size() <= node.view().available_space() {
                    node.insert(&up)?;
                    Ok(None)
                } else {
                    let pushed =
                        split::split_index(&self.store, key_type, &mut guard, page_id, &up)?;
                    Ok(Some(pushed))
                }
            }
            _ => Err(Error::Corrupted(page_id.0)),
        }
    }

    /// Delete the exact (key, rid) pair.
    ///
    /// Returns whether a matching entry was removed. An entry with the
    /// right key but a different rid does not match. Nodes are never
    /// merged: a leaf emptied by deletion stays in the chain.
    pub fn delete(&mut self, key: &Key, rid: RecordId) -> Result<bool> {
        if self.header.delete_policy != DeletePolicy::Naive {
            return Err(Error::UnsupportedDeletePolicy(self.header.delete_policy));
        }
        self.check_key(key)?;

        if !self.header.root.is_valid() {
            return Ok(false);
        }
        let key_type = self.header.key_type;

        // Descend to the first leaf that can hold the key.
        let mut page_id = self.header.root;
        loop {
            let guard = self.store.fetch_page_read(page_id)?;
            self.trace_visit(page_id);
            match guard.header().page_type {
                PageType::BTreeIndex => {
                    page_id = NodeView::new(&guard, key_type).route_leftmost(Some(key));
                }
                PageType::BTreeLeaf => break,
                _ => return Err(Error::Corrupted(page_id.0)),
            }
        }

        // Walk the duplicate run, following the chain as needed.
        loop {
            let mut guard = self.store.fetch_page_write(page_id)?;
            let mut node = NodeMut::new(&mut guard, key_type, page_id);

            let count = node.view().entry_count();
            for pos in 0..count {
                let entry = node.view().entry(pos);
                match entry.key.compare(key) {
                    Ordering::Less => continue,
                    Ordering::Greater => return Ok(false),
                    Ordering::Equal => {
                        if entry.payload == Payload::Record(rid) {
                            node.remove(pos);
                            return Ok(true);
                        }
                    }
                }
            }

            let next = node.view().next_page();
            drop(guard);
            if !next.is_valid() {
                return Ok(false);
            }
            page_id = next;
        }
    }

    /// Find the leftmost entry with key >= `lo` (the first entry of the
    /// tree for `None`), returning the pinned leaf and the position
    /// within it.
    ///
    /// Returns `None` when every key in the tree is below `lo`, or the
    /// tree is empty.
    pub(super) fn find_run_start(
        &self,
        lo: Option<&Key>,
    ) -> Result<Option<(PageReadGuard<'_>, usize)>> {
        if !self.header.root.is_valid() {
            return Ok(None);
        }
        let key_type = self.header.key_type;

        let mut page_id = self.header.root;
        let mut guard = self.store.fetch_page_read(page_id)?;
        self.trace_visit(page_id);
        while guard.header().page_type == PageType::BTreeIndex {
            let child = NodeView::new(&guard, key_type).route_leftmost(lo);
            drop(guard);
            page_id = child;
            guard = self.store.fetch_page_read(page_id)?;
            self.trace_visit(page_id);
        }
        if guard.header().page_type != PageType::BTreeLeaf {
            return Err(Error::Corrupted(page_id.0));
        }

        // The descent can land left of the run (empty leaves, or an
        // equal separator). Walk forward until a qualifying entry.
        let mut pos = 0;
        loop {
            let (count, next) = {
                let view = NodeView::new(&guard, key_type);
                (view.entry_count(), view.next_page())
            };

            while pos < count {
                let entry_key = NodeView::new(&guard, key_type).entry(pos).key;
                match lo {
                    Some(lo) if entry_key.compare(lo) == Ordering::Less => pos += 1,
                    _ => return Ok(Some((guard, pos))),
                }
            }

            drop(guard);
            if !next.is_valid() {
                return Ok(None);
            }
            guard = self.store.fetch_page_read(next)?;
            self.trace_visit(next);
            pos = 0;
        }
    }

    /// Open a forward scan over `[lo, hi]`, both bounds inclusive and
    /// optional.
    ///
    /// For an inverted range (`lo > hi`) the scan is simply empty.
    pub fn scan(&self, lo: Option<&Key>, hi: Option<&Key>) -> Result<TreeScan<'_>> {
        if let Some(lo) = lo {
            self.check_key_type(lo)?;
        }
        if let Some(hi) = hi {
            self.check_key_type(hi)?;
        }

        let key_type = self.header.key_type;
        match self.find_run_start(lo)? {
            Some((guard, pos)) => Ok(TreeScan::new(
                self.store.as_ref(),
                key_type,
                hi.cloned(),
                Some(guard),
                pos,
            )),
            None => Ok(TreeScan::empty(self.store.as_ref(), key_type)),
        }
    }

    /// Tear the tree down: free every node, the header page, and the
    /// catalog entry. Consumes the handle; freed pages return to the
    /// store's free list.
    pub fn destroy(self) -> Result<()> {
        debug!(tree = %self.name, "destroying tree");
        let key_type = self.header.key_type;

        let mut worklist = Vec::new();
        if self.header.root.is_valid() {
            worklist.push(self.header.root);
        }
        while let Some(page_id) = worklist.pop() {
            {
                let guard = self.store.fetch_page_read(page_id)?;
                if guard.header().page_type == PageType::BTreeIndex {
                    let view = NodeView::new(&guard, key_type);
                    let mut children = Vec::with_capacity(view.entry_count() + 1);
                    children.push(view.prev_page());
                    for pos in 0..view.entry_count() {
                        children.push(view.child_at(pos));
                    }
                    if let Some(trace) = &self.trace {
                        trace.node_children(page_id, &children);
                    }
                    worklist.extend_from_slice(&children);
                }
            }
            self.store.free_page(page_id)?;
        }

        self.store.free_page(self.header_page)?;
        self.store.remove(&self.name)
    }

    /// Walk the whole tree and report its shape.
    ///
    /// Also verifies that every leaf sits at the same depth, returning
    /// `Error::Corrupted` if not.
    pub fn stats(&self) -> Result<TreeStats> {
        let key_type = self.header.key_type;
        let mut stats = TreeStats {
            depth: 0,
            node_count: 0,
            leaf_count: 0,
            entry_count: 0,
        };
        if !self.header.root.is_valid() {
            return Ok(stats);
        }

        let mut leaf_depth = None;
        let mut worklist = vec![(self.header.root, 1usize)];
        while let Some((page_id, depth)) = worklist.pop() {
            let guard = self.store.fetch_page_read(page_id)?;
            stats.node_count += 1;
            stats.depth = stats.depth.max(depth);

            match guard.header().page_type {
                PageType::BTreeLeaf => {
                    let view = NodeView::new(&guard, key_type);
                    stats.leaf_count += 1;
                    stats.entry_count += view.entry_count();
                    match leaf_depth {
                        None => leaf_depth = Some(depth),
                        Some(d) if d != depth => return Err(Error::Corrupted(page_id.0)),
                        Some(_) => {}
                    }
                }
                PageType::BTreeIndex => {
                    let view = NodeView::new(&guard, key_type);
                    worklist.push((view.prev_page(), depth + 1));
                    for pos in 0..view.entry_count() {
                        worklist.push((view.child_at(pos), depth + 1));
                    }
                }
                _ => return Err(Error::Corrupted(page_id.0)),
            }
        }
        Ok(stats)
    }

    fn update_root(&mut self, root: PageId) -> Result<()> {
        self.header.root = root;
        let mut guard = self.store.fetch_page_write(self.header_page)?;
        self.header.write_to(&mut guard);
        Ok(())
    }

    fn check_key(&self, key: &Key) -> Result<()> {
        self.check_key_type(key)?;
        let max = self.header.max_key_size as usize;
        if key.length() > max {
            return Err(Error::KeyTooLarge {
                actual: key.length(),
                max,
            });
        }
        Ok(())
    }

    fn check_key_type(&self, key: &Key) -> Result<()> {
        if key.key_type() != self.header.key_type {
            return Err(Error::KeyTypeMismatch {
                expected: self.header.key_type,
                actual: key.key_type(),
            });
        }
        Ok(())
    }

    fn trace_visit(&self, page_id: PageId) {
        if let Some(trace) = &self.trace {
            trace.node_visited(page_id);
        }
    }
}
