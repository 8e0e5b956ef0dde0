//! Disk-resident B+-tree index.
//!
//! A [`BTree`] maps keys to record ids over pages cached by the
//! [`PageStore`](crate::buffer::PageStore). The structure is classic:
//! sorted nodes, all leaves at the same depth, leaves doubly linked into
//! a chain for range scans. Duplicate keys are allowed and always form a
//! contiguous run in that chain.
//!
//! # Mutation
//! Insertion splits full nodes bottom-up: a leaf split copies its
//! sibling's first key up as a separator, an index split moves it up.
//! Deletion is deliberately naive: it removes the exact (key, rid) entry
//! and never merges, so leaves may sit empty in the chain until the tree
//! is destroyed.
//!
//! # Search
//! Lookups find the *leftmost* entry at or above the search key, so a
//! scan over `[k, k]` yields every duplicate of `k`. [`TreeScan`] walks
//! the chain forward, one pinned leaf at a time.

mod header;
mod key;
mod node;
mod scan;
mod split;
mod trace;
mod tree;

pub use header::DeletePolicy;
pub use key::{Key, KeyType};
pub use scan::TreeScan;
pub use trace::{TraceSink, WriteTrace};
pub use tree::{BTree, TreeStats};
