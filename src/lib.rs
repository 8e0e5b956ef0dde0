//! # tamarack
//!
//! A disk-resident B+-tree index over a buffer-pooled page store.
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                Index Layer (index/)              │
//! │   BTree: insert/split, naive delete, leftmost    │
//! │   search, range scans, destroy                   │
//! └──────────────────────────────────────────────────┘
//!                          ↓
//! ┌──────────────────────────────────────────────────┐
//! │               Page Store (buffer/)               │
//! │   Fixed frame pool, RAII pin guards, FIFO        │
//! │   eviction, statistics                           │
//! └──────────────────────────────────────────────────┘
//!                          ↓
//! ┌──────────────────────────────────────────────────┐
//! │              Storage Layer (storage/)            │
//! │   DiskManager: page I/O, checksums, free list,   │
//! │   tree name catalog                              │
//! └──────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (PageId, RecordId, Error, config)
//! - [`storage`] - Disk I/O and page formats
//! - [`buffer`] - The page store and eviction policies
//! - [`index`] - The B+-tree
//!
//! # Quick Start
//! ```no_run
//! use std::sync::Arc;
//! use tamarack::{BTree, DeletePolicy, DiskManager, Key, KeyType, PageStore, RecordId, PageId};
//!
//! let dm = DiskManager::open_or_create("index.db").unwrap();
//! let store = Arc::new(PageStore::new(64, dm));
//!
//! let mut tree =
//!     BTree::create(store, "orders", KeyType::Int, 4, DeletePolicy::Naive).unwrap();
//! tree.insert(&Key::Int(42), RecordId::new(PageId::new(9), 0)).unwrap();
//!
//! for entry in tree.scan(None, None).unwrap() {
//!     let (key, rid) = entry.unwrap();
//!     println!("{key} -> {rid}");
//! }
//! ```

pub mod buffer;
pub mod common;
pub mod index;
pub mod storage;

// Re-export commonly used items at crate root for convenience
pub use common::config::PAGE_SIZE;
pub use common::{Error, FrameId, PageId, RecordId, Result};

pub use buffer::{PageReadGuard, PageStore, PageStoreStats, PageWriteGuard, StatsSnapshot};
pub use index::btree::{
    BTree, DeletePolicy, Key, KeyType, TraceSink, TreeScan, TreeStats, WriteTrace,
};
pub use storage::page::{Page, PageHeader, PageType};
pub use storage::DiskManager;
