//! The page store: buffer pool management.
//!
//! The page store is the in-memory cache layer between the B+-tree and
//! disk. It manages a fixed pool of frames, each holding one page, and
//! exposes pins exclusively through RAII guards.
//!
//! # Components
//! - [`PageStore`] - The main page cache plus allocation and catalog ops
//! - [`Frame`] - A slot in the pool holding a page + metadata
//! - [`PageReadGuard`] / [`PageWriteGuard`] - RAII guards for page access
//! - [`PageStoreStats`] - Performance statistics
//! - [`replacer`] - Eviction policy implementations

mod frame;
mod page_guard;
mod page_store;
pub mod replacer;
mod stats;

pub use frame::Frame;
pub use page_guard::{PageReadGuard, PageWriteGuard};
pub use page_store::PageStore;
pub use stats::{PageStoreStats, StatsSnapshot};
