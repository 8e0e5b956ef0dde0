//! Eviction policy implementations (replacers).
//!
//! Currently implements:
//! - [`FifoReplacer`] - first-in-first-out eviction

mod fifo;

pub use fifo::FifoReplacer;
