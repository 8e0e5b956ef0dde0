//! Structural trace hooks.
//!
//! A [`TraceSink`] observes which nodes the tree touches: searches report
//! every node on the descent path, and destroy reports each index node's
//! children as the tree is torn down. The sink is purely diagnostic and
//! feeds nothing back into the algorithms.

use std::io::Write;

use parking_lot::Mutex;

use crate::common::PageId;

/// Observer for the tree's structural traversal.
///
/// Methods take `&self`; implementations that accumulate state use
/// interior mutability.
pub trait TraceSink {
    /// A node was visited during a search descent.
    fn node_visited(&self, page: PageId);

    /// An index node's children, leftmost first, reported during destroy.
    fn node_children(&self, page: PageId, children: &[PageId]);
}

/// A [`TraceSink`] that writes one line per event.
///
/// Write failures are swallowed: the trace must never fail an index
/// operation.
pub struct WriteTrace<W: Write> {
    out: Mutex<W>,
}

impl<W: Write> WriteTrace<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// Recover the underlying writer.
    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

impl<W: Write> TraceSink for WriteTrace<W> {
    fn node_visited(&self, page: PageId) {
        let _ = writeln!(self.out.lock(), "visit {}", page.0);
    }

    fn node_children(&self, page: PageId, children: &[PageId]) {
        let mut out = self.out.lock();
        let _ = write!(out, "children {}:", page.0);
        for child in children {
            let _ = write!(out, " {}", child.0);
        }
        let _ = writeln!(out);
    }
}
