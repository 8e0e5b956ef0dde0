//! Error types for tamarack.

use thiserror::Error;

use crate::index::btree::{DeletePolicy, KeyType};

/// Convenient Result type alias.
///
/// Instead of writing `Result<T, Error>` everywhere, we can write `Result<T>`.
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors in tamarack.
///
/// One error type for the whole crate keeps propagation uniform: page-store
/// failures, catalog failures, and index configuration failures all travel
/// through the same `Result`. Not-found outcomes (a delete that matches
/// nothing, a search past the last key) are ordinary `bool`/`None` results,
/// never errors.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from disk operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested page does not exist on disk.
    #[error("page {0} not found")]
    PageNotFound(u32),

    /// Buffer pool has no free frames and cannot evict any pages.
    ///
    /// This happens when all frames are pinned.
    #[error("no free frames available in page store")]
    NoFreeFrames,

    /// The page id is not one this operation may touch (freeing the
    /// directory page, freeing a page past the end of the file, ...).
    #[error("invalid page id: {0}")]
    InvalidPageId(u32),

    /// Attempted to free a page that is still pinned.
    #[error("page {0} is still pinned")]
    PagePinned(u32),

    /// A page failed checksum verification when read from disk.
    #[error("page {0} is corrupted (checksum mismatch)")]
    Corrupted(u32),

    /// No tree with this name is registered in the directory.
    #[error("tree '{0}' not found")]
    TreeNotFound(String),

    /// A tree with this name is already registered.
    #[error("tree '{0}' already exists")]
    TreeExists(String),

    /// Tree names are limited to 255 bytes by the directory encoding.
    #[error("tree name is too long ({0} bytes, max 255)")]
    NameTooLong(usize),

    /// The directory page has no room for another catalog entry.
    #[error("tree directory is full")]
    DirectoryFull,

    /// A key of the wrong type was given to a tree (configuration error).
    #[error("key type mismatch: tree is keyed by {expected:?}, got {actual:?}")]
    KeyTypeMismatch { expected: KeyType, actual: KeyType },

    /// A key's encoding exceeds the tree's configured maximum (capacity
    /// error).
    #[error("key of {actual} bytes exceeds the configured maximum of {max}")]
    KeyTooLarge { actual: usize, max: usize },

    /// The requested maximum key size leaves no room for entries in a node
    /// (configuration error at tree creation).
    #[error("max key size {0} does not fit a b+-tree node")]
    MaxKeySizeTooLarge(usize),

    /// The tree's delete policy is not implemented (policy error).
    #[error("unsupported delete policy: {0:?}")]
    UnsupportedDeletePolicy(DeletePolicy),

    /// An entry was inserted into a node without room for it.
    ///
    /// Callers size-check before inserting, so this surfaces only on an
    /// internal invariant violation mid-split; the tree must be treated as
    /// unusable after it (see the split contract).
    #[error("no space left in node {0}")]
    NodeFull(u32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::PageNotFound(42);
        assert_eq!(format!("{}", err), "page 42 not found");

        let err = Error::NoFreeFrames;
        assert_eq!(
            format!("{}", err),
            "no free frames available in page store"
        );

        let err = Error::TreeNotFound("orders".into());
        assert_eq!(format!("{}", err), "tree 'orders' not found");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();

        match err {
            Error::Io(_) => {}
            _ => panic!("Expected Io error"),
        }
    }
}
