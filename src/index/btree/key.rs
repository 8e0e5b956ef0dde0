//! Key model for the B+-tree.
//!
//! A tree is keyed by exactly one [`KeyType`], fixed at creation. Handing
//! a key of the other type to any operation is a configuration error
//! surfaced before any page is touched, so node code can compare keys
//! without re-checking types.

use std::cmp::Ordering;
use std::fmt;

/// The key type a tree is configured with at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    /// 32-bit signed integer keys.
    Int,
    /// Variable-length string keys, ordered bytewise.
    Text,
}

impl KeyType {
    pub(crate) fn as_u8(self) -> u8 {
        match self {
            KeyType::Int => 0,
            KeyType::Text => 1,
        }
    }

    pub(crate) fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(KeyType::Int),
            1 => Some(KeyType::Text),
            _ => None,
        }
    }
}

/// A key value, either in a caller's hands or decoded from a node cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    Int(i32),
    Text(String),
}

impl Key {
    /// The type of this key.
    pub fn key_type(&self) -> KeyType {
        match self {
            Key::Int(_) => KeyType::Int,
            Key::Text(_) => KeyType::Text,
        }
    }

    /// Length of the key value itself, in bytes.
    ///
    /// This is what the tree's configured maximum key size bounds: 4 for
    /// an int, the string length for text.
    pub fn length(&self) -> usize {
        match self {
            Key::Int(_) => 4,
            Key::Text(s) => s.len(),
        }
    }

    /// On-page size: ints are 4 bytes, text carries a u16 length prefix.
    pub fn encoded_size(&self) -> usize {
        match self {
            Key::Int(_) => 4,
            Key::Text(s) => 2 + s.len(),
        }
    }

    /// Encode into `buf`, returning the number of bytes written.
    pub(crate) fn write_to(&self, buf: &mut [u8]) -> usize {
        match self {
            Key::Int(v) => {
                buf[..4].copy_from_slice(&v.to_le_bytes());
                4
            }
            Key::Text(s) => {
                let len = s.len();
                buf[..2].copy_from_slice(&(len as u16).to_le_bytes());
                buf[2..2 + len].copy_from_slice(s.as_bytes());
                2 + len
            }
        }
    }

    /// Decode a key of the given type from the start of `buf`, returning
    /// the key and the number of bytes consumed.
    pub(crate) fn read_from(key_type: KeyType, buf: &[u8]) -> (Key, usize) {
        match key_type {
            KeyType::Int => {
                let v = i32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
                (Key::Int(v), 4)
            }
            KeyType::Text => {
                let len = u16::from_le_bytes([buf[0], buf[1]]) as usize;
                let s = String::from_utf8_lossy(&buf[2..2 + len]).into_owned();
                (Key::Text(s), 2 + len)
            }
        }
    }

    /// Total order over keys of the same type.
    ///
    /// Key types are verified at the tree boundary, so a cross-type
    /// comparison here is an internal bug.
    pub(crate) fn compare(&self, other: &Key) -> Ordering {
        match (self, other) {
            (Key::Int(a), Key::Int(b)) => a.cmp(b),
            (Key::Text(a), Key::Text(b)) => a.as_bytes().cmp(b.as_bytes()),
            _ => unreachable!("key types verified at the tree boundary"),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(v) => write!(f, "{v}"),
            Key::Text(s) => write!(f, "{s:?}"),
        }
    }
}
