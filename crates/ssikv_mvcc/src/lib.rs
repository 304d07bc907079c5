//! # SSIKV MVCC
//!
//! Multi-versioned in-memory store for SSIKV.
//!
//! This crate provides the lowest-level storage layer of SSIKV: a sorted,
//! concurrent, multi-version index keyed by `(key, version)`. It has no
//! notion of transactions. Versions are commit timestamps handed out by the
//! transaction layer; this crate only stores and looks them up.
//!
//! ## Design Principles
//!
//! - Keys and values are opaque byte sequences
//! - Every write creates a new version, nothing is updated in place
//! - Reads are point-in-time: a read at version `v` sees the latest
//!   version of the key that is `<= v`
//! - Stores must be `Send + Sync` for concurrent access
//!
//! ## Example
//!
//! ```rust
//! use ssikv_mvcc::{MemTable, Value, VersionedKey, VersionedStore};
//!
//! let memtable = MemTable::new(10).unwrap();
//! memtable.put(VersionedKey::new("HDD", 1), Value::new("Hard disk"));
//! memtable.put(VersionedKey::new("HDD", 2), Value::new("Hard disk drive"));
//!
//! let value = memtable.get(&VersionedKey::new("HDD", 8)).unwrap();
//! assert_eq!(value.as_bytes(), b"Hard disk drive");
//!
//! let value = memtable.get(&VersionedKey::new("HDD", 1)).unwrap();
//! assert_eq!(value.as_bytes(), b"Hard disk");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod key;
mod level;
mod memtable;
mod skiplist;
mod store;
mod value;

pub use error::{MvccError, MvccResult};
pub use key::VersionedKey;
pub use level::LevelGenerator;
pub use memtable::MemTable;
pub use skiplist::{Skiplist, MAX_HEIGHT};
pub use store::VersionedStore;
pub use value::Value;
