//! Lock-guarded skiplist memtable.

use crate::error::MvccResult;
use crate::key::VersionedKey;
use crate::skiplist::Skiplist;
use crate::store::VersionedStore;
use crate::value::Value;
use parking_lot::RwLock;

/// An in-memory multi-version store.
///
/// The memtable wraps a [`Skiplist`] in a reader/writer lock: writers take
/// the lock exclusively, readers share it. In SSIKV a single applier thread
/// is the only writer, so readers never observe a half-applied batch from
/// another writer.
///
/// # Example
///
/// ```rust
/// use ssikv_mvcc::{MemTable, Value, VersionedKey, VersionedStore};
///
/// let memtable = MemTable::new(10).unwrap();
/// assert!(memtable.put(VersionedKey::new("HDD", 1), Value::new("Hard disk")));
/// assert!(memtable.get(&VersionedKey::new("Storage", 1)).is_none());
/// ```
#[derive(Debug)]
pub struct MemTable {
    skiplist: RwLock<Skiplist>,
}

impl MemTable {
    /// Creates an empty memtable.
    ///
    /// # Errors
    ///
    /// Returns an error if `max_height` is outside `1..=MAX_HEIGHT`.
    pub fn new(max_height: usize) -> MvccResult<Self> {
        Ok(Self {
            skiplist: RwLock::new(Skiplist::new(max_height)?),
        })
    }

    /// Creates an empty memtable with deterministic tower heights.
    ///
    /// # Errors
    ///
    /// Returns an error if `max_height` is outside `1..=MAX_HEIGHT`.
    pub fn with_seed(max_height: usize, seed: u64) -> MvccResult<Self> {
        Ok(Self {
            skiplist: RwLock::new(Skiplist::with_seed(max_height, seed)?),
        })
    }

    /// Returns the maximum tower height.
    #[must_use]
    pub fn max_height(&self) -> usize {
        self.skiplist.read().max_height()
    }

    /// Returns a copy of every binding in versioned key order.
    ///
    /// Useful for testing and debugging.
    #[must_use]
    pub fn entries(&self) -> Vec<(VersionedKey, Value)> {
        self.skiplist
            .read()
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

impl VersionedStore for MemTable {
    fn put(&self, key: VersionedKey, value: Value) -> bool {
        self.skiplist.write().insert(key, value)
    }

    fn get(&self, key: &VersionedKey) -> Option<Value> {
        self.skiplist.read().get(key).cloned()
    }

    fn len(&self) -> usize {
        self.skiplist.read().len()
    }
}
