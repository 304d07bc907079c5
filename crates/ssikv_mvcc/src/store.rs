//! Versioned store trait definition.

use crate::key::VersionedKey;
use crate::value::Value;

/// A multi-version key-value index.
///
/// Versioned stores have no transaction awareness. The transaction layer
/// decides which version to write (the commit timestamp) and which version
/// to read at (the begin timestamp).
///
/// # Invariants
///
/// - `put` never overwrites: re-putting an exact `(key, version)` is a no-op
/// - `get(key@v)` returns the binding of the greatest version `<= v` of the
///   same logical key
/// - Implementations must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`crate::MemTable`] - Skiplist-backed in-memory store
pub trait VersionedStore: Send + Sync {
    /// Stores a binding.
    ///
    /// Returns `false` if the exact versioned key was already present, in
    /// which case nothing changes.
    fn put(&self, key: VersionedKey, value: Value) -> bool;

    /// Returns the value visible at `key.version()` for `key.key()`.
    fn get(&self, key: &VersionedKey) -> Option<Value>;

    /// Returns the number of stored bindings across all versions.
    fn len(&self) -> usize;

    /// Returns true if the store holds no bindings.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
