//! Staged writes.

use crate::error::{CoreError, CoreResult};
use crate::types::Timestamp;
use bytes::Bytes;
use std::collections::btree_map;
use std::collections::BTreeMap;

/// Writes staged by a read-write transaction, ordered by key.
///
/// A key can be staged once; staging it again is rejected so a transaction
/// never silently overwrites its own write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    pairs: BTreeMap<Bytes, Bytes>,
}

impl Batch {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages `key -> value`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DuplicateKey`] if `key` is already staged.
    pub fn add(&mut self, key: impl Into<Bytes>, value: impl Into<Bytes>) -> CoreResult<()> {
        match self.pairs.entry(key.into()) {
            btree_map::Entry::Occupied(entry) => Err(CoreError::DuplicateKey {
                key: entry.key().clone(),
            }),
            btree_map::Entry::Vacant(entry) => {
                entry.insert(value.into());
                Ok(())
            }
        }
    }

    /// Returns the staged value for `key`.
    #[must_use]
    pub fn get(&self, key: &[u8]) -> Option<&Bytes> {
        self.pairs.get(key)
    }

    /// Returns true if `key` is staged.
    #[must_use]
    pub fn contains(&self, key: &[u8]) -> bool {
        self.pairs.contains_key(key)
    }

    /// Returns true if nothing is staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Returns the number of staged keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Iterates staged pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&Bytes, &Bytes)> {
        self.pairs.iter()
    }

    /// Iterates staged keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &Bytes> {
        self.pairs.keys()
    }

    /// Stamps the batch with its commit timestamp.
    #[must_use]
    pub fn into_timestamped(self, commit_timestamp: Timestamp) -> TimestampedBatch {
        TimestampedBatch {
            batch: self,
            commit_timestamp,
        }
    }
}

/// A batch paired with the commit timestamp the oracle assigned to it.
///
/// Every key in the batch is written at version `commit_timestamp`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampedBatch {
    batch: Batch,
    commit_timestamp: Timestamp,
}

impl TimestampedBatch {
    /// Returns the commit timestamp.
    #[must_use]
    pub fn commit_timestamp(&self) -> Timestamp {
        self.commit_timestamp
    }

    /// Returns the number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.batch.len()
    }

    /// Returns true if the batch holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }

    /// Returns the underlying batch.
    #[must_use]
    pub fn batch(&self) -> &Batch {
        &self.batch
    }

    /// Consumes the batch, yielding its pairs in key order.
    pub fn into_pairs(self) -> impl Iterator<Item = (Bytes, Bytes)> {
        self.batch.pairs.into_iter()
    }
}
