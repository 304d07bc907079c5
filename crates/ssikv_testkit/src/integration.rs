//! Cross-crate integration test helpers.
//!
//! Provides a harness that mirrors every committed write in a model so
//! reads can be checked, and reusable checks for transaction behavior.

use crate::fixtures::{init_tracing, test_config, wait_applied};
use crate::generators::DbOperation;
use ssikv_core::{KeyValueDb, Timestamp, VersionedKey};
use ssikv_mvcc::VersionedStore;
use std::collections::BTreeMap;

/// A test harness for integration testing.
pub struct IntegrationHarness {
    /// The database instance.
    pub db: KeyValueDb,
    /// Latest committed value per key.
    model: BTreeMap<Vec<u8>, Vec<u8>>,
    /// Every committed version, for snapshot checks.
    history: BTreeMap<(Vec<u8>, Timestamp), Vec<u8>>,
}

impl IntegrationHarness {
    /// Creates a new integration harness.
    pub fn new() -> Self {
        init_tracing();
        Self {
            db: KeyValueDb::open(test_config()).expect("Failed to open database"),
            model: BTreeMap::new(),
            history: BTreeMap::new(),
        }
    }

    /// Commits `pairs` in one transaction and tracks them.
    pub fn write(&mut self, pairs: &[(Vec<u8>, Vec<u8>)]) -> Timestamp {
        let handle = self
            .db
            .put_or_update(|txn| {
                for (key, value) in pairs {
                    txn.put_or_update(key.clone(), value.clone())?;
                }
                Ok(())
            })
            .expect("Failed to commit");
        let commit = wait_applied(&handle);

        for (key, value) in pairs {
            self.model.insert(key.clone(), value.clone());
            self.history.insert((key.clone(), commit), value.clone());
        }
        commit
    }

    /// Reads `key` and checks it against the model.
    pub fn get_and_verify(&self, key: &[u8]) -> Option<Vec<u8>> {
        let actual = self
            .db
            .get(|txn| txn.get(key))
            .expect("Failed to read")
            .map(|value| value.as_bytes().to_vec());

        assert_eq!(
            actual.as_ref(),
            self.model.get(key),
            "Value mismatch for {:?}",
            String::from_utf8_lossy(key)
        );
        actual
    }

    /// Returns the value the model expects for `key` as of `snapshot`.
    pub fn expected_at(&self, key: &[u8], snapshot: Timestamp) -> Option<&Vec<u8>> {
        self.history
            .range((key.to_vec(), Timestamp::ZERO)..=(key.to_vec(), snapshot))
            .next_back()
            .map(|(_, value)| value)
    }

    /// Applies an operation to both the database and the model.
    pub fn apply(&mut self, operation: &DbOperation) {
        match operation {
            DbOperation::Write(pairs) => {
                let pairs: Vec<(Vec<u8>, Vec<u8>)> = pairs
                    .iter()
                    .map(|(key, value)| (key.clone().into_bytes(), value.clone()))
                    .collect();
                self.write(&pairs);
            }
            DbOperation::Read(key) => {
                self.get_and_verify(key.as_bytes());
            }
        }
    }

    /// Verifies all tracked keys are in the database.
    pub fn verify_all(&self) {
        for key in self.model.keys() {
            self.get_and_verify(key);
        }
    }

    /// Verifies every tracked key at every committed snapshot.
    pub fn verify_history(&self) {
        let latest = self.db.oracle().next_timestamp().as_u64();
        for snapshot in 0..latest {
            let snapshot = Timestamp::new(snapshot);
            for key in self.model.keys() {
                let actual = self
                    .db
                    .memtable()
                    .get(&VersionedKey::new(key.clone(), snapshot.as_u64()))
                    .map(|value| value.as_bytes().to_vec());
                assert_eq!(
                    actual.as_ref(),
                    self.expected_at(key, snapshot),
                    "Snapshot mismatch for {:?} at {}",
                    String::from_utf8_lossy(key),
                    snapshot
                );
            }
        }
    }

    /// Returns the count of tracked keys.
    pub fn tracked_count(&self) -> usize {
        self.model.len()
    }
}

impl Default for IntegrationHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Test transaction integration.
pub mod transaction {
    use super::*;

    /// Tests that a snapshot keeps reading the values it began with.
    pub fn test_snapshot_isolation(db: &KeyValueDb) {
        wait_applied(
            &db.put_or_update(|txn| txn.put_or_update("isolation", "version1"))
                .expect("Failed to put initial data"),
        );

        let snapshot = db.begin_readonly().expect("Failed to begin");

        wait_applied(
            &db.put_or_update(|txn| txn.put_or_update("isolation", "version2"))
                .expect("Failed to update"),
        );

        let old = snapshot.get("isolation").expect("Missing key");
        assert_eq!(old.as_bytes(), b"version1");
        snapshot.finish();

        let new = db
            .get(|txn| txn.get("isolation"))
            .expect("Failed to read")
            .expect("Missing key");
        assert_eq!(new.as_bytes(), b"version2");
    }

    /// Tests that a failing callback leaves no trace.
    pub fn test_transaction_abort(db: &KeyValueDb) {
        let before = db.oracle().next_timestamp();
        let result = db.put_or_update(|txn| {
            txn.put_or_update("abort", "modified")?;
            txn.put_or_update("abort", "modified again")
        });
        assert!(result.is_err());

        assert!(db
            .get(|txn| txn.get("abort"))
            .expect("Failed to read")
            .is_none());
        assert_eq!(db.oracle().next_timestamp(), before);
    }

    /// Tests the read-write conflict rule: a transaction that read a key
    /// overwritten by a later commit must not commit.
    pub fn test_read_write_conflict(db: &KeyValueDb) {
        let mut reader = db.begin_read_write().expect("Failed to begin");
        let mut writer = db.begin_read_write().expect("Failed to begin");

        let _ = reader.get("conflict");
        reader
            .put_or_update("conflict-derived", "derived")
            .expect("Failed to stage");

        writer
            .put_or_update("conflict", "written")
            .expect("Failed to stage");
        wait_applied(&writer.commit().expect("Writer should commit"));

        let err = reader.commit().expect_err("Reader should conflict");
        assert!(err.is_conflict(), "unexpected error: {err}");
    }

    /// Tests that transactions touching disjoint keys both commit.
    pub fn test_disjoint_transactions(db: &KeyValueDb) {
        let mut first = db.begin_read_write().expect("Failed to begin");
        let mut second = db.begin_read_write().expect("Failed to begin");

        let _ = first.get("disjoint-a");
        first.put_or_update("disjoint-a", "a").expect("Failed to stage");
        let _ = second.get("disjoint-b");
        second.put_or_update("disjoint-b", "b").expect("Failed to stage");

        let second_commit = wait_applied(&second.commit().expect("Second should commit"));
        let first_commit = wait_applied(&first.commit().expect("First should commit"));
        assert!(first_commit > second_commit);
    }
}
