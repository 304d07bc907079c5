//! Database facade.

use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::executor::CommitHandle;
use crate::oracle::Oracle;
use crate::stats::{DatabaseStats, StatsSnapshot};
use crate::transaction::{ReadWriteTransaction, ReadonlyTransaction};
use parking_lot::RwLock;
use ssikv_mvcc::{MemTable, VersionedStore};
use std::sync::Arc;
use tracing::info;

/// The main database handle.
///
/// `KeyValueDb` owns the memtable, the oracle and its background threads.
/// Reads run in [`ReadonlyTransaction`]s, writes in
/// [`ReadWriteTransaction`]s; both borrow the database.
///
/// # Example
///
/// ```rust
/// use ssikv_core::KeyValueDb;
///
/// let db = KeyValueDb::open_in_memory().unwrap();
///
/// db.put_or_update(|txn| txn.put_or_update("HDD", "Hard disk"))
///     .unwrap()
///     .wait()
///     .unwrap();
///
/// let value = db.get(|txn| txn.get("HDD")).unwrap();
/// assert_eq!(value.unwrap().as_bytes(), b"Hard disk");
///
/// db.close();
/// ```
///
/// # Conflicts
///
/// A read-write transaction that read a key which another transaction
/// wrote and committed after it began fails with
/// [`CoreError::TransactionConflict`]. The database never retries; callers
/// that want retry loop on [`CoreError::is_conflict`].
pub struct KeyValueDb {
    config: Config,
    memtable: Arc<MemTable>,
    oracle: Oracle,
    stats: DatabaseStats,
    is_open: RwLock<bool>,
}

impl KeyValueDb {
    /// Opens an empty database.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] for a rejected configuration, or
    /// an error if a background thread cannot be spawned.
    pub fn open(config: Config) -> CoreResult<Self> {
        config.validate()?;

        let memtable = match config.level_seed {
            Some(seed) => MemTable::with_seed(config.skiplist_max_height, seed)?,
            None => MemTable::new(config.skiplist_max_height)?,
        };
        let memtable = Arc::new(memtable);
        let oracle = Oracle::new(&config, Arc::clone(&memtable) as Arc<dyn VersionedStore>)?;

        info!(
            skiplist_max_height = config.skiplist_max_height,
            wait_for_commits_on_begin = config.wait_for_commits_on_begin,
            executor_queue_capacity = config.executor_queue_capacity,
            "database opened"
        );

        Ok(Self {
            config,
            memtable,
            oracle,
            stats: DatabaseStats::new(),
            is_open: RwLock::new(true),
        })
    }

    /// Opens an empty database with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a background thread cannot be spawned.
    pub fn open_in_memory() -> CoreResult<Self> {
        Self::open(Config::default())
    }

    /// Runs `f` against a snapshot and returns its result.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Shutdown`] if the database is closed.
    pub fn get<F, T>(&self, f: F) -> CoreResult<T>
    where
        F: FnOnce(&ReadonlyTransaction<'_>) -> T,
    {
        let txn = self.begin_readonly()?;
        let result = f(&txn);
        txn.finish();
        Ok(result)
    }

    /// Runs `f` in a read-write transaction and commits it.
    ///
    /// If `f` returns an error the transaction is abandoned and the error is
    /// returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns the error from `f`, or any error of
    /// [`ReadWriteTransaction::commit`].
    pub fn put_or_update<F>(&self, f: F) -> CoreResult<CommitHandle>
    where
        F: FnOnce(&mut ReadWriteTransaction<'_>) -> CoreResult<()>,
    {
        let mut txn = self.begin_read_write()?;
        f(&mut txn)?;
        txn.commit()
    }

    /// Begins a read-only transaction.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Shutdown`] if the database is closed.
    pub fn begin_readonly(&self) -> CoreResult<ReadonlyTransaction<'_>> {
        self.ensure_open()?;
        ReadonlyTransaction::begin(&self.oracle, self.memtable.as_ref(), &self.stats)
    }

    /// Begins a read-write transaction.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Shutdown`] if the database is closed.
    pub fn begin_read_write(&self) -> CoreResult<ReadWriteTransaction<'_>> {
        self.ensure_open()?;
        ReadWriteTransaction::begin(&self.oracle, self.memtable.as_ref(), &self.stats)
    }

    /// Returns a snapshot of the database statistics.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Returns database configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the oracle.
    #[must_use]
    pub fn oracle(&self) -> &Oracle {
        &self.oracle
    }

    /// Returns the memtable.
    #[must_use]
    pub fn memtable(&self) -> &MemTable {
        &self.memtable
    }

    /// Closes the database and stops its background threads.
    ///
    /// Queued commits that were not yet applied are dropped and their
    /// handles resolve to [`CoreError::Shutdown`]. Closing twice is a no-op.
    pub fn close(&self) {
        let mut is_open = self.is_open.write();
        if !*is_open {
            return;
        }
        *is_open = false;
        self.oracle.shutdown();
        info!(
            versions = self.memtable.len(),
            committed = self.stats.transactions_committed(),
            "database closed"
        );
    }

    /// Checks if the database is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        *self.is_open.read()
    }

    fn ensure_open(&self) -> CoreResult<()> {
        if *self.is_open.read() {
            Ok(())
        } else {
            Err(CoreError::shutdown("database"))
        }
    }
}

impl std::fmt::Debug for KeyValueDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyValueDb")
            .field("is_open", &self.is_open())
            .field("versions", &self.memtable.len())
            .field("oracle", &self.oracle)
            .finish_non_exhaustive()
    }
}

impl Drop for KeyValueDb {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Timestamp;
    use std::thread;

    fn create_db() -> KeyValueDb {
        KeyValueDb::open(Config::new().level_seed(42)).unwrap()
    }

    fn put(db: &KeyValueDb, key: &'static str, value: &'static str) -> Timestamp {
        let handle = db
            .put_or_update(|txn| txn.put_or_update(key, value))
            .unwrap();
        handle.wait().unwrap();
        handle.commit_timestamp()
    }

    #[test]
    fn open_in_memory() {
        let db = KeyValueDb::open_in_memory().unwrap();
        assert!(db.is_open());
        assert!(db.memtable().is_empty());
    }

    #[test]
    fn open_rejects_invalid_config() {
        let err = KeyValueDb::open(Config::new().skiplist_max_height(0)).unwrap_err();
        assert!(matches!(err, CoreError::InvalidConfig { .. }));
    }

    #[test]
    fn later_versions_shadow_earlier_ones() {
        let db = create_db();
        assert_eq!(put(&db, "HDD", "Hard disk"), Timestamp::new(1));
        assert_eq!(put(&db, "HDD", "Hard disk drive"), Timestamp::new(2));

        let latest = db.get(|txn| txn.get("HDD")).unwrap().unwrap();
        assert_eq!(latest.as_bytes(), b"Hard disk drive");
        assert_eq!(db.memtable().len(), 2);
    }

    #[test]
    fn missing_key_is_not_found() {
        let db = create_db();
        put(&db, "HDD", "Hard disk");
        assert!(db.get(|txn| txn.get("Storage")).unwrap().is_none());
    }

    #[test]
    fn callback_error_abandons_transaction() {
        let db = create_db();
        let err = db
            .put_or_update(|txn| {
                txn.put_or_update("HDD", "Hard disk")?;
                txn.put_or_update("HDD", "Hard disk drive")
            })
            .unwrap_err();

        assert!(matches!(err, CoreError::DuplicateKey { .. }));
        assert!(db.get(|txn| txn.get("HDD")).unwrap().is_none());
        assert_eq!(db.oracle().next_timestamp(), Timestamp::new(1));
    }

    #[test]
    fn conflicting_transactions() {
        let db = create_db();
        put(&db, "HDD", "Hard disk");

        let mut reader = db.begin_read_write().unwrap();
        let existing = reader.get("HDD").unwrap();
        let description = format!(
            "faster than {}",
            String::from_utf8_lossy(existing.as_bytes())
        );
        reader.put_or_update("SSD", description).unwrap();

        put(&db, "HDD", "Hard disk drive");

        let err = reader.commit().unwrap_err();
        assert!(matches!(
            err,
            CoreError::TransactionConflict {
                begin_timestamp: 1,
                conflicting_commit: 2,
            }
        ));
        assert!(db.get(|txn| txn.get("SSD")).unwrap().is_none());
    }

    #[test]
    fn close_is_idempotent_and_rejects_new_work() {
        let db = create_db();
        put(&db, "HDD", "Hard disk");

        db.close();
        db.close();
        assert!(!db.is_open());

        assert!(matches!(
            db.begin_readonly().unwrap_err(),
            CoreError::Shutdown { component: "database" }
        ));
        assert!(db.put_or_update(|txn| txn.put_or_update("SSD", "x")).is_err());
    }

    #[test]
    fn concurrent_writers_get_distinct_commit_timestamps() {
        let db = create_db();
        let mut timestamps: Vec<u64> = thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|worker| {
                    let db = &db;
                    scope.spawn(move || {
                        let handle = db
                            .put_or_update(|txn| {
                                txn.put_or_update(format!("worker-{worker}"), "done")
                            })
                            .unwrap();
                        handle.wait().unwrap();
                        handle.commit_timestamp().as_u64()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        timestamps.sort_unstable();
        assert_eq!(timestamps, (1..=8).collect::<Vec<u64>>());
        assert_eq!(db.stats().transactions_committed, 8);
    }
}
