//! Read-write transactions.

use crate::error::{CoreError, CoreResult};
use crate::executor::CommitHandle;
use crate::oracle::Oracle;
use crate::stats::DatabaseStats;
use crate::transaction::Batch;
use crate::types::Timestamp;
use bytes::Bytes;
use ssikv_mvcc::{Value, VersionedKey, VersionedStore};
use std::collections::HashSet;

/// A transaction that reads at its begin timestamp and writes at its
/// commit timestamp.
///
/// Writes are staged locally and become visible to others only after
/// [`Self::commit`]. Every key read from the store is tracked; the commit is
/// rejected if any of them was written by a transaction that committed in
/// the meantime.
///
/// Dropping the transaction without committing abandons its writes.
pub struct ReadWriteTransaction<'db> {
    begin_timestamp: Timestamp,
    batch: Batch,
    /// Keys read from the store, in first-read order.
    reads: Vec<Bytes>,
    read_set: HashSet<Bytes>,
    oracle: &'db Oracle,
    store: &'db dyn VersionedStore,
    stats: &'db DatabaseStats,
    begin_finished: bool,
}

impl<'db> ReadWriteTransaction<'db> {
    pub(crate) fn begin(
        oracle: &'db Oracle,
        store: &'db dyn VersionedStore,
        stats: &'db DatabaseStats,
    ) -> CoreResult<Self> {
        let begin_timestamp = oracle.begin_timestamp()?;
        stats.record_transaction_start();
        Ok(Self {
            begin_timestamp,
            batch: Batch::new(),
            reads: Vec::new(),
            read_set: HashSet::new(),
            oracle,
            store,
            stats,
            begin_finished: false,
        })
    }

    /// Returns the begin timestamp.
    #[must_use]
    pub fn begin_timestamp(&self) -> Timestamp {
        self.begin_timestamp
    }

    /// Reads `key`.
    ///
    /// A key staged by this transaction is served from the batch and is not
    /// tracked as a read. Anything else is read from the store as of the
    /// begin timestamp and tracked for conflict detection.
    pub fn get(&mut self, key: impl AsRef<[u8]>) -> Option<Value> {
        let key = key.as_ref();
        if let Some(staged) = self.batch.get(key) {
            return Some(Value::new(staged.clone()));
        }

        let key = Bytes::copy_from_slice(key);
        self.stats.record_read();
        let value = self.store.get(&VersionedKey::new(
            key.clone(),
            self.begin_timestamp.as_u64(),
        ));
        if self.read_set.insert(key.clone()) {
            self.reads.push(key);
        }
        value
    }

    /// Stages `key -> value`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DuplicateKey`] if `key` is already staged.
    pub fn put_or_update(
        &mut self,
        key: impl Into<Bytes>,
        value: impl Into<Bytes>,
    ) -> CoreResult<()> {
        self.batch.add(key, value)
    }

    /// Returns the staged writes.
    #[must_use]
    pub fn batch(&self) -> &Batch {
        &self.batch
    }

    /// Returns the keys read from the store so far, each once, in the order
    /// they were first read.
    #[must_use]
    pub fn reads(&self) -> &[Bytes] {
        &self.reads
    }

    /// Commits the staged writes.
    ///
    /// The returned handle resolves once the writes are visible in the
    /// store; the commit itself is decided when this returns `Ok`.
    ///
    /// # Errors
    ///
    /// - [`CoreError::EmptyTransaction`] if nothing was staged
    /// - [`CoreError::TransactionConflict`] if a read key was overwritten by
    ///   a concurrent commit; the caller may retry in a new transaction
    /// - [`CoreError::Shutdown`] if the database is closing
    pub fn commit(mut self) -> CoreResult<CommitHandle> {
        if self.batch.is_empty() {
            self.stats.record_empty_commit();
            return Err(CoreError::EmptyTransaction);
        }

        let batch = std::mem::take(&mut self.batch);
        let keys = batch.len();
        match self.oracle.commit(self.begin_timestamp, &self.reads, batch) {
            Ok(handle) => {
                self.begin_finished = true;
                self.stats.record_commit(keys);
                Ok(handle)
            }
            Err(err) => {
                match &err {
                    CoreError::TransactionConflict { .. } => self.stats.record_conflict(),
                    CoreError::EmptyTransaction => {}
                    // The oracle finished the begin timestamp before the
                    // executor refused the batch.
                    _ => self.begin_finished = true,
                }
                Err(err)
            }
        }
    }
}

impl Drop for ReadWriteTransaction<'_> {
    fn drop(&mut self) {
        if !self.begin_finished {
            self.begin_finished = true;
            self.oracle.finish_begin_timestamp(self.begin_timestamp);
        }
    }
}

impl std::fmt::Debug for ReadWriteTransaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadWriteTransaction")
            .field("begin_timestamp", &self.begin_timestamp)
            .field("staged", &self.batch.len())
            .field("reads", &self.reads.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use crate::{CoreError, KeyValueDb, Timestamp};

    #[test]
    fn staged_reads_are_not_tracked() {
        let db = KeyValueDb::open_in_memory().unwrap();
        let mut txn = db.begin_read_write().unwrap();

        txn.put_or_update("HDD", "Hard disk").unwrap();
        assert_eq!(txn.get("HDD").unwrap().as_bytes(), b"Hard disk");
        assert!(txn.reads().is_empty());

        assert!(txn.get("SSD").is_none());
        assert_eq!(txn.reads().len(), 1);
        assert!(txn.get("SSD").is_none());
        assert_eq!(txn.reads().len(), 1);
    }

    #[test]
    fn repeated_reads_are_tracked_once() {
        let db = KeyValueDb::open_in_memory().unwrap();
        let mut txn = db.begin_read_write().unwrap();

        for round in 0..3 {
            for i in 0..2_000 {
                assert!(txn.get(format!("key-{i:08}")).is_none());
            }
            assert_eq!(txn.reads().len(), 2_000, "round {round}");
        }
        assert_eq!(&txn.reads()[0][..], b"key-00000000");
        assert_eq!(&txn.reads()[1_999][..], b"key-00001999");
        assert_eq!(db.stats().reads, 6_000);
    }

    #[test]
    fn duplicate_put_is_rejected() {
        let db = KeyValueDb::open_in_memory().unwrap();
        let mut txn = db.begin_read_write().unwrap();

        txn.put_or_update("HDD", "Hard disk").unwrap();
        let err = txn.put_or_update("HDD", "Hard disk drive").unwrap_err();
        assert!(matches!(err, CoreError::DuplicateKey { .. }));
        assert_eq!(txn.batch().len(), 1);
    }

    #[test]
    fn empty_commit_is_rejected() {
        let db = KeyValueDb::open_in_memory().unwrap();
        let txn = db.begin_read_write().unwrap();

        let err = txn.commit().unwrap_err();
        assert!(matches!(err, CoreError::EmptyTransaction));
        assert_eq!(db.oracle().next_timestamp(), Timestamp::new(1));
        assert_eq!(db.stats().empty_commits, 1);
    }

    #[test]
    fn commit_makes_writes_visible() {
        let db = KeyValueDb::open_in_memory().unwrap();
        let mut txn = db.begin_read_write().unwrap();
        txn.put_or_update("HDD", "Hard disk").unwrap();
        txn.put_or_update("SSD", "Solid state").unwrap();

        let handle = txn.commit().unwrap();
        assert_eq!(handle.commit_timestamp(), Timestamp::new(1));
        handle.wait().unwrap();

        let value = db.get(|snapshot| snapshot.get("SSD")).unwrap();
        assert_eq!(value.unwrap().as_bytes(), b"Solid state");
        assert_eq!(db.stats().keys_written, 2);
    }

    #[test]
    fn reading_a_key_written_concurrently_conflicts() {
        let db = KeyValueDb::open_in_memory().unwrap();

        let mut first = db.begin_read_write().unwrap();
        let mut second = db.begin_read_write().unwrap();

        assert!(first.get("HDD").is_none());
        first.put_or_update("SSD", "Solid state").unwrap();

        second.put_or_update("HDD", "Hard disk").unwrap();
        second.commit().unwrap().wait().unwrap();

        let err = first.commit().unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(db.stats().conflicts, 1);

        let ssd = db.get(|snapshot| snapshot.get("SSD")).unwrap();
        assert!(ssd.is_none());
    }

    #[test]
    fn blind_write_does_not_conflict() {
        let db = KeyValueDb::open_in_memory().unwrap();

        let mut first = db.begin_read_write().unwrap();
        let mut second = db.begin_read_write().unwrap();

        first.put_or_update("SSD", "Solid state").unwrap();
        second.put_or_update("HDD", "Hard disk").unwrap();
        second.commit().unwrap().wait().unwrap();

        let handle = first.commit().unwrap();
        assert_eq!(handle.commit_timestamp(), Timestamp::new(2));
    }

    #[test]
    fn abandoned_transaction_releases_begin_timestamp() {
        let db = KeyValueDb::open_in_memory().unwrap();
        {
            let mut txn = db.begin_read_write().unwrap();
            txn.put_or_update("HDD", "Hard disk").unwrap();
        }
        for (key, value) in [("SSD", "Solid state"), ("NVMe", "Non-volatile")] {
            db.put_or_update(|txn| txn.put_or_update(key, value))
                .unwrap()
                .wait()
                .unwrap();
        }

        let begin_mark = db.oracle().begin_mark();
        begin_mark.flush().unwrap();
        assert_eq!(begin_mark.done_till(), Timestamp::new(1));
        assert!(db.get(|snapshot| snapshot.get("HDD")).unwrap().is_none());
    }
}
