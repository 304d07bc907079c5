//! Read-only transactions.

use crate::error::CoreResult;
use crate::oracle::Oracle;
use crate::stats::DatabaseStats;
use crate::types::Timestamp;
use bytes::Bytes;
use ssikv_mvcc::{Value, VersionedKey, VersionedStore};

/// A consistent snapshot of the store at a begin timestamp.
///
/// Read-only transactions never conflict and never commit. The begin
/// timestamp is finished exactly once, by [`Self::finish`] or on drop.
pub struct ReadonlyTransaction<'db> {
    begin_timestamp: Timestamp,
    oracle: &'db Oracle,
    store: &'db dyn VersionedStore,
    stats: &'db DatabaseStats,
    finished: bool,
}

impl<'db> ReadonlyTransaction<'db> {
    pub(crate) fn begin(
        oracle: &'db Oracle,
        store: &'db dyn VersionedStore,
        stats: &'db DatabaseStats,
    ) -> CoreResult<Self> {
        let begin_timestamp = oracle.begin_timestamp()?;
        stats.record_readonly_start();
        Ok(Self {
            begin_timestamp,
            oracle,
            store,
            stats,
            finished: false,
        })
    }

    /// Returns the snapshot timestamp.
    #[must_use]
    pub fn begin_timestamp(&self) -> Timestamp {
        self.begin_timestamp
    }

    /// Reads `key` as of the snapshot.
    pub fn get(&self, key: impl AsRef<[u8]>) -> Option<Value> {
        self.stats.record_read();
        let versioned = VersionedKey::new(
            Bytes::copy_from_slice(key.as_ref()),
            self.begin_timestamp.as_u64(),
        );
        self.store.get(&versioned)
    }

    /// Ends the transaction.
    pub fn finish(mut self) {
        self.finish_once();
    }

    fn finish_once(&mut self) {
        if !self.finished {
            self.finished = true;
            self.oracle.finish_begin_timestamp(self.begin_timestamp);
        }
    }
}

impl Drop for ReadonlyTransaction<'_> {
    fn drop(&mut self) {
        self.finish_once();
    }
}

impl std::fmt::Debug for ReadonlyTransaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadonlyTransaction")
            .field("begin_timestamp", &self.begin_timestamp)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use crate::{KeyValueDb, Timestamp};

    #[test]
    fn reads_snapshot_at_begin() {
        let db = KeyValueDb::open_in_memory().unwrap();
        db.put_or_update(|txn| txn.put_or_update("HDD", "Hard disk"))
            .unwrap()
            .wait()
            .unwrap();

        let snapshot = db.begin_readonly().unwrap();
        assert_eq!(snapshot.begin_timestamp(), Timestamp::new(1));

        db.put_or_update(|txn| txn.put_or_update("SSD", "Solid state"))
            .unwrap()
            .wait()
            .unwrap();

        assert_eq!(snapshot.get("HDD").unwrap().as_bytes(), b"Hard disk");
        assert!(snapshot.get("SSD").is_none());
        snapshot.finish();
    }

    #[test]
    fn open_snapshot_holds_back_begin_watermark() {
        let db = KeyValueDb::open_in_memory().unwrap();
        let snapshot = db.begin_readonly().unwrap();

        for (key, value) in [("HDD", "Hard disk"), ("SSD", "Solid state")] {
            db.put_or_update(|txn| txn.put_or_update(key, value))
                .unwrap()
                .wait()
                .unwrap();
        }

        let begin_mark = db.oracle().begin_mark();
        begin_mark.flush().unwrap();
        assert_eq!(begin_mark.done_till(), Timestamp::ZERO);

        drop(snapshot);
        begin_mark.flush().unwrap();
        assert_eq!(begin_mark.done_till(), Timestamp::new(1));
        assert_eq!(db.stats().readonly_started, 1);
    }
}
