//! Timestamp authority and conflict detection.
//!
//! The oracle hands out begin and commit timestamps and decides whether a
//! read-write transaction may commit. A transaction that began at `b` and
//! read key `k` conflicts if some transaction committed after `b` and wrote
//! `k`: the read would have been stale under serial execution, so the commit
//! is rejected and the caller decides whether to retry.
//!
//! To answer that question the oracle keeps a record of the write set of
//! every recent commit. A record can be discarded once every transaction
//! that began before its commit has finished, which is exactly when its
//! commit timestamp falls at or below the begin watermark.

use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::executor::{CommitHandle, TransactionExecutor};
use crate::transaction::Batch;
use crate::types::Timestamp;
use crate::watermark::TimestampMark;
use bytes::Bytes;
use parking_lot::Mutex;
use ssikv_mvcc::VersionedStore;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, trace};

/// Write set of a committed transaction, kept for conflict detection.
#[derive(Debug)]
struct CommittedTransaction {
    commit_timestamp: Timestamp,
    keys: HashSet<Bytes>,
}

#[derive(Debug)]
struct OracleState {
    next_timestamp: Timestamp,
    committed: Vec<CommittedTransaction>,
}

impl OracleState {
    /// Returns the commit timestamp of the first transaction that committed
    /// after `begin` and wrote a key in `reads`.
    fn conflicting_commit(&self, begin: Timestamp, reads: &[Bytes]) -> Option<Timestamp> {
        self.committed
            .iter()
            .filter(|committed| committed.commit_timestamp > begin)
            .find(|committed| reads.iter().any(|key| committed.keys.contains(key)))
            .map(|committed| committed.commit_timestamp)
    }

    fn discard_committed_till(&mut self, watermark: Timestamp) -> usize {
        let before = self.committed.len();
        self.committed
            .retain(|committed| committed.commit_timestamp > watermark);
        before - self.committed.len()
    }
}

/// Issues timestamps, detects read-write conflicts and sequences commits.
///
/// One oracle exists per database. Timestamps start at 1: the first
/// transaction begins at 0 and the first commit is assigned 1.
pub struct Oracle {
    state: Mutex<OracleState>,
    /// Held from commit-timestamp assignment through executor submission so
    /// batches reach the executor in commit-timestamp order.
    commit_lock: Mutex<()>,
    begin_mark: TimestampMark,
    commit_mark: Arc<TimestampMark>,
    executor: TransactionExecutor,
    wait_for_commits_on_begin: bool,
}

impl Oracle {
    /// Creates an oracle applying commits to `store`.
    ///
    /// # Errors
    ///
    /// Returns an error if a background thread cannot be spawned.
    pub fn new(config: &Config, store: Arc<dyn VersionedStore>) -> CoreResult<Self> {
        let next_timestamp = Timestamp::new(1);
        let initial = Timestamp::new(next_timestamp.as_u64() - 1);

        let begin_mark = TimestampMark::spawn("begin-mark", initial)?;
        let commit_mark = Arc::new(TimestampMark::spawn("commit-mark", initial)?);
        let executor = TransactionExecutor::spawn(
            store,
            Arc::clone(&commit_mark),
            config.executor_queue_capacity,
        )?;

        Ok(Self {
            state: Mutex::new(OracleState {
                next_timestamp,
                committed: Vec::new(),
            }),
            commit_lock: Mutex::new(()),
            begin_mark,
            commit_mark,
            executor,
            wait_for_commits_on_begin: config.wait_for_commits_on_begin,
        })
    }

    /// Issues a begin timestamp and registers it with the begin mark.
    ///
    /// The timestamp is the last assigned commit timestamp, so the
    /// transaction reads every commit made before it began. When
    /// [`Config::wait_for_commits_on_begin`] is set this blocks until those
    /// commits have been applied.
    ///
    /// Every begin timestamp must eventually be finished, either by a
    /// successful commit or by [`Self::finish_begin_timestamp`].
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Shutdown`] if the oracle stops while waiting; the
    /// begin timestamp is finished before returning.
    pub fn begin_timestamp(&self) -> CoreResult<Timestamp> {
        let begin = {
            let state = self.state.lock();
            let begin = Timestamp::new(state.next_timestamp.as_u64() - 1);
            self.begin_mark.begin(begin);
            begin
        };

        if self.wait_for_commits_on_begin {
            if let Err(err) = self.commit_mark.wait_for(begin) {
                self.begin_mark.finish(begin);
                return Err(err);
            }
        }
        trace!(begin_timestamp = begin.as_u64(), "transaction began");
        Ok(begin)
    }

    /// Checks a transaction for conflicts and assigns its commit timestamp.
    ///
    /// On success the begin timestamp is finished, records no longer needed
    /// for conflict detection are discarded, and the commit timestamp is
    /// registered with the commit mark. On failure nothing changes and the
    /// begin timestamp is left for the caller to finish.
    ///
    /// # Errors
    ///
    /// - [`CoreError::EmptyTransaction`] if `batch` is empty
    /// - [`CoreError::TransactionConflict`] if a key in `reads` was written by
    ///   a transaction that committed after `begin`
    pub fn may_be_commit_timestamp_for(
        &self,
        begin: Timestamp,
        reads: &[Bytes],
        batch: &Batch,
    ) -> CoreResult<Timestamp> {
        if batch.is_empty() {
            return Err(CoreError::EmptyTransaction);
        }

        let mut state = self.state.lock();
        if let Some(conflicting) = state.conflicting_commit(begin, reads) {
            debug!(
                begin_timestamp = begin.as_u64(),
                conflicting_commit = conflicting.as_u64(),
                "transaction conflict"
            );
            return Err(CoreError::TransactionConflict {
                begin_timestamp: begin.as_u64(),
                conflicting_commit: conflicting.as_u64(),
            });
        }

        self.begin_mark.finish(begin);
        let watermark = self.begin_mark.done_till();
        let discarded = state.discard_committed_till(watermark);
        if discarded > 0 {
            trace!(
                watermark = watermark.as_u64(),
                discarded,
                retained = state.committed.len(),
                "discarded committed transactions"
            );
        }

        let commit = state.next_timestamp;
        state.next_timestamp = commit.next();
        state.committed.push(CommittedTransaction {
            commit_timestamp: commit,
            keys: batch.keys().cloned().collect(),
        });
        self.commit_mark.begin(commit);

        Ok(commit)
    }

    /// Assigns a commit timestamp and hands the batch to the executor.
    ///
    /// Commits are serialized from timestamp assignment through submission,
    /// so the executor applies batches in commit-timestamp order.
    ///
    /// The begin timestamp is finished unless the error is
    /// [`CoreError::TransactionConflict`] or [`CoreError::EmptyTransaction`].
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Self::may_be_commit_timestamp_for`], or
    /// [`CoreError::Shutdown`] if the executor has stopped.
    pub fn commit(
        &self,
        begin: Timestamp,
        reads: &[Bytes],
        batch: Batch,
    ) -> CoreResult<CommitHandle> {
        let _sequencing = self.commit_lock.lock();
        let commit = self.may_be_commit_timestamp_for(begin, reads, &batch)?;
        let keys = batch.len();

        match self.executor.submit(batch.into_timestamped(commit)) {
            Ok(handle) => {
                debug!(
                    begin_timestamp = begin.as_u64(),
                    commit_timestamp = commit.as_u64(),
                    keys,
                    "transaction committed"
                );
                Ok(handle)
            }
            Err(err) => {
                // Nothing will apply the batch; release anyone waiting on it.
                self.commit_mark.finish(commit);
                Err(err)
            }
        }
    }

    /// Finishes a begin timestamp for a transaction that will not commit.
    pub fn finish_begin_timestamp(&self, begin: Timestamp) {
        self.begin_mark.finish(begin);
    }

    /// Returns the number of commit records retained for conflict detection.
    #[must_use]
    pub fn committed_transaction_count(&self) -> usize {
        self.state.lock().committed.len()
    }

    /// Returns the timestamp the next commit will be assigned.
    #[must_use]
    pub fn next_timestamp(&self) -> Timestamp {
        self.state.lock().next_timestamp
    }

    /// Returns the watermark over begin timestamps.
    #[must_use]
    pub fn begin_mark(&self) -> &TimestampMark {
        &self.begin_mark
    }

    /// Returns the watermark over applied commit timestamps.
    #[must_use]
    pub fn commit_mark(&self) -> &TimestampMark {
        &self.commit_mark
    }

    /// Stops the executor and both watermarks.
    ///
    /// Blocked `begin_timestamp` calls return [`CoreError::Shutdown`].
    pub fn shutdown(&self) {
        self.executor.stop();
        self.commit_mark.stop();
        self.begin_mark.stop();
        info!(
            next_timestamp = self.next_timestamp().as_u64(),
            "oracle stopped"
        );
    }
}

impl std::fmt::Debug for Oracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Oracle")
            .field("next_timestamp", &self.next_timestamp())
            .field("committed", &self.committed_transaction_count())
            .field("wait_for_commits_on_begin", &self.wait_for_commits_on_begin)
            .finish_non_exhaustive()
    }
}
