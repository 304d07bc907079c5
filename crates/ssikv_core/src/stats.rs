//! Database statistics.
//!
//! Counters are updated by the transaction front ends and read through
//! [`crate::KeyValueDb::stats`].
//!
//! # Usage
//!
//! ```rust
//! use ssikv_core::KeyValueDb;
//!
//! let db = KeyValueDb::open_in_memory().unwrap();
//! db.put_or_update(|txn| txn.put_or_update("HDD", "Hard disk"))
//!     .unwrap()
//!     .wait()
//!     .unwrap();
//!
//! let stats = db.stats();
//! assert_eq!(stats.transactions_committed, 1);
//! assert_eq!(stats.keys_written, 1);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Database statistics.
///
/// All counters are atomic and monotonically increasing.
#[derive(Debug, Default)]
pub struct DatabaseStats {
    /// Read-write transactions started.
    transactions_started: AtomicU64,
    /// Read-only transactions started.
    readonly_started: AtomicU64,
    /// Read-write transactions that obtained a commit timestamp.
    transactions_committed: AtomicU64,
    /// Commits rejected with a read-write conflict.
    conflicts: AtomicU64,
    /// Commits rejected because nothing was staged.
    empty_commits: AtomicU64,
    /// Keys read from the store by any transaction.
    reads: AtomicU64,
    /// Keys handed to the executor.
    keys_written: AtomicU64,
}

impl DatabaseStats {
    /// Creates a new stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_transaction_start(&self) {
        self.transactions_started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_readonly_start(&self) {
        self.readonly_started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_commit(&self, keys: usize) {
        self.transactions_committed.fetch_add(1, Ordering::Relaxed);
        self.keys_written.fetch_add(keys as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_conflict(&self) {
        self.conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_empty_commit(&self) {
        self.empty_commits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_read(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of read-write transactions started.
    pub fn transactions_started(&self) -> u64 {
        self.transactions_started.load(Ordering::Relaxed)
    }

    /// Returns the number of read-only transactions started.
    pub fn readonly_started(&self) -> u64 {
        self.readonly_started.load(Ordering::Relaxed)
    }

    /// Returns the number of committed read-write transactions.
    pub fn transactions_committed(&self) -> u64 {
        self.transactions_committed.load(Ordering::Relaxed)
    }

    /// Returns the number of conflicting commits.
    pub fn conflicts(&self) -> u64 {
        self.conflicts.load(Ordering::Relaxed)
    }

    /// Returns the number of empty commits.
    pub fn empty_commits(&self) -> u64 {
        self.empty_commits.load(Ordering::Relaxed)
    }

    /// Returns the number of store reads.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Returns the number of keys submitted for writing.
    pub fn keys_written(&self) -> u64 {
        self.keys_written.load(Ordering::Relaxed)
    }

    /// Returns a snapshot of all stats.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            transactions_started: self.transactions_started(),
            readonly_started: self.readonly_started(),
            transactions_committed: self.transactions_committed(),
            conflicts: self.conflicts(),
            empty_commits: self.empty_commits(),
            reads: self.reads(),
            keys_written: self.keys_written(),
        }
    }
}

/// A point-in-time copy of [`DatabaseStats`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Read-write transactions started.
    pub transactions_started: u64,
    /// Read-only transactions started.
    pub readonly_started: u64,
    /// Read-write transactions committed.
    pub transactions_committed: u64,
    /// Commits rejected with a conflict.
    pub conflicts: u64,
    /// Commits rejected as empty.
    pub empty_commits: u64,
    /// Store reads.
    pub reads: u64,
    /// Keys submitted for writing.
    pub keys_written: u64,
}
