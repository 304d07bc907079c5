//! Error types for SSIKV core.

use bytes::Bytes;
use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in SSIKV core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Versioned store error.
    #[error("mvcc error: {0}")]
    Mvcc(#[from] ssikv_mvcc::MvccError),

    /// I/O error, raised when a background worker thread cannot be spawned.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A key read by the transaction was written by a transaction that
    /// committed after this one began.
    #[error(
        "transaction conflicts with other concurrent transaction, retry \
         (began at {begin_timestamp}, conflicting commit at {conflicting_commit})"
    )]
    TransactionConflict {
        /// Begin timestamp of the rejected transaction.
        begin_timestamp: u64,
        /// Commit timestamp of the transaction whose writes were read.
        conflicting_commit: u64,
    },

    /// Commit attempted without any staged writes.
    #[error("transaction is empty, invoke put_or_update in a transaction before committing")]
    EmptyTransaction,

    /// The same key was staged twice in one batch.
    #[error("batch already contains the key {key:?}")]
    DuplicateKey {
        /// The duplicated key.
        key: Bytes,
    },

    /// A watermark wait gave up before the timestamp was reached.
    #[error("wait for timestamp {timestamp} was cancelled")]
    WaitCancelled {
        /// The timestamp being waited for.
        timestamp: u64,
    },

    /// A background component has stopped.
    #[error("{component} has shut down")]
    Shutdown {
        /// Name of the stopped component.
        component: &'static str,
    },

    /// Configuration rejected.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },
}

impl CoreError {
    /// Creates a shutdown error.
    pub fn shutdown(component: &'static str) -> Self {
        Self::Shutdown { component }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Returns true for a read-write conflict.
    ///
    /// Conflicts are the one error a caller may reasonably retry.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::TransactionConflict { .. })
    }
}
