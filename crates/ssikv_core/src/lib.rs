//! # SSIKV Core
//!
//! Transaction engine for SSIKV, an embedded key-value store with
//! serializable snapshot isolation.
//!
//! This crate provides:
//! - [`KeyValueDb`], the database facade
//! - [`Oracle`], which issues timestamps and detects read-write conflicts
//! - [`TransactionExecutor`], the single writer that applies commits
//! - [`TimestampMark`], the watermark tracking finished timestamps
//! - Read-only and read-write transactions
//!
//! Values are stored in an [`ssikv_mvcc::MemTable`] keyed by
//! `(key, commit timestamp)`, so a transaction that began at `b` reads the
//! latest version at or below `b` without taking any lock beyond the
//! memtable's read lock.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod database;
mod error;
mod executor;
mod oracle;
mod stats;
mod transaction;
mod types;
mod watermark;

pub use config::Config;
pub use database::KeyValueDb;
pub use error::{CoreError, CoreResult};
pub use executor::{CommitHandle, TransactionExecutor};
pub use oracle::Oracle;
pub use stats::{DatabaseStats, StatsSnapshot};
pub use transaction::{Batch, ReadWriteTransaction, ReadonlyTransaction, TimestampedBatch};
pub use types::Timestamp;
pub use watermark::TimestampMark;

pub use ssikv_mvcc::{Value, VersionedKey};
