//! Transactions.
//!
//! Two kinds of transaction run against a [`crate::KeyValueDb`]:
//!
//! - [`ReadonlyTransaction`] reads a consistent snapshot and never conflicts
//! - [`ReadWriteTransaction`] stages writes in a [`Batch`] and commits them
//!   atomically at a single commit timestamp, provided nothing it read was
//!   overwritten by a concurrent commit
//!
//! Together these give serializable snapshot isolation: every committed
//! read-write transaction behaves as if it ran alone at its commit
//! timestamp.

mod batch;
mod read_write;
mod readonly;

pub use batch::{Batch, TimestampedBatch};
pub use read_write::ReadWriteTransaction;
pub use readonly::ReadonlyTransaction;
