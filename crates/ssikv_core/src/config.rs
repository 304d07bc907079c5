//! Database configuration.

use crate::error::{CoreError, CoreResult};
use ssikv_mvcc::MAX_HEIGHT;

/// Configuration for opening a database.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum tower height of the skiplist memtable.
    pub skiplist_max_height: usize,

    /// Whether `begin` blocks until every commit up to the begin timestamp
    /// has been applied to the memtable.
    ///
    /// With this on, a transaction always sees every commit whose timestamp
    /// is at or below its begin timestamp. With it off, a transaction may
    /// begin while the executor is still applying an earlier commit and
    /// read the older version.
    pub wait_for_commits_on_begin: bool,

    /// Capacity of the bounded queue feeding the transaction executor.
    pub executor_queue_capacity: usize,

    /// Seed for skiplist level generation (`None` = system entropy).
    pub level_seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            skiplist_max_height: 16,
            wait_for_commits_on_begin: true,
            executor_queue_capacity: 1024,
            level_seed: None,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the skiplist max height.
    #[must_use]
    pub const fn skiplist_max_height(mut self, height: usize) -> Self {
        self.skiplist_max_height = height;
        self
    }

    /// Sets whether `begin` waits for pending commits.
    #[must_use]
    pub const fn wait_for_commits_on_begin(mut self, value: bool) -> Self {
        self.wait_for_commits_on_begin = value;
        self
    }

    /// Sets the executor queue capacity.
    #[must_use]
    pub const fn executor_queue_capacity(mut self, capacity: usize) -> Self {
        self.executor_queue_capacity = capacity;
        self
    }

    /// Makes skiplist level generation deterministic.
    #[must_use]
    pub const fn level_seed(mut self, seed: u64) -> Self {
        self.level_seed = Some(seed);
        self
    }

    /// Checks that every value is in range.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] describing the first bad value.
    pub fn validate(&self) -> CoreResult<()> {
        if self.skiplist_max_height == 0 || self.skiplist_max_height > MAX_HEIGHT {
            return Err(CoreError::invalid_config(format!(
                "skiplist_max_height must be between 1 and {MAX_HEIGHT}, got {}",
                self.skiplist_max_height
            )));
        }
        if self.executor_queue_capacity == 0 {
            return Err(CoreError::invalid_config(
                "executor_queue_capacity must be >= 1",
            ));
        }
        Ok(())
    }
}
