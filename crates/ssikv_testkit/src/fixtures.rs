//! Test fixtures and database helpers.
//!
//! Provides convenience functions for setting up test databases
//! and common test scenarios.

use ssikv_core::{CommitHandle, Config, KeyValueDb, Timestamp};
use tracing_subscriber::EnvFilter;

/// Installs a `tracing` subscriber for tests.
///
/// Honors `RUST_LOG`; output goes through the test harness so it is only
/// shown for failing tests. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Deterministic configuration used by the fixtures.
#[must_use]
pub fn test_config() -> Config {
    Config::new().level_seed(0x5eed)
}

/// A test database closed on drop.
pub struct TestDatabase {
    /// The database instance.
    pub db: KeyValueDb,
}

impl TestDatabase {
    /// Creates a database with [`test_config`].
    pub fn memory() -> Self {
        Self::with_config(test_config())
    }

    /// Creates a database with the given configuration.
    pub fn with_config(config: Config) -> Self {
        init_tracing();
        Self {
            db: KeyValueDb::open(config).expect("Failed to open database"),
        }
    }

    /// Commits `key -> value` in its own transaction and waits for it to be
    /// applied.
    pub fn put(&self, key: &str, value: &str) -> Timestamp {
        let key = key.to_owned();
        let value = value.to_owned();
        let handle = self
            .db
            .put_or_update(|txn| txn.put_or_update(key, value))
            .expect("Failed to commit");
        wait_applied(&handle)
    }

    /// Reads `key` as a UTF-8 string at the latest snapshot.
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.db
            .get(|txn| txn.get(key))
            .expect("Failed to read")
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
    }
}

impl std::ops::Deref for TestDatabase {
    type Target = KeyValueDb;

    fn deref(&self) -> &Self::Target {
        &self.db
    }
}

/// Waits for a commit to be applied and returns its timestamp.
pub fn wait_applied(handle: &CommitHandle) -> Timestamp {
    handle.wait().expect("Commit was not applied");
    handle.commit_timestamp()
}

/// Runs a test with a temporary database.
///
/// # Example
///
/// ```rust
/// use ssikv_testkit::with_temp_db;
///
/// with_temp_db(|db| {
///     let handle = db
///         .put_or_update(|txn| txn.put_or_update("HDD", "Hard disk"))
///         .unwrap();
///     handle.wait().unwrap();
/// });
/// ```
pub fn with_temp_db<F, R>(f: F) -> R
where
    F: FnOnce(&KeyValueDb) -> R,
{
    let test_db = TestDatabase::memory();
    f(&test_db.db)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// Storage devices used by the scenario tests.
    pub const STORAGE_CATALOG: &[(&str, &str)] = &[
        ("HDD", "Hard disk"),
        ("SSD", "Solid state drive"),
        ("NVMe", "Non-volatile memory express"),
        ("Tape", "Magnetic tape"),
    ];

    /// Creates a database holding every entry of [`STORAGE_CATALOG`], one
    /// commit per entry.
    pub fn storage_catalog() -> TestDatabase {
        let test_db = TestDatabase::memory();
        for (key, value) in STORAGE_CATALOG {
            test_db.put(key, value);
        }
        test_db
    }

    /// Creates a database where `key` has been rewritten `versions` times,
    /// the value at commit `n` being `"v{n}"`.
    pub fn versioned_key(key: &str, versions: u64) -> TestDatabase {
        let test_db = TestDatabase::memory();
        for version in 1..=versions {
            test_db.put(key, &format!("v{version}"));
        }
        test_db
    }
}
