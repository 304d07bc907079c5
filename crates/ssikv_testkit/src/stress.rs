//! Stress tests for SSIKV.
//!
//! These tests verify behavior under heavy load and concurrent access.

use ssikv_core::{CoreResult, KeyValueDb};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Commits rejected with a conflict and retried.
    pub conflicts: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, conflicts: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            conflicts,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Conflicts retried: {}", self.conflicts);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of operations to perform per thread.
    pub operations: usize,
    /// Number of concurrent threads.
    pub threads: usize,
    /// Number of distinct keys.
    pub key_count: usize,
    /// Attempts per operation before it counts as failed.
    pub max_attempts: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 200,
            threads: 4,
            key_count: 8,
            max_attempts: 1_000,
        }
    }
}

fn counter_key(index: usize) -> String {
    format!("counter-{index}")
}

fn decode_counter(bytes: Option<&[u8]>) -> u64 {
    bytes
        .and_then(|bytes| std::str::from_utf8(bytes).ok())
        .and_then(|text| text.parse().ok())
        .unwrap_or(0)
}

/// Reads the counter stored under `key` at the latest snapshot.
pub fn read_counter(db: &KeyValueDb, key: &str) -> CoreResult<u64> {
    db.get(|txn| {
        let value = txn.get(key);
        decode_counter(value.as_ref().map(|value| value.as_bytes()))
    })
}

/// Increments the counter under `key` once, retrying on conflict.
///
/// Returns the number of conflicts seen before the increment committed.
pub fn increment_with_retry(db: &KeyValueDb, key: &str, max_attempts: usize) -> CoreResult<usize> {
    let mut conflicts = 0;
    loop {
        let result = db.put_or_update(|txn| {
            let current = decode_counter(txn.get(key).as_ref().map(|value| value.as_bytes()));
            txn.put_or_update(key.to_owned(), (current + 1).to_string())
        });
        match result {
            Ok(handle) => {
                handle.wait()?;
                return Ok(conflicts);
            }
            Err(err) if err.is_conflict() && conflicts + 1 < max_attempts => conflicts += 1,
            Err(err) => return Err(err),
        }
    }
}

/// Runs concurrent read-modify-write increments over a few shared counters.
///
/// Under serializable isolation no increment is lost, so the counters sum
/// to the number of successful operations.
pub fn stress_concurrent_increments(db: &KeyValueDb, config: &StressConfig) -> StressTestResult {
    let successful = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);
    let conflicts = AtomicUsize::new(0);

    let start = Instant::now();
    thread::scope(|scope| {
        for t in 0..config.threads {
            let (successful, failed, conflicts) = (&successful, &failed, &conflicts);
            scope.spawn(move || {
                for i in 0..config.operations {
                    let key = counter_key((t + i) % config.key_count);
                    match increment_with_retry(db, &key, config.max_attempts) {
                        Ok(retries) => {
                            successful.fetch_add(1, Ordering::Relaxed);
                            conflicts.fetch_add(retries, Ordering::Relaxed);
                        }
                        Err(_) => {
                            failed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            });
        }
    });

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        conflicts.load(Ordering::Relaxed),
        start.elapsed(),
    )
}

/// Sums every counter written by [`stress_concurrent_increments`].
pub fn counter_total(db: &KeyValueDb, config: &StressConfig) -> u64 {
    (0..config.key_count)
        .map(|index| read_counter(db, &counter_key(index)).expect("Failed to read counter"))
        .sum()
}

/// Runs concurrent blind writers, each to its own keys.
///
/// Blind writes never conflict, so every operation must succeed.
pub fn stress_disjoint_writers(db: &KeyValueDb, config: &StressConfig) -> StressTestResult {
    let successful = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);

    let start = Instant::now();
    thread::scope(|scope| {
        for t in 0..config.threads {
            let (successful, failed) = (&successful, &failed);
            scope.spawn(move || {
                for i in 0..config.operations {
                    let result = db
                        .put_or_update(|txn| txn.put_or_update(format!("writer-{t}-{i}"), "x"))
                        .and_then(|handle| handle.wait());
                    match result {
                        Ok(()) => successful.fetch_add(1, Ordering::Relaxed),
                        Err(_) => failed.fetch_add(1, Ordering::Relaxed),
                    };
                }
            });
        }
    });

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        0,
        start.elapsed(),
    )
}

/// Runs concurrent snapshot readers against a populated key set.
pub fn stress_concurrent_reads(db: &KeyValueDb, config: &StressConfig) -> StressTestResult {
    for index in 0..config.key_count {
        db.put_or_update(|txn| txn.put_or_update(counter_key(index), "0"))
            .and_then(|handle| handle.wait())
            .expect("Failed to seed counter");
    }

    let successful = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);

    let start = Instant::now();
    thread::scope(|scope| {
        for t in 0..config.threads {
            let (successful, failed) = (&successful, &failed);
            scope.spawn(move || {
                for i in 0..config.operations {
                    let key = counter_key((t * config.operations + i) % config.key_count);
                    match db.get(|txn| txn.get(&key)) {
                        Ok(Some(_)) => successful.fetch_add(1, Ordering::Relaxed),
                        Ok(None) | Err(_) => failed.fetch_add(1, Ordering::Relaxed),
                    };
                }
            });
        }
    });

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        0,
        start.elapsed(),
    )
}
