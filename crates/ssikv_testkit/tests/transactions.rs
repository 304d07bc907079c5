//! End-to-end transaction tests.

use proptest::prelude::*;
use ssikv_core::{
    Config, CoreError, KeyValueDb, Timestamp, TimestampMark, Value, VersionedKey,
};
use ssikv_mvcc::{MemTable, VersionedStore};
use ssikv_testkit::prelude::*;
use std::thread;
use std::time::Duration;

#[test]
fn storage_devices_scenario() {
    let test_db = TestDatabase::memory();
    assert_eq!(test_db.put("HDD", "Hard disk"), Timestamp::new(1));
    assert_eq!(test_db.put("HDD", "Hard disk drive"), Timestamp::new(2));
    for _ in 0..5 {
        test_db.put("Filler", "x");
    }

    let snapshot = test_db.begin_readonly().unwrap();
    assert_eq!(snapshot.begin_timestamp(), Timestamp::new(7));
    assert_eq!(snapshot.get("HDD").unwrap().as_bytes(), b"Hard disk drive");
    assert!(snapshot.get("Storage").is_none());
    snapshot.finish();

    assert_eq!(test_db.get_string("HDD").as_deref(), Some("Hard disk drive"));
}

#[test]
fn reader_of_overwritten_key_conflicts() {
    let test_db = TestDatabase::memory();
    test_db.put("HDD", "Hard disk");

    let mut a = test_db.begin_read_write().unwrap();
    let mut b = test_db.begin_read_write().unwrap();

    let hdd = a.get("HDD").unwrap();
    assert_eq!(hdd.as_bytes(), b"Hard disk");
    a.put_or_update("SSD", "Solid state").unwrap();

    b.put_or_update("HDD", "Hard disk drive").unwrap();
    wait_applied(&b.commit().unwrap());

    match a.commit() {
        Err(CoreError::TransactionConflict {
            begin_timestamp,
            conflicting_commit,
        }) => {
            assert_eq!(begin_timestamp, 1);
            assert_eq!(conflicting_commit, 2);
        }
        other => panic!("expected a conflict, got {other:?}"),
    }
    assert_eq!(test_db.get_string("SSD"), None);
}

#[test]
fn same_transactions_without_the_read_both_commit() {
    let test_db = TestDatabase::memory();
    test_db.put("HDD", "Hard disk");

    let mut a = test_db.begin_read_write().unwrap();
    let mut b = test_db.begin_read_write().unwrap();

    a.put_or_update("SSD", "Solid state").unwrap();
    b.put_or_update("HDD", "Hard disk drive").unwrap();
    wait_applied(&b.commit().unwrap());
    wait_applied(&a.commit().unwrap());

    assert_eq!(test_db.get_string("SSD").as_deref(), Some("Solid state"));
    assert_eq!(test_db.get_string("HDD").as_deref(), Some("Hard disk drive"));
}

#[test]
fn commits_are_visible_in_timestamp_order() {
    let test_db = TestDatabase::memory();
    let handles: Vec<_> = ["t1", "t2", "t3"]
        .into_iter()
        .map(|value| {
            test_db
                .put_or_update(|txn| txn.put_or_update("HDD", value))
                .unwrap()
        })
        .collect();

    let timestamps: Vec<_> = handles.iter().map(wait_applied).collect();
    assert_eq!(
        timestamps,
        vec![Timestamp::new(1), Timestamp::new(2), Timestamp::new(3)]
    );

    let memtable = test_db.memtable();
    for (timestamp, expected) in timestamps.iter().zip(["t1", "t2", "t3"]) {
        let value = memtable
            .entries()
            .into_iter()
            .find(|(key, _)| key.matches_key(b"HDD") && key.version() == timestamp.as_u64())
            .map(|(_, value)| value);
        assert_eq!(value.unwrap().as_bytes(), expected.as_bytes());
    }
}

#[test]
fn concurrent_commits_apply_in_timestamp_order() {
    const THREADS: usize = 4;
    const COMMITS_PER_THREAD: usize = 25;
    const TOTAL: u64 = (THREADS * COMMITS_PER_THREAD) as u64;

    let test_db = TestDatabase::memory();
    let hdd_versions = |db: &KeyValueDb| -> Vec<u64> {
        db.memtable()
            .entries()
            .into_iter()
            .filter(|(key, _)| key.matches_key(b"HDD"))
            .map(|(key, _)| key.version())
            .collect()
    };

    let committed: Vec<(Timestamp, String)> = thread::scope(|scope| {
        let workers: Vec<_> = (0..THREADS)
            .map(|t| {
                let db: &KeyValueDb = &test_db;
                scope.spawn(move || {
                    let mut committed = Vec::new();
                    for i in 0..COMMITS_PER_THREAD {
                        let value = format!("writer-{t}-{i}");
                        let handle = db
                            .put_or_update(|txn| txn.put_or_update("HDD", value.clone()))
                            .unwrap();
                        let commit = wait_applied(&handle);

                        // Every earlier commit is applied before this one.
                        let applied = hdd_versions(db);
                        assert!(
                            (1..=commit.as_u64()).all(|version| applied.contains(&version)),
                            "{commit} applied before an earlier commit"
                        );
                        db.oracle()
                            .commit_mark()
                            .wait_for_timeout(commit, Duration::from_secs(5))
                            .unwrap();
                        assert!(db.oracle().commit_mark().done_till() >= commit);

                        committed.push((commit, value));
                    }
                    committed
                })
            })
            .collect();
        workers
            .into_iter()
            .flat_map(|worker| worker.join().unwrap())
            .collect()
    });

    let versions = hdd_versions(&test_db.db);
    assert_eq!(versions, (1..=TOTAL).collect::<Vec<_>>());

    assert_eq!(committed.len() as u64, TOTAL);
    for (commit, value) in &committed {
        let stored = test_db
            .memtable()
            .get(&VersionedKey::new("HDD", commit.as_u64()))
            .unwrap();
        assert_eq!(stored.as_bytes(), value.as_bytes());
    }
}

#[test]
fn begin_timestamps_never_decrease() {
    let test_db = TestDatabase::memory();
    thread::scope(|scope| {
        scope.spawn(|| {
            for i in 0..50 {
                test_db.put("HDD", &format!("v{i}"));
            }
        });
        scope.spawn(|| {
            let mut last = Timestamp::ZERO;
            for _ in 0..200 {
                let txn = test_db.begin_readonly().unwrap();
                assert!(txn.begin_timestamp() >= last);
                last = txn.begin_timestamp();
            }
        });
    });
}

#[test]
fn serializable_counter_increments() {
    let test_db = TestDatabase::memory();
    let config = StressConfig {
        operations: 40,
        threads: 6,
        key_count: 1,
        ..Default::default()
    };

    let result = stress_concurrent_increments(&test_db, &config);
    assert_eq!(result.failed_ops, 0);
    assert_eq!(counter_total(&test_db, &config), result.successful_ops as u64);
}

#[test]
fn closed_database_rejects_transactions() {
    let test_db = TestDatabase::memory();
    test_db.put("HDD", "Hard disk");
    test_db.close();

    assert!(matches!(
        test_db.begin_read_write().unwrap_err(),
        CoreError::Shutdown { .. }
    ));
}

#[test]
fn non_blocking_begin_configuration() {
    let db = KeyValueDb::open(test_config().wait_for_commits_on_begin(false)).unwrap();
    let handle = db
        .put_or_update(|txn| txn.put_or_update("HDD", "Hard disk"))
        .unwrap();
    handle.wait_timeout(Duration::from_secs(5)).unwrap();
    assert!(handle.is_applied());

    let value = db.get(|txn| txn.get("HDD")).unwrap();
    assert_eq!(value.unwrap().as_bytes(), b"Hard disk");
}

#[test]
fn invalid_configuration_is_rejected() {
    let err = KeyValueDb::open(Config::new().executor_queue_capacity(0)).unwrap_err();
    assert!(matches!(err, CoreError::InvalidConfig { .. }));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn sequential_operations_match_model(operations in db_operations_strategy(24)) {
        let mut harness = IntegrationHarness::new();
        for operation in &operations {
            harness.apply(operation);
        }
        harness.verify_all();
        harness.verify_history();
    }

    #[test]
    fn memtable_reads_match_versioned_model(writes in versioned_writes_strategy()) {
        let memtable = MemTable::with_seed(12, 7).unwrap();
        for (key, version, value) in &writes {
            prop_assert!(memtable.put(
                VersionedKey::new(key.clone(), *version),
                Value::new(value.clone()),
            ));
        }
        prop_assert_eq!(memtable.len(), writes.len());

        for (key, _, _) in &writes {
            for read_version in 0..=64u64 {
                let expected = writes
                    .iter()
                    .filter(|(k, version, _)| k == key && *version <= read_version)
                    .max_by_key(|(_, version, _)| *version)
                    .map(|(_, _, value)| value.as_slice());
                let actual = memtable.get(&VersionedKey::new(key.clone(), read_version));
                prop_assert_eq!(actual.as_ref().map(|value| value.as_bytes()), expected);
            }
        }
        prop_assert!(memtable
            .get(&VersionedKey::new("Zz", u64::MAX))
            .is_none());
    }

    #[test]
    fn watermark_reaches_highest_timestamp(events in mark_interleaving_strategy()) {
        let mark = TimestampMark::spawn("proptest-mark", Timestamp::ZERO).unwrap();
        let mut highest = 0;
        for event in &events {
            match *event {
                MarkEvent::Begin(ts) => {
                    highest = highest.max(ts);
                    mark.begin(Timestamp::new(ts));
                }
                MarkEvent::Finish(ts) => mark.finish(Timestamp::new(ts)),
            }
        }
        mark.wait_for_timeout(Timestamp::new(highest), Duration::from_secs(5)).unwrap();
        prop_assert_eq!(mark.done_till(), Timestamp::new(highest));
    }
}
