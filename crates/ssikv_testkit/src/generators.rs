//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random test data
//! that maintains required invariants.

use proptest::prelude::*;

/// Strategy for generating keys from a small alphabet, so generated
/// workloads touch the same keys often.
pub fn key_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-D][a-c]{0,2}").expect("Invalid regex")
}

/// Strategy for generating arbitrary value bytes.
pub fn value_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..64)
}

/// Strategy for generating `(key, version, value)` writes with distinct
/// `(key, version)` pairs.
pub fn versioned_writes_strategy() -> impl Strategy<Value = Vec<(String, u64, Vec<u8>)>> {
    prop::collection::btree_map((key_strategy(), 1u64..64), value_strategy(), 1..48).prop_map(
        |writes| {
            writes
                .into_iter()
                .map(|((key, version), value)| (key, version, value))
                .collect()
        },
    )
}

/// One event of a watermark workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkEvent {
    /// Begin the timestamp.
    Begin(u64),
    /// Finish the timestamp.
    Finish(u64),
}

/// Strategy for generating interleavings of begin/finish pairs in which
/// each timestamp's `Begin` precedes its `Finish`.
pub fn mark_interleaving_strategy() -> impl Strategy<Value = Vec<MarkEvent>> {
    prop::collection::vec(1u64..32, 1..16).prop_flat_map(|timestamps| {
        let slots: Vec<usize> = (0..timestamps.len()).flat_map(|i| [i, i]).collect();
        Just(slots).prop_shuffle().prop_map(move |slots| {
            let mut begun = vec![false; timestamps.len()];
            slots
                .into_iter()
                .map(|slot| {
                    if begun[slot] {
                        MarkEvent::Finish(timestamps[slot])
                    } else {
                        begun[slot] = true;
                        MarkEvent::Begin(timestamps[slot])
                    }
                })
                .collect()
        })
    })
}

/// An operation applied sequentially to a database and to a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbOperation {
    /// Commit the pairs in one read-write transaction.
    Write(Vec<(String, Vec<u8>)>),
    /// Read the key at the latest snapshot.
    Read(String),
}

/// Strategy for generating a single database operation.
pub fn db_operation_strategy() -> impl Strategy<Value = DbOperation> {
    prop_oneof![
        prop::collection::btree_map(key_strategy(), value_strategy(), 1..4)
            .prop_map(|pairs| DbOperation::Write(pairs.into_iter().collect())),
        key_strategy().prop_map(DbOperation::Read),
    ]
}

/// Strategy for generating a sequence of database operations.
pub fn db_operations_strategy(max_len: usize) -> impl Strategy<Value = Vec<DbOperation>> {
    prop::collection::vec(db_operation_strategy(), 0..max_len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    proptest! {
        #[test]
        fn test_keys_are_short(key in key_strategy()) {
            prop_assert!(!key.is_empty());
            prop_assert!(key.len() <= 3);
        }

        #[test]
        fn test_versioned_writes_are_distinct(writes in versioned_writes_strategy()) {
            let mut seen = HashSet::new();
            for (key, version, _) in &writes {
                prop_assert!(seen.insert((key.clone(), *version)));
            }
        }

        #[test]
        fn test_interleavings_begin_before_finish(events in mark_interleaving_strategy()) {
            let mut open: Vec<u64> = Vec::new();
            for event in events {
                match event {
                    MarkEvent::Begin(ts) => open.push(ts),
                    MarkEvent::Finish(ts) => {
                        let index = open.iter().position(|&t| t == ts);
                        prop_assert!(index.is_some());
                        open.swap_remove(index.unwrap());
                    }
                }
            }
            prop_assert!(open.is_empty());
        }

        #[test]
        fn test_writes_have_no_duplicate_keys(op in db_operation_strategy()) {
            if let DbOperation::Write(pairs) = op {
                let keys: HashSet<_> = pairs.iter().map(|(k, _)| k.clone()).collect();
                prop_assert_eq!(keys.len(), pairs.len());
            }
        }
    }
}
