//! Scenario test vectors for SSIKV.
//!
//! Vectors are plain data so they can be exported as JSON and replayed by
//! other implementations of the same storage model.

use serde::{Deserialize, Serialize};

/// A versioned write `key@version = value`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedWrite {
    /// Logical key.
    pub key: String,
    /// Version (commit timestamp).
    pub version: u64,
    /// Value.
    pub value: String,
}

/// A read `key@version` and the value it must return.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedRead {
    /// Logical key.
    pub key: String,
    /// Read version.
    pub version: u64,
    /// Expected value, `None` when nothing is visible.
    pub expected: Option<String>,
}

/// Writes applied to an empty store followed by reads to check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MvccVector {
    /// Unique identifier for this vector.
    pub id: String,
    /// Human-readable description.
    pub description: String,
    /// Writes, applied in order.
    pub writes: Vec<VersionedWrite>,
    /// Reads to check after all writes.
    pub reads: Vec<VersionedRead>,
}

/// Two concurrent transactions: the first reads `reads` and writes
/// `first_writes`; the second writes `second_writes` and commits first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictVector {
    /// Unique identifier for this vector.
    pub id: String,
    /// Human-readable description.
    pub description: String,
    /// Keys read by the first transaction.
    pub reads: Vec<String>,
    /// Keys written by the first transaction.
    pub first_writes: Vec<String>,
    /// Keys written by the second transaction.
    pub second_writes: Vec<String>,
    /// Whether the first transaction's commit must be rejected.
    pub expect_conflict: bool,
}

fn write(key: &str, version: u64, value: &str) -> VersionedWrite {
    VersionedWrite {
        key: key.into(),
        version,
        value: value.into(),
    }
}

fn read(key: &str, version: u64, expected: Option<&str>) -> VersionedRead {
    VersionedRead {
        key: key.into(),
        version,
        expected: expected.map(Into::into),
    }
}

fn keys(keys: &[&str]) -> Vec<String> {
    keys.iter().map(|key| (*key).to_owned()).collect()
}

/// Versioned read vectors.
pub fn mvcc_read_vectors() -> Vec<MvccVector> {
    vec![
        MvccVector {
            id: "mvcc_single_version".into(),
            description: "A single version is visible at and after its timestamp".into(),
            writes: vec![write("HDD", 1, "Hard disk")],
            reads: vec![
                read("HDD", 0, None),
                read("HDD", 1, Some("Hard disk")),
                read("HDD", 8, Some("Hard disk")),
            ],
        },
        MvccVector {
            id: "mvcc_shadowing".into(),
            description: "A later version shadows an earlier one from its timestamp on".into(),
            writes: vec![write("HDD", 1, "Hard disk"), write("HDD", 2, "Hard disk drive")],
            reads: vec![
                read("HDD", 1, Some("Hard disk")),
                read("HDD", 2, Some("Hard disk drive")),
                read("HDD", 8, Some("Hard disk drive")),
            ],
        },
        MvccVector {
            id: "mvcc_missing_key".into(),
            description: "A key never written is not found at any version".into(),
            writes: vec![write("HDD", 1, "Hard disk")],
            reads: vec![read("Storage", 1, None), read("Storage", 99, None)],
        },
        MvccVector {
            id: "mvcc_neighbour_keys".into(),
            description: "Versions of neighbouring keys never leak into each other".into(),
            writes: vec![
                write("HDD", 5, "Hard disk"),
                write("HD", 1, "High definition"),
                write("HDDs", 2, "Hard disks"),
            ],
            reads: vec![
                read("HDD", 4, None),
                read("HDD", 5, Some("Hard disk")),
                read("HD", 9, Some("High definition")),
                read("HDDs", 1, None),
            ],
        },
        MvccVector {
            id: "mvcc_gapped_versions".into(),
            description: "Reads between versions see the older version".into(),
            writes: vec![
                write("SSD", 10, "v10"),
                write("SSD", 3, "v3"),
                write("SSD", 7, "v7"),
            ],
            reads: vec![
                read("SSD", 2, None),
                read("SSD", 3, Some("v3")),
                read("SSD", 6, Some("v3")),
                read("SSD", 9, Some("v7")),
                read("SSD", 10, Some("v10")),
            ],
        },
    ]
}

/// Read-write conflict vectors.
pub fn conflict_vectors() -> Vec<ConflictVector> {
    vec![
        ConflictVector {
            id: "conflict_read_overwritten".into(),
            description: "Reading a key a concurrent commit wrote conflicts".into(),
            reads: keys(&["HDD"]),
            first_writes: keys(&["SSD"]),
            second_writes: keys(&["HDD"]),
            expect_conflict: true,
        },
        ConflictVector {
            id: "conflict_blind_write".into(),
            description: "Writing without reading never conflicts".into(),
            reads: vec![],
            first_writes: keys(&["SSD"]),
            second_writes: keys(&["HDD"]),
            expect_conflict: false,
        },
        ConflictVector {
            id: "conflict_write_write".into(),
            description: "Two blind writes of the same key both commit".into(),
            reads: vec![],
            first_writes: keys(&["HDD"]),
            second_writes: keys(&["HDD"]),
            expect_conflict: false,
        },
        ConflictVector {
            id: "conflict_disjoint_read".into(),
            description: "Reading a key the concurrent commit did not write is fine".into(),
            reads: keys(&["NVMe"]),
            first_writes: keys(&["SSD"]),
            second_writes: keys(&["HDD", "Tape"]),
            expect_conflict: false,
        },
        ConflictVector {
            id: "conflict_one_of_many".into(),
            description: "One overlapping key among many reads is enough".into(),
            reads: keys(&["NVMe", "SSD", "Tape"]),
            first_writes: keys(&["HDD"]),
            second_writes: keys(&["Tape"]),
            expect_conflict: true,
        },
    ]
}

/// Returns all vectors as JSON.
pub fn all_vectors_json() -> String {
    let all = AllVectors {
        mvcc: mvcc_read_vectors(),
        conflict: conflict_vectors(),
    };
    serde_json::to_string_pretty(&all).expect("Failed to serialize vectors")
}

#[derive(Serialize, Deserialize)]
struct AllVectors {
    mvcc: Vec<MvccVector>,
    conflict: Vec<ConflictVector>,
}
