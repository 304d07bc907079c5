//! Versioned keys.

use bytes::Bytes;
use std::fmt;

/// A key paired with a version.
///
/// The version is the commit timestamp of the transaction that wrote the
/// key. Ordering is lexicographic on the key bytes and then ascending on the
/// version, so all versions of one key sit next to each other in the
/// skiplist, oldest first:
///
/// ```text
/// HDD@1 -> HDD@2 -> HDD@5 -> SSD@1 -> SSD@3
/// ```
///
/// The derived ordering relies on the field order below.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VersionedKey {
    key: Bytes,
    version: u64,
}

impl VersionedKey {
    /// Creates a new versioned key.
    #[must_use]
    pub fn new(key: impl Into<Bytes>, version: u64) -> Self {
        Self {
            key: key.into(),
            version,
        }
    }

    /// Returns the logical key.
    #[must_use]
    pub fn key(&self) -> &Bytes {
        &self.key
    }

    /// Returns the version.
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// Returns true if the logical key equals `key`, ignoring the version.
    #[must_use]
    pub fn matches_key(&self, key: &[u8]) -> bool {
        self.key.as_ref() == key
    }
}

impl fmt::Debug for VersionedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", String::from_utf8_lossy(&self.key), self.version)
    }
}
