//! Arena-backed multi-version skiplist.
//!
//! Nodes live in a `Vec` and forward links are indices into it. The head is
//! a bare forward array with no key or value. Nodes are never removed, so an
//! index stays valid for the lifetime of the list.
//!
//! A sample level 0 holding three versions of `HDD`:
//!
//! ```text
//! head -> HDD@1: Hard disk -> HDD@2: Hard disk -> HDD@5: Hard disk drive -> nil
//! ```

use crate::error::{MvccError, MvccResult};
use crate::key::VersionedKey;
use crate::level::LevelGenerator;
use crate::value::Value;

/// Largest supported tower height.
pub const MAX_HEIGHT: usize = 32;

type NodeId = usize;

#[derive(Debug)]
struct Node {
    key: VersionedKey,
    value: Value,
    forwards: Vec<Option<NodeId>>,
}

/// A single-threaded skiplist of versioned keys.
///
/// [`crate::MemTable`] wraps this in a lock for concurrent use.
#[derive(Debug)]
pub struct Skiplist {
    head: Vec<Option<NodeId>>,
    nodes: Vec<Node>,
    levels: LevelGenerator,
}

impl Skiplist {
    /// Creates an empty skiplist with randomly seeded level generation.
    ///
    /// # Errors
    ///
    /// Returns [`MvccError::InvalidMaxHeight`] unless
    /// `1 <= max_height <= MAX_HEIGHT`.
    pub fn new(max_height: usize) -> MvccResult<Self> {
        validate_height(max_height)?;
        Ok(Self::with_generator(LevelGenerator::new(max_height)))
    }

    /// Creates an empty skiplist with deterministic level generation.
    ///
    /// # Errors
    ///
    /// Returns [`MvccError::InvalidMaxHeight`] unless
    /// `1 <= max_height <= MAX_HEIGHT`.
    pub fn with_seed(max_height: usize, seed: u64) -> MvccResult<Self> {
        validate_height(max_height)?;
        Ok(Self::with_generator(LevelGenerator::with_seed(
            max_height, seed,
        )))
    }

    fn with_generator(levels: LevelGenerator) -> Self {
        Self {
            head: vec![None; levels.max_height()],
            nodes: Vec::new(),
            levels,
        }
    }

    /// Inserts a binding.
    ///
    /// Returns `false` without modifying the list if the exact versioned key
    /// is already present. This makes re-applying the same commit harmless.
    pub fn insert(&mut self, key: VersionedKey, value: Value) -> bool {
        let positions = self.predecessors(&key);

        if let Some(existing) = self.next(positions[0], 0) {
            if self.nodes[existing].key == key {
                return false;
            }
        }

        let height = self.levels.generate();
        let id = self.nodes.len();
        let forwards = (0..height)
            .map(|level| self.next(positions[level], level))
            .collect();
        self.nodes.push(Node {
            key,
            value,
            forwards,
        });

        for (level, position) in positions.iter().enumerate().take(height) {
            self.set_next(*position, level, Some(id));
        }
        true
    }

    /// Returns the value of the latest version of `key.key()` whose version
    /// is `<= key.version()`.
    #[must_use]
    pub fn get(&self, key: &VersionedKey) -> Option<&Value> {
        let mut current = None;
        for level in (0..self.head.len()).rev() {
            current = self.advance(current, level, key);
        }

        // `current` is the last node strictly below the query. Its successor
        // answers an exact hit, otherwise the predecessor is the nearest older
        // version if it belongs to the same logical key.
        if let Some(next) = self.next(current, 0) {
            let node = &self.nodes[next];
            if node.key == *key {
                return Some(&node.value);
            }
        }

        current
            .map(|id| &self.nodes[id])
            .filter(|node| node.key.matches_key(key.key()))
            .map(|node| &node.value)
    }

    /// Returns the number of stored bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if nothing has been stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the maximum tower height.
    #[must_use]
    pub fn max_height(&self) -> usize {
        self.head.len()
    }

    /// Iterates over level 0 in versioned key order.
    pub fn iter(&self) -> impl Iterator<Item = (&VersionedKey, &Value)> + '_ {
        let mut current = self.head[0];
        std::iter::from_fn(move || {
            let id = current?;
            let node = &self.nodes[id];
            current = node.forwards[0];
            Some((&node.key, &node.value))
        })
    }

    fn predecessors(&self, key: &VersionedKey) -> Vec<Option<NodeId>> {
        let mut positions = vec![None; self.head.len()];
        let mut current = None;
        for level in (0..self.head.len()).rev() {
            current = self.advance(current, level, key);
            positions[level] = current;
        }
        positions
    }

    /// Moves right along `level` while the next node sorts below `key`.
    fn advance(
        &self,
        mut current: Option<NodeId>,
        level: usize,
        key: &VersionedKey,
    ) -> Option<NodeId> {
        while let Some(next) = self.next(current, level) {
            if self.nodes[next].key >= *key {
                break;
            }
            current = Some(next);
        }
        current
    }

    fn next(&self, current: Option<NodeId>, level: usize) -> Option<NodeId> {
        match current {
            None => self.head[level],
            Some(id) => self.nodes[id].forwards[level],
        }
    }

    fn set_next(&mut self, current: Option<NodeId>, level: usize, target: Option<NodeId>) {
        match current {
            None => self.head[level] = target,
            Some(id) => self.nodes[id].forwards[level] = target,
        }
    }
}

fn validate_height(max_height: usize) -> MvccResult<()> {
    if max_height == 0 || max_height > MAX_HEIGHT {
        return Err(MvccError::InvalidMaxHeight {
            requested: max_height,
            max: MAX_HEIGHT,
        });
    }
    Ok(())
}
