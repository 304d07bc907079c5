//! Random tower heights for skiplist nodes.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Generates node heights for the skiplist.
///
/// Heights follow a geometric distribution with p = 1/2: a coin is flipped
/// for every level above the first and generation stops on the first tail.
/// The result is always in `1..=max_height`.
#[derive(Debug, Clone)]
pub struct LevelGenerator {
    max_height: usize,
    rng: StdRng,
}

impl LevelGenerator {
    /// Creates a generator seeded from system entropy.
    #[must_use]
    pub fn new(max_height: usize) -> Self {
        Self {
            max_height,
            rng: StdRng::from_entropy(),
        }
    }

    /// Creates a deterministic generator.
    #[must_use]
    pub fn with_seed(max_height: usize, seed: u64) -> Self {
        Self {
            max_height,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Returns the next height.
    pub fn generate(&mut self) -> usize {
        let mut height = 1;
        while height < self.max_height && self.rng.gen_bool(0.5) {
            height += 1;
        }
        height
    }

    /// Returns the maximum height this generator produces.
    #[must_use]
    pub const fn max_height(&self) -> usize {
        self.max_height
    }
}
