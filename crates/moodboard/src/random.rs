//! Injectable randomness for seed tokens and aspect-ratio choice.

use rand::Rng as _;
use uuid::Uuid;

/// Provider of every random decision the pipeline makes.
pub trait RandomSource: Send + Sync {
    /// A fresh token unique enough to defeat response caching.
    fn token(&self) -> String;

    /// Choose an index in `0..len` uniformly. `len` is never zero.
    fn pick_index(&self, len: usize) -> usize;
}

/// Thread-local RNG for choices, v4 UUIDs for tokens.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn token(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }

    fn pick_index(&self, len: usize) -> usize {
        rand::rng().random_range(0..len.max(1))
    }
}
