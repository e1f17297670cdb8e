use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

/// Source of humanized randomness: inter-send spacing, like delays, scheduler
/// jitter, and random picks of accounts / cashtags / raid targets.
///
/// Seedable so tests can pin every roll.
pub struct DelayGenerator {
    rng: Mutex<StdRng>,
}

impl DelayGenerator {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut rng)
    }

    /// Uniform number of seconds in `[min, max]`, both bounds inclusive.
    pub fn delay_secs(&self, min: u64, max: u64) -> u64 {
        let hi = max.max(min);
        self.with_rng(|rng| rng.gen_range(min..=hi))
    }

    /// Uniform number of minutes in `[min, max]`, both bounds inclusive.
    pub fn offset_minutes(&self, min: i64, max: i64) -> i64 {
        let hi = max.max(min);
        self.with_rng(|rng| rng.gen_range(min..=hi))
    }

    /// Uniform integer in `[min, max]`, e.g. the number of raid rounds.
    pub fn roll(&self, min: usize, max: usize) -> usize {
        let hi = max.max(min);
        self.with_rng(|rng| rng.gen_range(min..=hi))
    }

    /// Index into a collection of `len` elements. `len` must be non-zero.
    pub fn pick_index(&self, len: usize) -> usize {
        if len <= 1 {
            return 0;
        }
        self.with_rng(|rng| rng.gen_range(0..len))
    }

    /// Up to `count` distinct random elements of `items`.
    pub fn sample<T: Clone>(&self, items: &[T], count: usize) -> Vec<T> {
        self.with_rng(|rng| {
            items
                .choose_multiple(rng, count.min(items.len()))
                .cloned()
                .collect()
        })
    }
}

impl Default for DelayGenerator {
    fn default() -> Self {
        Self::new()
    }
}
