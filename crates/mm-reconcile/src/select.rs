//! Swappable random selection.
//!
//! Failover and random team splits draw from a [`RandomSource`] so tests can
//! pin the outcome with a seed or a closure.

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{thread_rng, Rng, SeedableRng};

pub trait RandomSource: Send + Sync {
    /// Uniform index in `0..len`. Callers never pass `len == 0`.
    fn pick(&self, len: usize) -> usize;
}

/// Fresh thread-local entropy on every draw.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn pick(&self, len: usize) -> usize {
        thread_rng().gen_range(0..len)
    }
}

/// Reproducible sequence from a fixed seed.
pub struct SeededRandom(Mutex<StdRng>);

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self(Mutex::new(StdRng::seed_from_u64(seed)))
    }
}

impl RandomSource for SeededRandom {
    fn pick(&self, len: usize) -> usize {
        let mut rng = self.0.lock().unwrap_or_else(|e| e.into_inner());
        rng.gen_range(0..len)
    }
}

impl<F> RandomSource for F
where
    F: Fn(usize) -> usize + Send + Sync,
{
    fn pick(&self, len: usize) -> usize {
        self(len) % len
    }
}

/// One element chosen uniformly, `None` for an empty slice.
pub fn choose<'a, T>(random: &dyn RandomSource, items: &'a [T]) -> Option<&'a T> {
    if items.is_empty() {
        return None;
    }
    items.get(random.pick(items.len()))
}

/// In-place Fisher-Yates shuffle.
pub fn shuffle<T>(random: &dyn RandomSource, items: &mut [T]) {
    for i in (1..items.len()).rev() {
        let j = random.pick(i + 1);
        items.swap(i, j);
    }
}
