use rand::rngs::{StdRng, ThreadRng};
use rand::{Rng, SeedableRng};
use std::ops::Range;

/// Every random decision the resolver makes goes through this trait.
pub trait RandomSource {
    /// Uniform draw in `[0, 1)`.
    fn unit(&mut self) -> f64;

    /// Uniform integer in `range`; `range` must be non-empty.
    fn int_in(&mut self, range: Range<i32>) -> i32 {
        let span = range.end - range.start;
        let offset = (self.unit() * span as f64).floor() as i32;
        range.start + offset.clamp(0, span - 1)
    }

    /// Uniform index into a non-empty slice of length `len`.
    fn index(&mut self, len: usize) -> usize {
        let i = (self.unit() * len as f64).floor() as usize;
        i.min(len - 1)
    }
}

pub struct RngSource<R: Rng>(R);

impl RngSource<ThreadRng> {
    pub fn thread() -> Self {
        Self(rand::rng())
    }
}

impl RngSource<StdRng> {
    pub fn seeded(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> RandomSource for RngSource<R> {
    fn unit(&mut self) -> f64 {
        self.0.random::<f64>()
    }

    fn int_in(&mut self, range: Range<i32>) -> i32 {
        self.0.random_range(range)
    }

    fn index(&mut self, len: usize) -> usize {
        self.0.random_range(0..len)
    }
}
