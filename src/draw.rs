//! Random measurement-index draws.
//!
//! The stage needs exactly one kind of randomness: an index drawn uniformly
//! from `[0, bucket_max_count)`. [`IndexDraw`] is that capability on its own, so
//! tests can script the draws and production code can plug in any `rand` RNG.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of uniformly distributed indices.
pub trait IndexDraw {
    /// Draw from `[0, bound)`. `bound` is always greater than zero.
    fn draw_index(&mut self, bound: u32) -> u32;
}

impl<D: IndexDraw + ?Sized> IndexDraw for &mut D {
    fn draw_index(&mut self, bound: u32) -> u32 {
        (**self).draw_index(bound)
    }
}

impl<D: IndexDraw + ?Sized> IndexDraw for Box<D> {
    fn draw_index(&mut self, bound: u32) -> u32 {
        (**self).draw_index(bound)
    }
}

/// [`IndexDraw`] backed by a `rand` generator.
///
/// Uses `random_range`, which rejects rather than reduces modulo the bound, so
/// every index in range is equally likely.
#[derive(Clone, Debug)]
pub struct UniformIndex<R = StdRng> {
    rng: R,
}

impl UniformIndex {
    /// Generator seeded from the operating system.
    #[must_use]
    pub fn from_os_rng() -> Self {
        Self::new(StdRng::from_os_rng())
    }

    /// Reproducible generator.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    /// Seeded when `seed` is set, OS-seeded otherwise.
    #[must_use]
    pub fn from_optional_seed(seed: Option<u64>) -> Self {
        seed.map_or_else(Self::from_os_rng, Self::seeded)
    }
}

impl<R: Rng> UniformIndex<R> {
    pub const fn new(rng: R) -> Self {
        Self { rng }
    }

    pub fn into_inner(self) -> R {
        self.rng
    }
}

impl<R: Rng> IndexDraw for UniformIndex<R> {
    #[inline]
    fn draw_index(&mut self, bound: u32) -> u32 {
        self.rng.random_range(0..bound)
    }
}
