//! Pull-based bucket sources feeding the sampling stage.
//!
//! A [`BucketSource`] is polled once per stage step. It can hand over a bucket,
//! ask to be polled again later, report that it has nothing left, or fail.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::fmt;

/// Result of polling a [`BucketSource`].
pub enum SourcePoll<B> {
    Ready(B),
    /// Nothing available yet; poll again on a later step.
    NotReady,
    /// No more candidates will ever be produced.
    Exhausted,
    Failed(anyhow::Error),
}

impl<B> SourcePoll<B> {
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// Transform the bucket of a `Ready` poll.
    pub fn map<C>(self, f: impl FnOnce(B) -> C) -> SourcePoll<C> {
        match self {
            Self::Ready(b) => SourcePoll::Ready(f(b)),
            Self::NotReady => SourcePoll::NotReady,
            Self::Exhausted => SourcePoll::Exhausted,
            Self::Failed(e) => SourcePoll::Failed(e),
        }
    }
}

impl<B> fmt::Debug for SourcePoll<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(_) => f.write_str("Ready(..)"),
            Self::NotReady => f.write_str("NotReady"),
            Self::Exhausted => f.write_str("Exhausted"),
            Self::Failed(e) => write!(f, "Failed({e})"),
        }
    }
}

/// Upstream supplier of randomly chosen candidate buckets.
pub trait BucketSource {
    type Bucket;

    fn next(&mut self) -> SourcePoll<Self::Bucket>;
}

impl<S: BucketSource + ?Sized> BucketSource for Box<S> {
    type Bucket = S::Bucket;

    fn next(&mut self) -> SourcePoll<Self::Bucket> {
        (**self).next()
    }
}

/// Hands out an owned list of buckets in order, then reports `Exhausted`.
///
/// The caller is responsible for the list already being in random order.
#[derive(Clone, Debug)]
pub struct VecBucketSource<B> {
    buckets: VecDeque<B>,
}

impl<B> VecBucketSource<B> {
    #[must_use]
    pub fn new(buckets: Vec<B>) -> Self {
        Self {
            buckets: buckets.into(),
        }
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buckets.len()
    }
}

impl<B> BucketSource for VecBucketSource<B> {
    type Bucket = B;

    fn next(&mut self) -> SourcePoll<B> {
        self.buckets
            .pop_front()
            .map_or(SourcePoll::Exhausted, SourcePoll::Ready)
    }
}

/// Draws buckets uniformly at random, with replacement, from an owned pool.
///
/// This is what a storage-level random cursor looks like from the outside: the
/// same bucket may come back many times. After `max_draws` polls it reports
/// `Exhausted`, so a sample that cannot be completed fails instead of spinning.
#[derive(Debug)]
pub struct RandomBucketCursor<B, R = StdRng> {
    pool: Vec<B>,
    rng: R,
    draws_left: u64,
}

impl<B: Clone> RandomBucketCursor<B> {
    /// Cursor seeded from the operating system.
    #[must_use]
    pub fn new(pool: Vec<B>, max_draws: u64) -> Self {
        Self::with_rng(pool, max_draws, StdRng::from_os_rng())
    }

    /// Deterministic cursor.
    #[must_use]
    pub fn seeded(pool: Vec<B>, max_draws: u64, seed: u64) -> Self {
        Self::with_rng(pool, max_draws, StdRng::seed_from_u64(seed))
    }
}

impl<B: Clone, R: Rng> RandomBucketCursor<B, R> {
    pub const fn with_rng(pool: Vec<B>, max_draws: u64, rng: R) -> Self {
        Self {
            pool,
            rng,
            draws_left: max_draws,
        }
    }

    #[must_use]
    pub const fn draws_left(&self) -> u64 {
        self.draws_left
    }
}

impl<B: Clone, R: Rng> BucketSource for RandomBucketCursor<B, R> {
    type Bucket = B;

    fn next(&mut self) -> SourcePoll<B> {
        if self.pool.is_empty() || self.draws_left == 0 {
            return SourcePoll::Exhausted;
        }
        self.draws_left -= 1;
        let i = self.rng.random_range(0..self.pool.len());
        SourcePoll::Ready(self.pool[i].clone())
    }
}
