//! The sampling stage: one ARHASH iteration per call.
//!
//! [`SampleFromBuckets`] turns a stream of randomly chosen buckets into a stream
//! of distinct, uniformly chosen measurements. Every bucket is treated as if it
//! held `bucket_max_count` slots; an index is drawn uniformly over those slots
//! and the draw is rejected when it lands past the bucket's real population.
//! Small buckets are therefore rejected more often, which is exactly what makes
//! the accepted draws uniform over measurements rather than over buckets.
//! Draws that hit an already emitted measurement are rejected too.
//!
//! Each call to [`step`](SampleFromBuckets::step) does a bounded amount of work
//! and returns, so the surrounding pipeline can interleave other work and
//! observe cancellation between calls.
//!
//! # Example
//!
//! ```
//! use ironsample::arena::OutputArena;
//! use ironsample::bucket::BucketUnpacker;
//! use ironsample::config::SampleConfig;
//! use ironsample::source::RandomBucketCursor;
//! use ironsample::stage::{SampleFromBuckets, StageState};
//! use ironsample::testing::weather_buckets;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = SampleConfig {
//!     seed: Some(1),
//!     ..SampleConfig::new(2, 4)
//! };
//! let source = RandomBucketCursor::seeded(weather_buckets(), 1_000, 7);
//! let mut stage = SampleFromBuckets::from_config(&config, source, BucketUnpacker::default())?;
//! let mut arena = OutputArena::new();
//!
//! let mut produced = 0;
//! loop {
//!     match stage.step(&mut arena)? {
//!         StageState::Advanced(_) => produced += 1,
//!         StageState::NeedsMoreWork => continue,
//!         StageState::Exhausted => break,
//!     }
//! }
//! assert_eq!(produced, 2);
//! # Ok(())
//! # }
//! ```

use crate::arena::{OutputArena, OutputHandle};
use crate::bucket_id::BucketId;
use crate::config::SampleConfig;
use crate::draw::{IndexDraw, UniformIndex};
use crate::error::{Result, SampleError};
use crate::key::{MeasurementKey, SeenSet};
use crate::materializer::BucketMaterializer;
use crate::source::{BucketSource, SourcePoll};
use crate::stats::SampleStats;
use std::collections::HashMap;
use std::mem;
use tracing::{debug, error, info, trace, warn};

/// Outcome of one successful [`step`](SampleFromBuckets::step).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StageState {
    /// A new measurement was placed in the output arena.
    Advanced(OutputHandle),
    /// No sample this time; call again.
    NeedsMoreWork,
    /// The requested number of samples has been produced.
    Exhausted,
}

struct Candidate<B> {
    bucket: B,
    id: BucketId,
    count: usize,
}

enum Cursor<B> {
    NoCandidate,
    Holding(Candidate<B>),
    Exhausted,
    Failed,
}

/// Rejection-sampling stage over a bucket source.
pub struct SampleFromBuckets<S, M, D = UniformIndex>
where
    S: BucketSource,
{
    source: S,
    materializer: M,
    draws: D,
    sample_size: u64,
    bucket_max_count: u32,
    retain_after_sample: bool,
    stall_warning_threshold: Option<u64>,
    n_sampled_so_far: u64,
    seen: SeenSet,
    sampled_per_bucket: HashMap<BucketId, usize>,
    cursor: Cursor<S::Bucket>,
    stats: SampleStats,
}

impl<S, M> SampleFromBuckets<S, M, UniformIndex>
where
    S: BucketSource,
    M: BucketMaterializer<Bucket = S::Bucket>,
{
    /// Build a stage whose index draws come from `config.seed`, or the OS
    /// when no seed is set.
    ///
    /// # Errors
    ///
    /// Returns [`SampleError::InvalidConfig`] if the config does not validate.
    pub fn from_config(config: &SampleConfig, source: S, materializer: M) -> Result<Self> {
        let draws = UniformIndex::from_optional_seed(config.seed);
        Self::new(config, source, materializer, draws)
    }
}

impl<S, M, D> SampleFromBuckets<S, M, D>
where
    S: BucketSource,
    M: BucketMaterializer<Bucket = S::Bucket>,
    D: IndexDraw,
{
    /// # Errors
    ///
    /// Returns [`SampleError::InvalidConfig`] if the config does not validate.
    pub fn new(config: &SampleConfig, source: S, materializer: M, draws: D) -> Result<Self> {
        config.validate()?;
        let stats = SampleStats {
            works_since_last_advanced: config.works_since_last_advanced,
            ..SampleStats::default()
        };
        let capacity = usize::try_from(config.sample_size).unwrap_or(usize::MAX).min(1 << 16);
        Ok(Self {
            source,
            materializer,
            draws,
            sample_size: config.sample_size,
            bucket_max_count: config.bucket_max_count,
            retain_after_sample: config.retain_candidate_after_sample,
            stall_warning_threshold: config.stall_warning_threshold,
            n_sampled_so_far: 0,
            seen: SeenSet::with_capacity(capacity),
            sampled_per_bucket: HashMap::new(),
            cursor: Cursor::NoCandidate,
            stats,
        })
    }

    /// Perform one unit of sampling work.
    ///
    /// Once the sample is complete every further call returns
    /// [`StageState::Exhausted`] without touching the source.
    ///
    /// # Errors
    ///
    /// - [`SampleError::Upstream`] when the source fails.
    /// - [`SampleError::PrematureExhaustion`] when the source runs dry first.
    /// - [`SampleError::Describe`] / [`SampleError::Materialize`] when the
    ///   materializer fails.
    /// - [`SampleError::Terminated`] on any call after one of the above.
    pub fn step(&mut self, arena: &mut OutputArena) -> Result<StageState> {
        self.stats.works += 1;

        let candidate = match mem::replace(&mut self.cursor, Cursor::NoCandidate) {
            Cursor::Failed => {
                self.cursor = Cursor::Failed;
                return Err(SampleError::Terminated);
            }
            Cursor::Exhausted => {
                self.cursor = Cursor::Exhausted;
                return Ok(StageState::Exhausted);
            }
            _ if self.is_exhausted() => {
                self.cursor = Cursor::Exhausted;
                return Ok(StageState::Exhausted);
            }
            Cursor::Holding(candidate) => candidate,
            Cursor::NoCandidate => match self.pull()? {
                Some(candidate) => candidate,
                None => return Ok(StageState::NeedsMoreWork),
            },
        };

        let index = self.draws.draw_index(self.bucket_max_count);
        if index as usize >= candidate.count {
            self.stats.buckets_discarded += 1;
            self.note_no_progress();
            debug!(
                bucket_id = %candidate.id,
                index,
                count = candidate.count,
                "draw past bucket population; discarding bucket"
            );
            return Ok(StageState::NeedsMoreWork);
        }

        let key = MeasurementKey::new(candidate.id, index);
        self.stats.dups_tested += 1;
        if self.seen.contains(&key) {
            self.stats.dups_dropped += 1;
            self.note_no_progress();
            if self.has_unsampled(&candidate) {
                debug!(bucket_id = %candidate.id, index, "duplicate draw; keeping bucket");
                self.cursor = Cursor::Holding(candidate);
            } else {
                debug!(
                    bucket_id = %candidate.id,
                    "every measurement already sampled; discarding bucket"
                );
            }
            return Ok(StageState::NeedsMoreWork);
        }

        let doc = match self.materializer.materialize(&candidate.bucket, index) {
            Ok(doc) => doc,
            Err(source) => {
                error!(bucket_id = %candidate.id, index, error = %source, "materialization failed");
                self.cursor = Cursor::Failed;
                return Err(SampleError::Materialize {
                    bucket_id: candidate.id,
                    index,
                    source,
                });
            }
        };

        self.seen.insert(key);
        *self.sampled_per_bucket.entry(candidate.id).or_default() += 1;
        self.n_sampled_so_far += 1;
        self.stats.advanced += 1;
        self.stats.works_since_last_advanced = 0;
        trace!(bucket_id = %candidate.id, index, n = self.n_sampled_so_far, "sampled measurement");

        if self.is_exhausted() {
            info!(
                samples = self.n_sampled_so_far,
                works = self.stats.works,
                buckets_discarded = self.stats.buckets_discarded,
                dups_dropped = self.stats.dups_dropped,
                "sample complete"
            );
        } else if self.retain_after_sample && self.has_unsampled(&candidate) {
            self.cursor = Cursor::Holding(candidate);
        }

        Ok(StageState::Advanced(arena.insert(doc)))
    }

    /// Whether the requested number of samples has been produced.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.n_sampled_so_far >= self.sample_size
    }

    /// Whether the stage hit a terminal error.
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self.cursor, Cursor::Failed)
    }

    /// Whether a candidate bucket is currently held between steps.
    #[must_use]
    pub const fn holds_candidate(&self) -> bool {
        matches!(self.cursor, Cursor::Holding(_))
    }

    #[must_use]
    pub const fn n_sampled_so_far(&self) -> u64 {
        self.n_sampled_so_far
    }

    #[must_use]
    pub const fn sample_size(&self) -> u64 {
        self.sample_size
    }

    #[must_use]
    pub const fn bucket_max_count(&self) -> u32 {
        self.bucket_max_count
    }

    #[must_use]
    pub const fn works_since_last_advanced(&self) -> u64 {
        self.stats.works_since_last_advanced
    }

    #[must_use]
    pub const fn stats(&self) -> &SampleStats {
        &self.stats
    }

    /// Keys of every measurement emitted so far.
    #[must_use]
    pub const fn seen(&self) -> &SeenSet {
        &self.seen
    }

    fn pull(&mut self) -> Result<Option<Candidate<S::Bucket>>> {
        match self.source.next() {
            SourcePoll::Ready(bucket) => self.admit(bucket).map(Some),
            SourcePoll::NotReady => {
                self.stats.not_ready += 1;
                trace!("bucket source not ready");
                Ok(None)
            }
            SourcePoll::Exhausted => {
                error!(
                    requested = self.sample_size,
                    produced = self.n_sampled_so_far,
                    "bucket source exhausted before sample was complete"
                );
                self.cursor = Cursor::Failed;
                Err(SampleError::PrematureExhaustion {
                    requested: self.sample_size,
                    produced: self.n_sampled_so_far,
                })
            }
            SourcePoll::Failed(cause) => {
                error!(error = %cause, "bucket source failed");
                self.cursor = Cursor::Failed;
                Err(SampleError::Upstream(cause))
            }
        }
    }

    fn admit(&mut self, bucket: S::Bucket) -> Result<Candidate<S::Bucket>> {
        let described = self
            .materializer
            .bucket_id(&bucket)
            .and_then(|id| Ok((id, self.materializer.measurement_count(&bucket)?)));
        let (id, count) = match described {
            Ok(pair) => pair,
            Err(source) => {
                error!(error = %source, "could not inspect candidate bucket");
                self.cursor = Cursor::Failed;
                return Err(SampleError::Describe { source });
            }
        };
        self.stats.buckets_pulled += 1;
        if count > self.bucket_max_count as usize {
            self.stats.oversized_buckets += 1;
            warn!(
                bucket_id = %id,
                count,
                bucket_max_count = self.bucket_max_count,
                "bucket holds more measurements than bucket_max_count; indices past the bound are never sampled"
            );
        }
        Ok(Candidate { bucket, id, count })
    }

    /// Whether some drawable index of `candidate` has not been emitted yet.
    fn has_unsampled(&self, candidate: &Candidate<S::Bucket>) -> bool {
        let drawable = candidate.count.min(self.bucket_max_count as usize);
        let sampled = self
            .sampled_per_bucket
            .get(&candidate.id)
            .copied()
            .unwrap_or(0);
        sampled < drawable
    }

    fn note_no_progress(&mut self) {
        self.stats.works_since_last_advanced += 1;
        if let Some(threshold) = self.stall_warning_threshold
            && self.stats.works_since_last_advanced == threshold
        {
            warn!(
                works_since_last_advanced = threshold,
                produced = self.n_sampled_so_far,
                requested = self.sample_size,
                "sampling has made no progress for a while"
            );
        }
    }
}
