//! Error type for the sampling stage and its driver.

use crate::bucket_id::BucketId;
use thiserror::Error;

/// Result alias used by the stage and runner APIs.
pub type Result<T> = std::result::Result<T, SampleError>;

/// Failures surfaced by [`SampleFromBuckets::step`](crate::stage::SampleFromBuckets::step)
/// and by the [`Runner`](crate::runner::Runner).
///
/// Out-of-range and duplicate draws are not errors; they show up as
/// [`StageState::NeedsMoreWork`](crate::stage::StageState::NeedsMoreWork).
#[derive(Debug, Error)]
pub enum SampleError {
    /// The bucket source reported a failure. The cause is passed through unchanged.
    #[error(transparent)]
    Upstream(anyhow::Error),

    /// The bucket source ran dry before the requested number of distinct
    /// measurements could be produced.
    #[error(
        "bucket source exhausted after {produced} of {requested} samples; \
         the requested sample size is not reachable with the supplied buckets"
    )]
    PrematureExhaustion { requested: u64, produced: u64 },

    /// The materializer could not read a bucket's id or measurement count.
    #[error("failed to inspect bucket: {source}")]
    Describe { source: anyhow::Error },

    /// The materializer failed to extract an in-range measurement.
    #[error("failed to materialize measurement {index} of bucket {bucket_id}: {source}")]
    Materialize {
        bucket_id: BucketId,
        index: u32,
        source: anyhow::Error,
    },

    #[error("configuration error: {0}")]
    InvalidConfig(String),

    /// Cooperative cancellation observed between steps.
    #[error("sampling interrupted")]
    Interrupted,

    /// `step()` was called again after the stage had already failed.
    #[error("sampling stage already failed; it cannot be resumed")]
    Terminated,
}

impl SampleError {
    /// Whether this error is the premature-exhaustion condition.
    #[must_use]
    pub const fn is_premature_exhaustion(&self) -> bool {
        matches!(self, Self::PrematureExhaustion { .. })
    }
}
