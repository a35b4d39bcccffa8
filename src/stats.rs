//! Per-stage statistics.

use crate::metrics::MetricsCollector;
use serde::{Deserialize, Serialize};

/// Counters updated on every [`step`](crate::stage::SampleFromBuckets::step).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleStats {
    /// Calls to `step`.
    pub works: u64,
    /// Samples produced so far.
    pub advanced: u64,
    /// Steps that ended because the bucket source was not ready.
    pub not_ready: u64,
    /// Buckets accepted from the source as candidates.
    pub buckets_pulled: u64,
    /// Candidates discarded because the drawn index was past their true count.
    pub buckets_discarded: u64,
    /// In-range draws checked against the seen-set.
    pub dups_tested: u64,
    /// In-range draws rejected as already sampled.
    pub dups_dropped: u64,
    /// Candidates holding more measurements than `bucket_max_count`.
    pub oversized_buckets: u64,
    /// Consecutive non-productive steps since the last sample.
    pub works_since_last_advanced: u64,
}

impl SampleStats {
    /// Fraction of draws that produced a sample.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn acceptance_rate(&self) -> f64 {
        let draws = self.buckets_discarded + self.dups_tested;
        if draws == 0 {
            0.0
        } else {
            self.advanced as f64 / draws as f64
        }
    }

    /// Counts from two stages added together. `works_since_last_advanced`
    /// takes the larger of the two.
    #[must_use]
    pub fn merged(&self, other: &Self) -> Self {
        Self {
            works: self.works + other.works,
            advanced: self.advanced + other.advanced,
            not_ready: self.not_ready + other.not_ready,
            buckets_pulled: self.buckets_pulled + other.buckets_pulled,
            buckets_discarded: self.buckets_discarded + other.buckets_discarded,
            dups_tested: self.dups_tested + other.dups_tested,
            dups_dropped: self.dups_dropped + other.dups_dropped,
            oversized_buckets: self.oversized_buckets + other.oversized_buckets,
            works_since_last_advanced: self
                .works_since_last_advanced
                .max(other.works_since_last_advanced),
        }
    }

    /// Add these counts to `metrics` and refresh the acceptance-rate gauge.
    pub fn publish(&self, metrics: &MetricsCollector) {
        metrics.increment_counter("works", self.works);
        metrics.increment_counter("samples_produced", self.advanced);
        metrics.increment_counter("not_ready", self.not_ready);
        metrics.increment_counter("buckets_pulled", self.buckets_pulled);
        metrics.increment_counter("buckets_discarded", self.buckets_discarded);
        metrics.increment_counter("dups_tested", self.dups_tested);
        metrics.increment_counter("dups_dropped", self.dups_dropped);
        metrics.increment_counter("oversized_buckets", self.oversized_buckets);
        metrics.set_gauge("acceptance_rate", self.acceptance_rate());
    }
}
