//! Driving sampling stages to completion.
//!
//! The stage itself only ever does one step. The [`Runner`] is the piece of
//! pipeline plumbing that keeps calling it, moves finished documents out of the
//! output arena, checks for cancellation between steps, and reports stats.

use crate::arena::OutputArena;
use crate::draw::IndexDraw;
use crate::error::{Result, SampleError};
use crate::materializer::{BucketMaterializer, Document};
use crate::metrics::MetricsCollector;
use crate::source::BucketSource;
use crate::stage::{SampleFromBuckets, StageState};
use crate::stats::SampleStats;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cooperative cancellation flag shared between a caller and a running driver.
///
/// Checked between steps only; a step in progress always finishes.
#[derive(Clone, Debug, Default)]
pub struct Interrupt(Arc<AtomicBool>);

impl Interrupt {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Drives stages and collects their samples.
#[derive(Clone, Default)]
pub struct Runner {
    /// Checked before every step.
    pub interrupt: Option<Interrupt>,
    /// Receives each stage's stats when a run ends, successfully or not.
    pub metrics: Option<MetricsCollector>,
    /// Worker threads for [`run_collect_par`](Self::run_collect_par);
    /// rayon's global pool when `None`.
    pub threads: Option<usize>,
}

impl Runner {
    /// Step `stage` until it reports [`StageState::Exhausted`] and return every
    /// sampled measurement in production order.
    ///
    /// # Errors
    ///
    /// Any error returned by [`SampleFromBuckets::step`], or
    /// [`SampleError::Interrupted`] when the interrupt fires.
    pub fn run_collect<S, M, D>(
        &self,
        stage: &mut SampleFromBuckets<S, M, D>,
    ) -> Result<Vec<Document>>
    where
        S: BucketSource,
        M: BucketMaterializer<Bucket = S::Bucket>,
        D: IndexDraw,
    {
        if let Some(metrics) = &self.metrics {
            metrics.record_start();
        }
        let mut arena = OutputArena::new();
        let result = self.drive(stage, &mut arena);
        if let Some(metrics) = &self.metrics {
            stage.stats().publish(metrics);
            metrics.record_end();
        }
        result
    }

    /// Run independent stages (one per shard, say) in parallel and concatenate
    /// their samples in input order.
    ///
    /// Every stage runs to completion or failure; the first failure in input
    /// order is returned.
    ///
    /// # Errors
    ///
    /// The first stage error, or [`SampleError::InvalidConfig`] if the thread
    /// pool cannot be built.
    #[cfg(feature = "parallel")]
    pub fn run_collect_par<S, M, D>(
        &self,
        stages: Vec<SampleFromBuckets<S, M, D>>,
    ) -> Result<Vec<Document>>
    where
        S: BucketSource + Send,
        S::Bucket: Send,
        M: BucketMaterializer<Bucket = S::Bucket> + Send,
        D: IndexDraw + Send,
    {
        use rayon::prelude::*;

        if let Some(metrics) = &self.metrics {
            metrics.record_start();
        }
        let run = || {
            stages
                .into_par_iter()
                .map(|mut stage| {
                    let mut arena = OutputArena::new();
                    let result = self.drive(&mut stage, &mut arena);
                    (result, stage.stats().clone())
                })
                .collect::<Vec<_>>()
        };
        let outcomes = match self.threads {
            Some(n) => rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build()
                .map_err(|e| SampleError::InvalidConfig(format!("thread pool: {e}")))?
                .install(run),
            None => run(),
        };

        let mut merged = SampleStats::default();
        let mut docs = Vec::new();
        let mut first_err = None;
        for (result, stats) in outcomes {
            merged = merged.merged(&stats);
            match result {
                Ok(mut part) => docs.append(&mut part),
                Err(e) => {
                    first_err.get_or_insert(e);
                }
            }
        }
        if let Some(metrics) = &self.metrics {
            merged.publish(metrics);
            metrics.record_end();
        }
        first_err.map_or(Ok(docs), Err)
    }

    /// Lazily pull samples one at a time.
    ///
    /// Metrics timing starts here; stats are published when the iterator
    /// finishes or yields an error.
    pub fn samples<'a, S, M, D>(
        &'a self,
        stage: &'a mut SampleFromBuckets<S, M, D>,
    ) -> Samples<'a, S, M, D>
    where
        S: BucketSource,
        M: BucketMaterializer<Bucket = S::Bucket>,
        D: IndexDraw,
    {
        if let Some(metrics) = &self.metrics {
            metrics.record_start();
        }
        Samples {
            runner: self,
            stage,
            arena: OutputArena::new(),
            done: false,
        }
    }

    fn drive<S, M, D>(
        &self,
        stage: &mut SampleFromBuckets<S, M, D>,
        arena: &mut OutputArena,
    ) -> Result<Vec<Document>>
    where
        S: BucketSource,
        M: BucketMaterializer<Bucket = S::Bucket>,
        D: IndexDraw,
    {
        let capacity = usize::try_from(stage.sample_size()).unwrap_or(0).min(1 << 16);
        let mut out = Vec::with_capacity(capacity);
        loop {
            match self.next_sample(stage, arena)? {
                Some(doc) => out.push(doc),
                None => return Ok(out),
            }
        }
    }

    fn next_sample<S, M, D>(
        &self,
        stage: &mut SampleFromBuckets<S, M, D>,
        arena: &mut OutputArena,
    ) -> Result<Option<Document>>
    where
        S: BucketSource,
        M: BucketMaterializer<Bucket = S::Bucket>,
        D: IndexDraw,
    {
        loop {
            if self.interrupt.as_ref().is_some_and(Interrupt::is_triggered) {
                tracing::debug!(produced = stage.n_sampled_so_far(), "sampling interrupted");
                return Err(SampleError::Interrupted);
            }
            match stage.step(arena)? {
                StageState::Advanced(handle) => {
                    if let Some(doc) = arena.take(handle) {
                        return Ok(Some(doc));
                    }
                }
                StageState::NeedsMoreWork => {}
                StageState::Exhausted => return Ok(None),
            }
        }
    }
}

/// Iterator returned by [`Runner::samples`].
///
/// Yields each sampled measurement, then `None` once the stage is complete.
/// After an error it yields nothing further.
pub struct Samples<'a, S, M, D>
where
    S: BucketSource,
{
    runner: &'a Runner,
    stage: &'a mut SampleFromBuckets<S, M, D>,
    arena: OutputArena,
    done: bool,
}

impl<S, M, D> Iterator for Samples<'_, S, M, D>
where
    S: BucketSource,
    M: BucketMaterializer<Bucket = S::Bucket>,
    D: IndexDraw,
{
    type Item = Result<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.runner.next_sample(self.stage, &mut self.arena) {
            Ok(Some(doc)) => Some(Ok(doc)),
            Ok(None) => {
                self.finish();
                None
            }
            Err(e) => {
                self.finish();
                Some(Err(e))
            }
        }
    }
}

impl<S, M, D> Samples<'_, S, M, D>
where
    S: BucketSource,
    M: BucketMaterializer<Bucket = S::Bucket>,
    D: IndexDraw,
{
    fn finish(&mut self) {
        self.done = true;
        if let Some(metrics) = &self.runner.metrics {
            self.stage.stats().publish(metrics);
            metrics.record_end();
        }
    }
}
