//! Scripted stand-ins for the stage's collaborators.

use crate::bucket_id::BucketId;
use crate::draw::IndexDraw;
use crate::materializer::{BucketMaterializer, Document};
use crate::source::{BucketSource, SourcePoll};
use anyhow::{Result, anyhow, bail};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Shared call counter that stays readable after its owner has been moved
/// into a stage.
#[derive(Clone, Debug, Default)]
pub struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    #[must_use]
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// A bucket source that replays a fixed script of polls, then reports
/// `Exhausted` forever.
pub struct ScriptedSource<B> {
    script: VecDeque<SourcePoll<B>>,
    polls: CallCounter,
}

impl<B> Default for ScriptedSource<B> {
    fn default() -> Self {
        Self {
            script: VecDeque::new(),
            polls: CallCounter::default(),
        }
    }
}

impl<B> ScriptedSource<B> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn ready(mut self, bucket: B) -> Self {
        self.script.push_back(SourcePoll::Ready(bucket));
        self
    }

    #[must_use]
    pub fn ready_all(mut self, buckets: impl IntoIterator<Item = B>) -> Self {
        self.script
            .extend(buckets.into_iter().map(SourcePoll::Ready));
        self
    }

    #[must_use]
    pub fn not_ready(mut self) -> Self {
        self.script.push_back(SourcePoll::NotReady);
        self
    }

    #[must_use]
    pub fn fail(mut self, message: &str) -> Self {
        self.script
            .push_back(SourcePoll::Failed(anyhow!(message.to_string())));
        self
    }

    /// Handle counting every `next()` call.
    #[must_use]
    pub fn poll_counter(&self) -> CallCounter {
        self.polls.clone()
    }
}

impl<B: Clone> ScriptedSource<B> {
    /// Supply the same bucket `times` times.
    #[must_use]
    pub fn repeat(mut self, bucket: &B, times: usize) -> Self {
        for _ in 0..times {
            self.script.push_back(SourcePoll::Ready(bucket.clone()));
        }
        self
    }
}

impl<B> BucketSource for ScriptedSource<B> {
    type Bucket = B;

    fn next(&mut self) -> SourcePoll<B> {
        self.polls.bump();
        self.script.pop_front().unwrap_or(SourcePoll::Exhausted)
    }
}

/// Index draws taken from a fixed list.
///
/// # Panics
///
/// `draw_index` panics when the list runs out or a scripted value is not
/// below the requested bound; both mean the test script is wrong.
#[derive(Clone, Debug, Default)]
pub struct ScriptedDraws {
    values: VecDeque<u32>,
}

impl ScriptedDraws {
    pub fn new(values: impl IntoIterator<Item = u32>) -> Self {
        Self {
            values: values.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.values.len()
    }
}

impl IndexDraw for ScriptedDraws {
    fn draw_index(&mut self, bound: u32) -> u32 {
        let v = self
            .values
            .pop_front()
            .expect("scripted draws exhausted");
        assert!(v < bound, "scripted draw {v} is not below bound {bound}");
        v
    }
}

/// A bucket reduced to what the stage cares about: an id and a population.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyntheticBucket {
    pub id: BucketId,
    pub count: u32,
}

impl SyntheticBucket {
    /// Bucket whose id is derived from `n`.
    #[must_use]
    pub fn new(n: u64, count: u32) -> Self {
        Self {
            id: BucketId::from_parts(0x6500_0000, n),
            count,
        }
    }
}

/// Materializes `{ "bucket": <hex id>, "index": i }` for [`SyntheticBucket`]s.
#[derive(Clone, Copy, Debug, Default)]
pub struct SyntheticMaterializer;

impl BucketMaterializer for SyntheticMaterializer {
    type Bucket = SyntheticBucket;

    fn bucket_id(&self, bucket: &SyntheticBucket) -> Result<BucketId> {
        Ok(bucket.id)
    }

    fn measurement_count(&self, bucket: &SyntheticBucket) -> Result<usize> {
        Ok(bucket.count as usize)
    }

    fn materialize(&self, bucket: &SyntheticBucket, index: u32) -> Result<Document> {
        if index >= bucket.count {
            bail!("index {index} out of range for synthetic bucket of {}", bucket.count);
        }
        let mut doc = Document::new();
        doc.insert("bucket".into(), json!(bucket.id.to_hex()));
        doc.insert("index".into(), json!(index));
        Ok(doc)
    }
}

/// Wraps a materializer and counts `materialize` calls.
#[derive(Clone, Debug, Default)]
pub struct CountingMaterializer<M> {
    inner: M,
    calls: CallCounter,
}

impl<M> CountingMaterializer<M> {
    pub fn new(inner: M) -> Self {
        Self {
            inner,
            calls: CallCounter::default(),
        }
    }

    #[must_use]
    pub fn call_counter(&self) -> CallCounter {
        self.calls.clone()
    }
}

impl<M: BucketMaterializer> BucketMaterializer for CountingMaterializer<M> {
    type Bucket = M::Bucket;

    fn bucket_id(&self, bucket: &Self::Bucket) -> Result<BucketId> {
        self.inner.bucket_id(bucket)
    }

    fn measurement_count(&self, bucket: &Self::Bucket) -> Result<usize> {
        self.inner.measurement_count(bucket)
    }

    fn materialize(&self, bucket: &Self::Bucket, index: u32) -> Result<Document> {
        self.calls.bump();
        self.inner.materialize(bucket, index)
    }
}
