//! The seam between the sampling stage and the bucket storage format.
//!
//! The stage never looks inside a bucket itself. It asks a
//! [`BucketMaterializer`] for three things: the bucket's id, how many
//! measurements it really holds, and the one measurement at a given index.
//! [`BucketUnpacker`](crate::bucket::BucketUnpacker) is the implementation for
//! the columnar [`Bucket`](crate::bucket::Bucket) layout; tests and embedders
//! can supply their own.

use crate::bucket_id::BucketId;
use anyhow::Result;
use serde_json::{Map, Value};

/// A materialized measurement: one flat JSON object.
pub type Document = Map<String, Value>;

/// Extracts single measurements from a bucket.
pub trait BucketMaterializer {
    /// The bucket handle handed out by the bucket source.
    type Bucket;

    /// Globally unique identifier of `bucket`.
    fn bucket_id(&self, bucket: &Self::Bucket) -> Result<BucketId>;

    /// The true number of measurements stored in `bucket`.
    fn measurement_count(&self, bucket: &Self::Bucket) -> Result<usize>;

    /// Materialize the measurement at `index`.
    ///
    /// Calling this with `index >= measurement_count(bucket)` is an error;
    /// implementations report it rather than panic.
    fn materialize(&self, bucket: &Self::Bucket, index: u32) -> Result<Document>;
}

impl<M: BucketMaterializer + ?Sized> BucketMaterializer for &M {
    type Bucket = M::Bucket;

    fn bucket_id(&self, bucket: &Self::Bucket) -> Result<BucketId> {
        (**self).bucket_id(bucket)
    }

    fn measurement_count(&self, bucket: &Self::Bucket) -> Result<usize> {
        (**self).measurement_count(bucket)
    }

    fn materialize(&self, bucket: &Self::Bucket, index: u32) -> Result<Document> {
        (**self).materialize(bucket, index)
    }
}
