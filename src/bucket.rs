//! Columnar time-series buckets and the unpacker that reads them.
//!
//! A bucket stores many measurements that share a `meta` value. Each field is a
//! sparse column keyed by measurement index:
//!
//! ```json
//! {
//!   "_id": "6500000000000000000000a1",
//!   "control": { "version": 1, "count": 2 },
//!   "meta": { "sensor": "a" },
//!   "data": {
//!     "time": { "0": 1700000000, "1": 1700000060 },
//!     "temp": { "0": 21.5, "1": 21.9 },
//!     "gust": { "1": 14 }
//!   }
//! }
//! ```
//!
//! Fields missing at an index are simply absent from that measurement. The time
//! column is the exception: a measurement without a time value does not exist.

use crate::bucket_id::BucketId;
use crate::materializer::{BucketMaterializer, Document};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// One sparse column: measurement index → value.
pub type Column = BTreeMap<u32, Value>;

/// Bucket-level summary written by the storage layer.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Control {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    /// Number of measurements, when the writer recorded it. Checked against
    /// the time column, never trusted on its own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<Document>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<Document>,
}

/// A stored bucket of measurements.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    #[serde(rename = "_id")]
    pub id: BucketId,
    #[serde(default)]
    pub control: Control,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
    #[serde(default)]
    pub data: BTreeMap<String, Column>,
}

impl Bucket {
    /// Decode a bucket from a JSON value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value does not have the bucket shape.
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value).context("decode bucket document")
    }
}

/// Which fields of a measurement are materialized.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Projection {
    #[default]
    All,
    Include(BTreeSet<String>),
    Exclude(BTreeSet<String>),
}

impl Projection {
    #[must_use]
    pub fn keeps(&self, field: &str) -> bool {
        match self {
            Self::All => true,
            Self::Include(fields) => fields.contains(field),
            Self::Exclude(fields) => !fields.contains(field),
        }
    }
}

/// How buckets of a collection are laid out and what to extract from them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketSpec {
    /// Dense column that every measurement has. It defines the measurement
    /// count; `control.count`, when present, must agree with it.
    pub time_field: String,
    /// Name under which the bucket's `meta` value appears in each measurement.
    #[serde(default)]
    pub meta_field: Option<String>,
    #[serde(default)]
    pub projection: Projection,
}

impl Default for BucketSpec {
    fn default() -> Self {
        Self {
            time_field: "time".to_string(),
            meta_field: None,
            projection: Projection::All,
        }
    }
}

impl BucketSpec {
    #[must_use]
    pub fn new(time_field: impl Into<String>) -> Self {
        Self {
            time_field: time_field.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_meta_field(mut self, meta_field: impl Into<String>) -> Self {
        self.meta_field = Some(meta_field.into());
        self
    }

    #[must_use]
    pub fn with_projection(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }
}

/// Materializes single measurements out of [`Bucket`]s.
#[derive(Clone, Debug, Default)]
pub struct BucketUnpacker {
    spec: BucketSpec,
}

impl BucketUnpacker {
    #[must_use]
    pub const fn new(spec: BucketSpec) -> Self {
        Self { spec }
    }

    #[must_use]
    pub const fn spec(&self) -> &BucketSpec {
        &self.spec
    }

    /// One past the highest index in the dense time column.
    fn time_rows(&self, bucket: &Bucket) -> Result<usize> {
        let Some(time) = bucket.data.get(&self.spec.time_field) else {
            bail!(
                "bucket {} has no '{}' column",
                bucket.id,
                self.spec.time_field
            );
        };
        Ok(time.keys().next_back().map_or(0, |last| *last as usize + 1))
    }
}

impl BucketMaterializer for BucketUnpacker {
    type Bucket = Bucket;

    fn bucket_id(&self, bucket: &Bucket) -> Result<BucketId> {
        Ok(bucket.id)
    }

    fn measurement_count(&self, bucket: &Bucket) -> Result<usize> {
        let rows = self.time_rows(bucket)?;
        if let Some(count) = bucket.control.count
            && count as usize != rows
        {
            bail!(
                "bucket {} has control.count {count} but {rows} rows in '{}'",
                bucket.id,
                self.spec.time_field
            );
        }
        Ok(rows)
    }

    fn materialize(&self, bucket: &Bucket, index: u32) -> Result<Document> {
        let count = self.measurement_count(bucket)?;
        if index as usize >= count {
            bail!(
                "measurement index {index} out of range for bucket {} with {count} measurements",
                bucket.id
            );
        }
        let has_time = bucket
            .data
            .get(&self.spec.time_field)
            .is_some_and(|time| time.contains_key(&index));
        if !has_time {
            bail!(
                "bucket {} has no '{}' value for measurement {index}",
                bucket.id,
                self.spec.time_field
            );
        }

        let mut out = Document::new();
        for (field, column) in &bucket.data {
            if !self.spec.projection.keeps(field) {
                continue;
            }
            if let Some(v) = column.get(&index) {
                out.insert(field.clone(), v.clone());
            }
        }
        if let (Some(meta_field), Some(meta)) = (&self.spec.meta_field, &bucket.meta)
            && self.spec.projection.keeps(meta_field)
        {
            out.insert(meta_field.clone(), meta.clone());
        }
        Ok(out)
    }
}
