//! Fluent builders for test buckets.

use crate::bucket::{Bucket, Control};
use crate::bucket_id::BucketId;
use serde_json::Value;
use std::collections::BTreeMap;

/// A fluent builder for columnar [`Bucket`]s, one measurement at a time.
///
/// # Example
///
/// ```
/// use ironsample::testing::BucketBuilder;
/// use serde_json::json;
///
/// let bucket = BucketBuilder::new(1)
///     .meta(json!({ "sensor": "roof" }))
///     .measurement([("time", json!(0)), ("temp", json!(20.5))])
///     .measurement([("time", json!(60))])
///     .build();
///
/// assert_eq!(bucket.control.count, Some(2));
/// assert!(bucket.data["temp"].get(&1u32).is_none());
/// ```
#[derive(Clone, Debug)]
pub struct BucketBuilder {
    id: BucketId,
    meta: Option<Value>,
    data: BTreeMap<String, BTreeMap<u32, Value>>,
    len: u32,
    record_count: bool,
}

impl BucketBuilder {
    /// Start a bucket whose id is derived from `n`.
    #[must_use]
    pub fn new(n: u64) -> Self {
        Self::with_id(BucketId::from_parts(0x6500_0000, n))
    }

    #[must_use]
    pub fn with_id(id: BucketId) -> Self {
        Self {
            id,
            meta: None,
            data: BTreeMap::new(),
            len: 0,
            record_count: true,
        }
    }

    #[must_use]
    pub fn meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }

    /// Append one measurement. Fields not listed are left sparse.
    #[must_use]
    pub fn measurement<'a>(mut self, fields: impl IntoIterator<Item = (&'a str, Value)>) -> Self {
        for (name, value) in fields {
            self.data
                .entry(name.to_string())
                .or_default()
                .insert(self.len, value);
        }
        self.len += 1;
        self
    }

    /// Append `n` measurements with consecutive `time` values starting at `t0`.
    #[must_use]
    pub fn times(mut self, t0: i64, n: u32) -> Self {
        for i in 0..n {
            self = self.measurement([("time", Value::from(t0 + i64::from(i)))]);
        }
        self
    }

    /// Leave `control.count` unset so readers must count the time column.
    #[must_use]
    pub const fn without_count(mut self) -> Self {
        self.record_count = false;
        self
    }

    #[must_use]
    pub fn build(self) -> Bucket {
        Bucket {
            id: self.id,
            control: Control {
                version: Some(1),
                count: self.record_count.then_some(self.len),
                ..Control::default()
            },
            meta: self.meta,
            data: self.data,
        }
    }
}
