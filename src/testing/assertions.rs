//! Assertions over sampled output.

use crate::key::MeasurementKey;
use crate::materializer::{BucketMaterializer, Document};
use std::collections::{HashMap, HashSet};

/// Assert that no two samples are the same document.
///
/// This compares content, not identity: two equal readings taken from
/// different buckets count as duplicates here. Use
/// [`assert_distinct_keys`] when measurements can legitimately repeat.
///
/// # Panics
///
/// Panics with the first repeated document and both positions.
pub fn assert_no_duplicates(samples: &[Document]) {
    let mut seen = HashMap::with_capacity(samples.len());
    for (i, doc) in samples.iter().enumerate() {
        let rendered = serde_json::Value::Object(doc.clone()).to_string();
        if let Some(first) = seen.insert(rendered.clone(), i) {
            panic!("duplicate sample at positions {first} and {i}: {rendered}");
        }
    }
}

/// Assert that every sample is a measurement `materializer` produces from one
/// of `buckets`.
///
/// # Panics
///
/// Panics on the first sample that matches no measurement, or if a bucket
/// cannot be unpacked.
pub fn assert_each_from_buckets<M: BucketMaterializer>(
    samples: &[Document],
    buckets: &[M::Bucket],
    materializer: &M,
) {
    let mut population = HashSet::new();
    for bucket in buckets {
        let count = materializer
            .measurement_count(bucket)
            .expect("bucket count");
        for index in 0..u32::try_from(count).expect("count fits u32") {
            let doc = materializer
                .materialize(bucket, index)
                .expect("materialize population");
            population.insert(serde_json::Value::Object(doc).to_string());
        }
    }
    for (i, doc) in samples.iter().enumerate() {
        let rendered = serde_json::Value::Object(doc.clone()).to_string();
        assert!(
            population.contains(&rendered),
            "sample {i} is not a measurement of any input bucket: {rendered}"
        );
    }
}

/// Assert that no measurement identity appears twice in `keys`.
///
/// # Panics
///
/// Panics with the first repeated key and both positions.
///
/// # Example
///
/// ```
/// use ironsample::testing::assert_distinct_keys;
/// use ironsample::{BucketId, MeasurementKey};
///
/// let id = BucketId::from_parts(1, 1);
/// assert_distinct_keys([MeasurementKey::new(id, 0), MeasurementKey::new(id, 1)]);
/// ```
pub fn assert_distinct_keys(keys: impl IntoIterator<Item = MeasurementKey>) {
    let mut seen = HashMap::new();
    for (i, key) in keys.into_iter().enumerate() {
        if let Some(first) = seen.insert(key, i) {
            panic!(
                "measurement {} of bucket {} sampled at positions {first} and {i}",
                key.index, key.bucket_id
            );
        }
    }
}
