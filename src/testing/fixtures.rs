//! Pre-built buckets for common test scenarios.

use crate::bucket::Bucket;
use crate::testing::builders::BucketBuilder;
use crate::testing::scripted::SyntheticBucket;
use serde_json::json;

/// Three small weather-station buckets holding 4, 3 and 2 measurements
/// (nine in total), each with `time` and `temp` columns and a `sensor` meta.
///
/// The roof bucket's last measurement has no `temp`.
///
/// # Example
///
/// ```
/// use ironsample::testing::weather_buckets;
///
/// let buckets = weather_buckets();
/// assert_eq!(buckets.len(), 3);
/// ```
#[must_use]
pub fn weather_buckets() -> Vec<Bucket> {
    vec![
        BucketBuilder::new(1)
            .meta(json!({ "sensor": "roof" }))
            .measurement([("time", json!(1_700_000_000)), ("temp", json!(11.5))])
            .measurement([("time", json!(1_700_000_060)), ("temp", json!(11.7))])
            .measurement([("time", json!(1_700_000_120)), ("temp", json!(12.0))])
            .measurement([("time", json!(1_700_000_180))])
            .build(),
        BucketBuilder::new(2)
            .meta(json!({ "sensor": "garden" }))
            .measurement([("time", json!(1_700_000_000)), ("temp", json!(9.1))])
            .measurement([("time", json!(1_700_000_060)), ("temp", json!(9.4))])
            .measurement([("time", json!(1_700_000_120)), ("temp", json!(9.0))])
            .build(),
        BucketBuilder::new(3)
            .meta(json!({ "sensor": "cellar" }))
            .measurement([("time", json!(1_700_000_000)), ("temp", json!(14.2))])
            .measurement([("time", json!(1_700_000_060)), ("temp", json!(14.2))])
            .build(),
    ]
}

/// `counts.len()` synthetic buckets with ids `1..` and the given populations.
#[must_use]
pub fn synthetic_buckets(counts: &[u32]) -> Vec<SyntheticBucket> {
    counts
        .iter()
        .zip(1..)
        .map(|(&count, n)| SyntheticBucket::new(n, count))
        .collect()
}
