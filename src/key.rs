//! Measurement identity and the seen-set used for de-duplication.
//!
//! A sampled measurement is identified by the bucket it came from plus its
//! zero-based position inside that bucket. The [`SeenSet`] records every key
//! the stage has emitted so the same measurement is never returned twice.
//!
//! Hashing folds the bucket id's two integer halves and the index together with
//! XOR after mixing each one independently. Lookups always confirm with full
//! key equality, so a fingerprint collision can only cost an extra comparison,
//! never a false "already seen".

use crate::bucket_id::BucketId;
use std::collections::HashSet;
use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash, Hasher};

/// Identity of one sampled measurement.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct MeasurementKey {
    pub bucket_id: BucketId,
    pub index: u32,
}

impl MeasurementKey {
    #[must_use]
    pub const fn new(bucket_id: BucketId, index: u32) -> Self {
        Self { bucket_id, index }
    }

    /// 64-bit fingerprint: `mix(high) ^ mix(low) ^ mix(index)`.
    #[must_use]
    pub fn fingerprint(&self) -> u64 {
        mix64(self.bucket_id.high_u64())
            ^ mix64(u64::from(self.bucket_id.low_u32()))
            ^ mix64(u64::from(self.index))
    }
}

impl Hash for MeasurementKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.fingerprint());
    }
}

/// SplitMix64 finalizer.
#[inline]
const fn mix64(x: u64) -> u64 {
    let mut z = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Set of measurement keys already emitted by a stage.
///
/// Grows monotonically for the lifetime of one sampling pass.
#[derive(Clone, Debug, Default)]
pub struct SeenSet<S = RandomState> {
    keys: HashSet<MeasurementKey, S>,
}

impl SeenSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            keys: HashSet::with_capacity(capacity),
        }
    }
}

impl<S: BuildHasher> SeenSet<S> {
    /// Use a custom hasher builder.
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            keys: HashSet::with_hasher(hasher),
        }
    }

    /// Record `key`. Returns `true` if it was not present before.
    pub fn insert(&mut self, key: MeasurementKey) -> bool {
        self.keys.insert(key)
    }

    #[must_use]
    pub fn contains(&self, key: &MeasurementKey) -> bool {
        self.keys.contains(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MeasurementKey> {
        self.keys.iter()
    }
}
