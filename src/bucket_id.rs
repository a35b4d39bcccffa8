//! 96-bit bucket identifiers.
//!
//! A [`BucketId`] is twelve bytes: a 4-byte big-endian creation timestamp
//! (seconds since the Unix epoch) followed by an 8-byte unique suffix. On the
//! wire and in JSON it is a 24-character lowercase hex string.
//!
//! Ids are small, `Copy`, and hashable, so they can be used directly inside
//! [`MeasurementKey`](crate::key::MeasurementKey)s.

use anyhow::{Result, anyhow, bail};
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Globally unique identifier of one bucket.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct BucketId([u8; 12]);

impl BucketId {
    /// Number of bytes in an id.
    pub const LEN: usize = 12;

    #[must_use]
    pub const fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    /// Build an id from a timestamp prefix and a unique suffix.
    #[must_use]
    pub fn from_parts(timestamp_secs: u32, suffix: u64) -> Self {
        let mut bytes = [0u8; 12];
        bytes[..4].copy_from_slice(&timestamp_secs.to_be_bytes());
        bytes[4..].copy_from_slice(&suffix.to_be_bytes());
        Self(bytes)
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 12] {
        &self.0
    }

    /// Creation time encoded in the first four bytes.
    #[must_use]
    pub fn timestamp_secs(&self) -> u32 {
        u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
    }

    /// Bytes `0..8` read as a native-endian `u64`.
    ///
    /// Together with [`low_u32`](Self::low_u32) this covers all twelve bytes;
    /// the pair feeds the seen-set fingerprint.
    #[must_use]
    pub fn high_u64(&self) -> u64 {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&self.0[..8]);
        u64::from_ne_bytes(buf)
    }

    /// Bytes `8..12` read as a native-endian `u32`.
    #[must_use]
    pub fn low_u32(&self) -> u32 {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(&self.0[8..]);
        u32::from_ne_bytes(buf)
    }

    /// Parse a 24-character hex string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string has the wrong length or contains a
    /// non-hex character.
    pub fn parse_hex(s: &str) -> Result<Self> {
        if s.len() != Self::LEN * 2 {
            bail!("bucket id must be {} hex characters, got {}", Self::LEN * 2, s.len());
        }
        let mut bytes = [0u8; 12];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|e| anyhow!("invalid hex in bucket id {s:?}: {e}"))?;
        Ok(Self(bytes))
    }

    /// Lowercase hex rendering.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for BucketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for BucketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BucketId({self})")
    }
}

impl FromStr for BucketId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_hex(s)
    }
}

impl From<[u8; 12]> for BucketId {
    fn from(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }
}

impl Serialize for BucketId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for BucketId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct HexVisitor;

        impl Visitor<'_> for HexVisitor {
            type Value = BucketId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a 24-character hex bucket id")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<BucketId, E> {
                BucketId::parse_hex(v).map_err(E::custom)
            }
        }

        deserializer.deserialize_str(HexVisitor)
    }
}
