//! Construction-time configuration for a sampling stage.
//!
//! # Usage
//!
//! ```
//! use ironsample::config::SampleConfig;
//!
//! let config = SampleConfig {
//!     sample_size: 100,
//!     bucket_max_count: 1000,
//!     seed: Some(42),
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use crate::error::SampleError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Default upper bound on measurements per bucket.
pub const DEFAULT_BUCKET_MAX_COUNT: u32 = 1000;

/// Settings fixed for the lifetime of one stage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SampleConfig {
    /// Number of distinct measurements to produce.
    pub sample_size: u64,
    /// Collection-wide upper bound on measurements per bucket. Must be > 0.
    pub bucket_max_count: u32,
    /// Starting value of the works-since-last-advanced counter.
    pub works_since_last_advanced: u64,
    /// Keep the current bucket after a successful sample so the next step
    /// can try another index from it.
    pub retain_candidate_after_sample: bool,
    /// Log a warning once the stage has gone this many steps without
    /// producing a sample. Has no effect on the algorithm.
    pub stall_warning_threshold: Option<u64>,
    /// Seed for the index draws; OS randomness when unset.
    pub seed: Option<u64>,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            sample_size: 0,
            bucket_max_count: DEFAULT_BUCKET_MAX_COUNT,
            works_since_last_advanced: 0,
            retain_candidate_after_sample: false,
            stall_warning_threshold: None,
            seed: None,
        }
    }
}

impl SampleConfig {
    #[must_use]
    pub fn new(sample_size: u64, bucket_max_count: u32) -> Self {
        Self {
            sample_size,
            bucket_max_count,
            ..Self::default()
        }
    }

    /// Check the settings can drive a stage.
    ///
    /// # Errors
    ///
    /// Returns [`SampleError::InvalidConfig`] if `bucket_max_count` is zero.
    pub fn validate(&self) -> Result<(), SampleError> {
        if self.bucket_max_count == 0 {
            return Err(SampleError::InvalidConfig(
                "bucket_max_count must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Parse from a JSON string. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or the result fails
    /// [`validate`](Self::validate).
    pub fn from_json_str(s: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(s).context("parse sample config")?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("load config {}", path.display()))
    }
}
