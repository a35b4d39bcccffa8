//! Test support for code that embeds a sampling stage.
//!
//! - **Scripted collaborators**: [`ScriptedSource`], [`ScriptedDraws`] and
//!   [`CountingMaterializer`] make every step of a stage reproducible.
//! - **Synthetic buckets**: [`SyntheticBucket`] + [`SyntheticMaterializer`]
//!   stand in for real buckets when only ids and counts matter.
//! - **Builders and fixtures**: [`BucketBuilder`], [`weather_buckets`].
//! - **Assertions**: [`assert_no_duplicates`], [`assert_each_from_buckets`].
//!
//! # Quick Start
//!
//! ```
//! use ironsample::arena::OutputArena;
//! use ironsample::config::SampleConfig;
//! use ironsample::stage::{SampleFromBuckets, StageState};
//! use ironsample::testing::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let bucket = SyntheticBucket::new(1, 2);
//! let source = ScriptedSource::new().ready(bucket).ready(bucket);
//! let draws = ScriptedDraws::new([4, 1]);
//! let config = SampleConfig::new(1, 5);
//! let mut stage = SampleFromBuckets::new(&config, source, SyntheticMaterializer, draws)?;
//! let mut arena = OutputArena::new();
//!
//! assert_eq!(stage.step(&mut arena)?, StageState::NeedsMoreWork);
//! assert!(matches!(stage.step(&mut arena)?, StageState::Advanced(_)));
//! assert_eq!(stage.step(&mut arena)?, StageState::Exhausted);
//! # Ok(())
//! # }
//! ```

pub mod assertions;
pub mod builders;
pub mod fixtures;
pub mod scripted;

#[cfg(feature = "io-jsonl")]
pub mod mock_io;

pub use assertions::*;
pub use builders::*;
pub use fixtures::*;
pub use scripted::*;

#[cfg(feature = "io-jsonl")]
pub use mock_io::*;
