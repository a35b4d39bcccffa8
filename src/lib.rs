//! # Ironsample
//!
//! **Uniform random sampling of measurements stored in time-series buckets.**
//!
//! A time-series collection stores measurements packed into buckets, and
//! buckets hold different numbers of measurements. Picking a random bucket and
//! then a random measurement inside it would favour measurements in small
//! buckets. Ironsample implements the ARHASH rejection-sampling scheme: every
//! bucket is treated as if it held `bucket_max_count` slots, an index is drawn
//! over those slots, and draws that land past the bucket's real population (or
//! on a measurement already emitted) are rejected. The accepted draws are
//! uniform over measurements and never repeat.
//!
//! ## Key Features
//!
//! - **Incremental stage** - [`SampleFromBuckets::step`] does one bounded unit of
//!   work per call and reports [`StageState`]
//! - **Pluggable collaborators** - bucket sources ([`BucketSource`]), bucket
//!   unpacking ([`BucketMaterializer`]) and index draws ([`IndexDraw`]) are traits
//! - **Columnar buckets** - [`Bucket`] and [`BucketUnpacker`] with sparse
//!   columns, a meta field and projections
//! - **Drivers** - [`Runner`] with cancellation, metrics and parallel shards
//! - **I/O** - JSON Lines bucket files, optionally compressed (feature `io-jsonl`)
//! - **Test support** - scripted sources and draws in [`testing`]
//!
//! ## Quick Start
//!
//! ```
//! use ironsample::*;
//! use ironsample::testing::weather_buckets;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = SampleConfig { seed: Some(42), ..SampleConfig::new(5, 4) };
//! let source = RandomBucketCursor::seeded(weather_buckets(), 10_000, 42);
//! let unpacker = BucketUnpacker::new(BucketSpec::default().with_meta_field("station"));
//! let mut stage = SampleFromBuckets::from_config(&config, source, unpacker)?;
//!
//! let samples = Runner::default().run_collect(&mut stage)?;
//! assert_eq!(samples.len(), 5);
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Concepts
//!
//! ### Stage
//!
//! [`SampleFromBuckets`] owns its bucket source, the set of measurement keys
//! already emitted and at most one candidate bucket between calls. Each call to
//! `step` returns one of:
//! - [`StageState::Advanced`] - a new measurement is in the [`OutputArena`]
//! - [`StageState::NeedsMoreWork`] - a draw was rejected or the source was not
//!   ready; call again
//! - [`StageState::Exhausted`] - the sample is complete
//!
//! Failures are returned as [`SampleError`] and leave the stage terminated.
//!
//! ### Configuration
//!
//! [`SampleConfig`] is plain serde data, so it can be embedded in a larger
//! JSON config or loaded with [`SampleConfig::from_json_file`].
//!
//! ## Logging
//!
//! Ironsample emits [`tracing`] events: `trace` per draw, `debug` per rejection,
//! `info` when a sample completes, `warn` for oversized buckets and stalls, and
//! `error` before any failure is returned. Install any subscriber to see them.

pub mod arena;
pub mod bucket;
pub mod bucket_id;
pub mod config;
pub mod draw;
pub mod error;
pub mod io;
pub mod key;
pub mod materializer;
pub mod metrics;
pub mod runner;
pub mod source;
pub mod stage;
pub mod stats;
pub mod testing;

// General re-exports
pub use arena::{OutputArena, OutputHandle};
pub use bucket::{Bucket, BucketSpec, BucketUnpacker, Projection};
pub use bucket_id::BucketId;
pub use config::SampleConfig;
pub use draw::{IndexDraw, UniformIndex};
pub use error::{Result, SampleError};
pub use key::{MeasurementKey, SeenSet};
pub use materializer::{BucketMaterializer, Document};
pub use metrics::MetricsCollector;
pub use runner::{Interrupt, Runner};
pub use source::{BucketSource, RandomBucketCursor, SourcePoll, VecBucketSource};
pub use stage::{SampleFromBuckets, StageState};
pub use stats::SampleStats;

// Gated re-exports
#[cfg(feature = "io-jsonl")]
pub use io::jsonl::{
    JsonlBucketSource, read_buckets_jsonl, write_buckets_jsonl, write_samples_jsonl,
};
