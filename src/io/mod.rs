//! File-backed bucket sources and sample sinks.

pub mod compression;
#[cfg(feature = "io-jsonl")]
pub mod glob;
#[cfg(feature = "io-jsonl")]
pub mod jsonl;
