//! Sample individual readings out of a bucketed weather collection.
//!
//! Demonstrates:
//! - Writing and reading a gzip-compressed bucket export
//! - Drawing buckets through a random cursor
//! - Running the sampling stage with metrics and logging
//! - Writing the sample back out as JSON Lines
//!
//! Run with: RUST_LOG=ironsample=debug cargo run --example weather_sample

use anyhow::Result;
use ironsample::testing::{BucketBuilder, TempDirPath};
use ironsample::*;
use serde_json::json;

const STATIONS: [&str; 4] = ["roof", "garden", "cellar", "pier"];

/// Buckets of very different sizes: station `i` reports `5 * (i + 1)` readings
/// per bucket, and there are six buckets per station.
fn weather_collection() -> Vec<Bucket> {
    let mut buckets = Vec::new();
    for (s, station) in STATIONS.iter().enumerate() {
        for day in 0..6u64 {
            let readings = 5 * (s as u32 + 1);
            let mut b =
                BucketBuilder::new(s as u64 * 100 + day).meta(json!({ "station": station }));
            for r in 0..readings {
                let t = 1_700_000_000 + day as i64 * 86_400 + i64::from(r) * 600;
                b = b.measurement([
                    ("time", json!(t)),
                    ("temp", json!(10.0 + f64::from(r) * 0.1 + s as f64)),
                ]);
            }
            buckets.push(b.build());
        }
    }
    buckets
}

fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    println!("Bucketed weather sampling example\n");

    let dir = TempDirPath::new()?;
    let export = dir.join("weather.jsonl.gz");
    let written = write_buckets_jsonl(&export, &weather_collection())?;
    println!("Exported {written} buckets to {}", export.display());

    let buckets = read_buckets_jsonl(&export)?;
    let config = SampleConfig {
        sample_size: 12,
        bucket_max_count: 20,
        stall_warning_threshold: Some(1_000),
        seed: Some(2024),
        ..SampleConfig::default()
    };
    let source = RandomBucketCursor::seeded(buckets, 100_000, 2024);
    let unpacker = BucketUnpacker::new(BucketSpec::default().with_meta_field("station"));
    let mut stage = SampleFromBuckets::from_config(&config, source, unpacker)?;

    let metrics = MetricsCollector::new();
    let runner = Runner {
        metrics: Some(metrics.clone()),
        ..Runner::default()
    };
    let samples = runner.run_collect(&mut stage)?;

    println!("\nSampled {} readings:", samples.len());
    for doc in &samples {
        println!("  {}", serde_json::Value::Object(doc.clone()));
    }

    let stats = stage.stats();
    println!(
        "\n{} steps, {} buckets pulled, {} discarded, {} duplicates, acceptance {:.2}",
        stats.works,
        stats.buckets_pulled,
        stats.buckets_discarded,
        stats.dups_dropped,
        stats.acceptance_rate()
    );

    let out = dir.join("sample.jsonl");
    write_samples_jsonl(&out, &samples)?;
    println!("Wrote sample to {}", out.display());

    metrics.log_summary();
    Ok(())
}
