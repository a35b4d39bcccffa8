use anyhow::Result;
use ironsample::testing::*;
use ironsample::{
    BucketUnpacker, Interrupt, MetricsCollector, RandomBucketCursor, Runner, SampleConfig,
    SampleError, SampleFromBuckets, UniformIndex,
};

fn seeded_stage(
    n: u64,
    seed: u64,
) -> Result<SampleFromBuckets<RandomBucketCursor<ironsample::Bucket>, BucketUnpacker>> {
    let config = SampleConfig {
        seed: Some(seed),
        ..SampleConfig::new(n, 4)
    };
    let source = RandomBucketCursor::seeded(weather_buckets(), 50_000, seed);
    Ok(SampleFromBuckets::from_config(&config, source, BucketUnpacker::default())?)
}

#[test]
fn run_collect_returns_exactly_sample_size() -> Result<()> {
    let mut stage = seeded_stage(6, 11)?;
    let samples = Runner::default().run_collect(&mut stage)?;
    assert_eq!(samples.len(), 6);
    assert_no_duplicates(&samples);
    assert!(stage.is_exhausted());
    Ok(())
}

#[test]
fn same_seeds_give_same_samples() -> Result<()> {
    let a = Runner::default().run_collect(&mut seeded_stage(5, 21)?)?;
    let b = Runner::default().run_collect(&mut seeded_stage(5, 21)?)?;
    assert_eq!(a, b);
    Ok(())
}

#[test]
fn triggered_interrupt_stops_before_the_next_step() -> Result<()> {
    let interrupt = Interrupt::new();
    let runner = Runner {
        interrupt: Some(interrupt.clone()),
        ..Runner::default()
    };
    let mut stage = seeded_stage(6, 1)?;
    let mut samples = runner.samples(&mut stage);

    assert!(samples.next().is_some_and(|r| r.is_ok()));
    interrupt.trigger();
    assert!(matches!(samples.next(), Some(Err(SampleError::Interrupted))));
    assert!(samples.next().is_none());
    drop(samples);
    assert_eq!(stage.n_sampled_so_far(), 1);
    Ok(())
}

#[test]
fn samples_iterator_ends_after_completion() -> Result<()> {
    let mut stage = seeded_stage(3, 5)?;
    let runner = Runner::default();
    let docs = runner.samples(&mut stage).collect::<Result<Vec<_>, _>>()?;
    assert_eq!(docs.len(), 3);
    Ok(())
}

#[test]
fn samples_iterator_yields_the_error_once() -> Result<()> {
    let bucket = SyntheticBucket::new(1, 1);
    let mut stage = SampleFromBuckets::new(
        &SampleConfig::new(2, 1),
        ScriptedSource::new().ready(bucket),
        SyntheticMaterializer,
        ScriptedDraws::new([0]),
    )?;
    let runner = Runner::default();
    let results: Vec<_> = runner.samples(&mut stage).collect();
    assert_eq!(results.len(), 2);
    assert!(results[0].is_ok());
    assert!(matches!(
        results[1],
        Err(SampleError::PrematureExhaustion { .. })
    ));
    Ok(())
}

#[test]
fn metrics_are_published_even_on_failure() -> Result<()> {
    let metrics = MetricsCollector::new();
    let runner = Runner {
        metrics: Some(metrics.clone()),
        ..Runner::default()
    };
    let bucket = SyntheticBucket::new(1, 2);
    let mut stage = SampleFromBuckets::new(
        &SampleConfig::new(3, 4),
        ScriptedSource::new().repeat(&bucket, 3),
        SyntheticMaterializer,
        ScriptedDraws::new([0, 3, 1]),
    )?;

    let err = runner.run_collect(&mut stage).unwrap_err();
    assert!(err.is_premature_exhaustion());
    assert_eq!(metrics.counter("samples_produced"), Some(2));
    assert_eq!(metrics.counter("buckets_discarded"), Some(1));
    assert_eq!(metrics.counter("buckets_pulled"), Some(3));
    assert!(metrics.elapsed().is_some());
    Ok(())
}

#[test]
fn lazy_samples_publish_metrics_when_done() -> Result<()> {
    let metrics = MetricsCollector::new();
    let runner = Runner {
        metrics: Some(metrics.clone()),
        ..Runner::default()
    };
    let mut stage = seeded_stage(3, 9)?;
    let docs = runner.samples(&mut stage).collect::<Result<Vec<_>, _>>()?;

    assert_eq!(docs.len(), 3);
    assert_eq!(metrics.counter("samples_produced"), Some(3));
    assert!(metrics.elapsed().is_some());
    Ok(())
}

#[test]
fn lazy_samples_publish_metrics_on_failure() -> Result<()> {
    let metrics = MetricsCollector::new();
    let runner = Runner {
        metrics: Some(metrics.clone()),
        ..Runner::default()
    };
    let mut stage = SampleFromBuckets::new(
        &SampleConfig::new(2, 1),
        ScriptedSource::new().ready(SyntheticBucket::new(1, 1)),
        SyntheticMaterializer,
        ScriptedDraws::new([0]),
    )?;
    let results: Vec<_> = runner.samples(&mut stage).collect();

    assert!(results[1].is_err());
    assert_eq!(metrics.counter("samples_produced"), Some(1));
    assert_eq!(metrics.counter("buckets_pulled"), Some(1));
    assert!(metrics.elapsed().is_some());
    Ok(())
}

#[cfg(feature = "parallel")]
#[test]
fn parallel_shards_concatenate_in_input_order() -> Result<()> {
    let shards: Vec<_> = (0..4u64)
        .map(|shard| {
            let buckets = synthetic_buckets(&[3, 1, 2]);
            let source = RandomBucketCursor::seeded(buckets, 10_000, shard);
            SampleFromBuckets::new(
                &SampleConfig::new(4, 3),
                source,
                SyntheticMaterializer,
                UniformIndex::seeded(shard + 100),
            )
        })
        .collect::<Result<_, _>>()?;
    let metrics = MetricsCollector::new();
    let runner = Runner {
        metrics: Some(metrics.clone()),
        threads: Some(2),
        ..Runner::default()
    };

    let docs = runner.run_collect_par(shards)?;
    assert_eq!(docs.len(), 16);
    for shard in docs.chunks(4) {
        assert_no_duplicates(shard);
    }
    assert_eq!(metrics.counter("samples_produced"), Some(16));
    Ok(())
}

#[cfg(feature = "parallel")]
#[test]
fn parallel_run_reports_first_failure() -> Result<()> {
    let ok = SampleFromBuckets::new(
        &SampleConfig::new(1, 1),
        ScriptedSource::new().ready(SyntheticBucket::new(1, 1)),
        SyntheticMaterializer,
        ScriptedDraws::new([0]),
    )?;
    let failing = SampleFromBuckets::new(
        &SampleConfig::new(1, 1),
        ScriptedSource::new().fail("shard offline"),
        SyntheticMaterializer,
        ScriptedDraws::new([]),
    )?;
    let err = Runner::default()
        .run_collect_par(vec![ok, failing])
        .unwrap_err();
    assert_eq!(err.to_string(), "shard offline");
    Ok(())
}
