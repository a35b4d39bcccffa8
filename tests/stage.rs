use anyhow::Result;
use ironsample::testing::*;
use ironsample::{
    BucketMaterializer, BucketUnpacker, Document, OutputArena, SampleConfig, SampleError,
    SampleFromBuckets, StageState,
};
use serde_json::json;

fn advanced(state: StageState) -> ironsample::OutputHandle {
    match state {
        StageState::Advanced(h) => h,
        other => panic!("expected Advanced, got {other:?}"),
    }
}

fn doc_of(arena: &mut OutputArena, state: StageState) -> Document {
    arena.take(advanced(state)).expect("handle refers to a document")
}

#[test]
fn distinct_buckets_each_yield_index_zero() -> Result<()> {
    let buckets = synthetic_buckets(&[5, 5, 5]);
    let source = ScriptedSource::new().ready_all(buckets.clone());
    let materializer = CountingMaterializer::new(SyntheticMaterializer);
    let calls = materializer.call_counter();
    let mut stage = SampleFromBuckets::new(
        &SampleConfig::new(3, 5),
        source,
        materializer,
        ScriptedDraws::new([0, 0, 0]),
    )?;
    let mut arena = OutputArena::new();

    for bucket in &buckets {
        let state = stage.step(&mut arena)?;
        let doc = doc_of(&mut arena, state);
        assert_eq!(doc, SyntheticMaterializer.materialize(bucket, 0)?);
    }
    assert!(stage.is_exhausted());
    for _ in 0..3 {
        assert_eq!(stage.step(&mut arena)?, StageState::Exhausted);
    }
    assert!(stage.is_exhausted());
    assert_eq!(calls.get(), 3);
    assert_eq!(stage.stats().buckets_discarded, 0);
    assert_eq!(stage.stats().dups_dropped, 0);
    Ok(())
}

#[test]
fn small_bucket_rejects_out_of_range_then_duplicate() -> Result<()> {
    let bucket = SyntheticBucket::new(9, 2);
    let source = ScriptedSource::new().repeat(&bucket, 5);
    let polls = source.poll_counter();
    let mut stage = SampleFromBuckets::new(
        &SampleConfig::new(2, 5),
        source,
        SyntheticMaterializer,
        ScriptedDraws::new([4, 3, 1, 1, 0]),
    )?;
    let mut arena = OutputArena::new();

    assert_eq!(stage.step(&mut arena)?, StageState::NeedsMoreWork);
    assert_eq!(stage.step(&mut arena)?, StageState::NeedsMoreWork);
    let state = stage.step(&mut arena)?;
    let first = doc_of(&mut arena, state);
    assert_eq!(first["index"], json!(1));
    assert_eq!(stage.step(&mut arena)?, StageState::NeedsMoreWork);
    assert!(stage.holds_candidate(), "duplicate draw keeps the bucket");
    let state = stage.step(&mut arena)?;
    let second = doc_of(&mut arena, state);
    assert_eq!(second["index"], json!(0));

    // Two out-of-range discards and one release after the first sample; the
    // duplicate reused the bucket it already held.
    assert_eq!(polls.get(), 4);
    assert_eq!(stage.stats().buckets_discarded, 2);
    assert_eq!(stage.stats().dups_dropped, 1);
    assert_eq!(stage.step(&mut arena)?, StageState::Exhausted);
    Ok(())
}

#[test]
fn works_since_last_advanced_counts_rejections_and_resets() -> Result<()> {
    let bucket = SyntheticBucket::new(1, 2);
    let config = SampleConfig {
        works_since_last_advanced: 7,
        ..SampleConfig::new(2, 5)
    };
    let mut stage = SampleFromBuckets::new(
        &config,
        ScriptedSource::new().repeat(&bucket, 3),
        SyntheticMaterializer,
        ScriptedDraws::new([4, 0, 0, 1]),
    )?;
    let mut arena = OutputArena::new();

    assert_eq!(stage.works_since_last_advanced(), 7);
    stage.step(&mut arena)?;
    assert_eq!(stage.works_since_last_advanced(), 8);
    advanced(stage.step(&mut arena)?);
    assert_eq!(stage.works_since_last_advanced(), 0);
    assert_eq!(stage.step(&mut arena)?, StageState::NeedsMoreWork);
    assert_eq!(stage.works_since_last_advanced(), 1);
    advanced(stage.step(&mut arena)?);
    assert_eq!(stage.works_since_last_advanced(), 0);
    Ok(())
}

#[test]
fn full_buckets_are_never_rejected_out_of_range() -> Result<()> {
    let buckets = synthetic_buckets(&[4, 4, 4, 4]);
    let mut stage = SampleFromBuckets::new(
        &SampleConfig::new(4, 4),
        ScriptedSource::new().ready_all(buckets),
        SyntheticMaterializer,
        ScriptedDraws::new([3, 2, 1, 0]),
    )?;
    let mut arena = OutputArena::new();
    for _ in 0..4 {
        advanced(stage.step(&mut arena)?);
    }
    assert_eq!(stage.stats().buckets_discarded, 0);
    assert_eq!(stage.stats().acceptance_rate(), 1.0);
    Ok(())
}

#[test]
fn out_of_range_draws_never_reach_the_materializer() -> Result<()> {
    let bucket = SyntheticBucket::new(1, 1);
    let materializer = CountingMaterializer::new(SyntheticMaterializer);
    let calls = materializer.call_counter();
    let mut stage = SampleFromBuckets::new(
        &SampleConfig::new(1, 8),
        ScriptedSource::new().repeat(&bucket, 8),
        materializer,
        ScriptedDraws::new([7, 6, 5, 4, 3, 2, 1, 0]),
    )?;
    let mut arena = OutputArena::new();
    for _ in 0..7 {
        assert_eq!(stage.step(&mut arena)?, StageState::NeedsMoreWork);
    }
    assert_eq!(calls.get(), 0);
    advanced(stage.step(&mut arena)?);
    assert_eq!(calls.get(), 1);
    Ok(())
}

#[test]
fn zero_sample_size_is_complete_before_any_work() -> Result<()> {
    let source = ScriptedSource::<SyntheticBucket>::new();
    let polls = source.poll_counter();
    let mut stage = SampleFromBuckets::new(
        &SampleConfig::new(0, 5),
        source,
        SyntheticMaterializer,
        ScriptedDraws::default(),
    )?;
    let mut arena = OutputArena::new();
    assert!(stage.is_exhausted());
    assert_eq!(stage.step(&mut arena)?, StageState::Exhausted);
    assert_eq!(stage.step(&mut arena)?, StageState::Exhausted);
    assert_eq!(polls.get(), 0);
    Ok(())
}

#[test]
fn exhausted_stage_stops_polling_the_source() -> Result<()> {
    let bucket = SyntheticBucket::new(1, 3);
    let source = ScriptedSource::new().repeat(&bucket, 10);
    let polls = source.poll_counter();
    let mut stage = SampleFromBuckets::new(
        &SampleConfig::new(1, 3),
        source,
        SyntheticMaterializer,
        ScriptedDraws::new([2]),
    )?;
    let mut arena = OutputArena::new();
    advanced(stage.step(&mut arena)?);
    for _ in 0..5 {
        assert_eq!(stage.step(&mut arena)?, StageState::Exhausted);
    }
    assert_eq!(polls.get(), 1);
    Ok(())
}

#[test]
fn not_ready_source_asks_to_be_called_again() -> Result<()> {
    let bucket = SyntheticBucket::new(1, 2);
    let mut stage = SampleFromBuckets::new(
        &SampleConfig::new(1, 2),
        ScriptedSource::new().not_ready().not_ready().ready(bucket),
        SyntheticMaterializer,
        ScriptedDraws::new([1]),
    )?;
    let mut arena = OutputArena::new();
    assert_eq!(stage.step(&mut arena)?, StageState::NeedsMoreWork);
    assert_eq!(stage.step(&mut arena)?, StageState::NeedsMoreWork);
    advanced(stage.step(&mut arena)?);
    assert_eq!(stage.stats().not_ready, 2);
    Ok(())
}

#[test]
fn source_running_dry_is_premature_exhaustion() -> Result<()> {
    let bucket = SyntheticBucket::new(1, 2);
    let mut stage = SampleFromBuckets::new(
        &SampleConfig::new(3, 2),
        ScriptedSource::new().repeat(&bucket, 2),
        SyntheticMaterializer,
        ScriptedDraws::new([0, 1]),
    )?;
    let mut arena = OutputArena::new();
    advanced(stage.step(&mut arena)?);
    advanced(stage.step(&mut arena)?);

    let err = stage.step(&mut arena).unwrap_err();
    assert!(err.is_premature_exhaustion(), "got {err}");
    assert!(matches!(
        err,
        SampleError::PrematureExhaustion {
            requested: 3,
            produced: 2
        }
    ));
    assert!(stage.is_failed());
    assert!(!stage.is_exhausted());
    assert!(matches!(stage.step(&mut arena), Err(SampleError::Terminated)));
    Ok(())
}

#[test]
fn upstream_failure_is_passed_through_unchanged() -> Result<()> {
    let mut stage = SampleFromBuckets::new(
        &SampleConfig::new(1, 2),
        ScriptedSource::<SyntheticBucket>::new().fail("disk on fire"),
        SyntheticMaterializer,
        ScriptedDraws::default(),
    )?;
    let mut arena = OutputArena::new();
    let err = stage.step(&mut arena).unwrap_err();
    assert!(matches!(err, SampleError::Upstream(_)));
    assert_eq!(err.to_string(), "disk on fire");
    assert!(matches!(stage.step(&mut arena), Err(SampleError::Terminated)));
    Ok(())
}

#[test]
fn describe_failure_terminates_the_stage() -> Result<()> {
    // No control.count and no time column: the count cannot be determined.
    let broken = BucketBuilder::new(1)
        .measurement([("temp", json!(1.0))])
        .without_count()
        .build();
    let mut stage = SampleFromBuckets::new(
        &SampleConfig::new(1, 4),
        ScriptedSource::new().ready(broken),
        BucketUnpacker::default(),
        ScriptedDraws::default(),
    )?;
    let mut arena = OutputArena::new();
    assert!(matches!(
        stage.step(&mut arena),
        Err(SampleError::Describe { .. })
    ));
    assert!(stage.is_failed());
    Ok(())
}

#[test]
fn fully_sampled_bucket_is_released_after_duplicate() -> Result<()> {
    let single = SyntheticBucket::new(1, 1);
    let other = SyntheticBucket::new(2, 3);
    let mut stage = SampleFromBuckets::new(
        &SampleConfig::new(2, 3),
        ScriptedSource::new().ready(single).ready(single).ready(other),
        SyntheticMaterializer,
        ScriptedDraws::new([0, 0, 2]),
    )?;
    let mut arena = OutputArena::new();
    advanced(stage.step(&mut arena)?);
    assert_eq!(stage.step(&mut arena)?, StageState::NeedsMoreWork);
    assert!(!stage.holds_candidate());
    let state = stage.step(&mut arena)?;
    let doc = doc_of(&mut arena, state);
    assert_eq!(doc, SyntheticMaterializer.materialize(&other, 2)?);
    Ok(())
}

#[test]
fn retained_candidate_is_reused_after_sampling() -> Result<()> {
    let bucket = SyntheticBucket::new(1, 3);
    let source = ScriptedSource::new().ready(bucket);
    let polls = source.poll_counter();
    let config = SampleConfig {
        retain_candidate_after_sample: true,
        ..SampleConfig::new(3, 3)
    };
    let draws = ScriptedDraws::new([2, 0, 1]);
    let mut stage = SampleFromBuckets::new(&config, source, SyntheticMaterializer, draws)?;
    let mut arena = OutputArena::new();
    for _ in 0..3 {
        advanced(stage.step(&mut arena)?);
    }
    assert_eq!(polls.get(), 1);
    assert_eq!(stage.step(&mut arena)?, StageState::Exhausted);
    assert!(!stage.holds_candidate());
    Ok(())
}

#[test]
fn oversized_buckets_are_counted() -> Result<()> {
    let big = SyntheticBucket::new(1, 10);
    let mut stage = SampleFromBuckets::new(
        &SampleConfig::new(1, 4),
        ScriptedSource::new().ready(big),
        SyntheticMaterializer,
        ScriptedDraws::new([3]),
    )?;
    let mut arena = OutputArena::new();
    advanced(stage.step(&mut arena)?);
    assert_eq!(stage.stats().oversized_buckets, 1);
    Ok(())
}

#[test]
fn zero_bucket_max_count_is_rejected() {
    let result = SampleFromBuckets::new(
        &SampleConfig::new(1, 0),
        ScriptedSource::<SyntheticBucket>::new(),
        SyntheticMaterializer,
        ScriptedDraws::default(),
    );
    assert!(matches!(result, Err(SampleError::InvalidConfig(_))));
}

#[test]
fn columnar_samples_come_from_the_buckets() -> Result<()> {
    let buckets = weather_buckets();
    let unpacker =
        BucketUnpacker::new(ironsample::BucketSpec::default().with_meta_field("station"));
    let config = SampleConfig {
        seed: Some(3),
        ..SampleConfig::new(9, 4)
    };
    let source = ironsample::RandomBucketCursor::seeded(buckets.clone(), 100_000, 3);
    let mut stage = SampleFromBuckets::from_config(&config, source, unpacker.clone())?;
    let samples = ironsample::Runner::default().run_collect(&mut stage)?;

    assert_eq!(samples.len(), 9);
    assert_no_duplicates(&samples);
    assert_each_from_buckets(&samples, &buckets, &unpacker);
    assert_eq!(stage.seen().len(), 9);
    assert_distinct_keys(stage.seen().iter().copied());
    Ok(())
}
