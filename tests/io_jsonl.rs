#![cfg(feature = "io-jsonl")]

use anyhow::Result;
use ironsample::io::compression::{create_writer, open_reader};
use ironsample::testing::*;
use ironsample::{
    Bucket, BucketSource, BucketUnpacker, JsonlBucketSource, Runner, SampleConfig,
    SampleFromBuckets, SourcePoll, read_buckets_jsonl, write_buckets_jsonl, write_samples_jsonl,
};
use std::fs;
use std::io::{BufRead, Write};

fn drain(source: &mut JsonlBucketSource) -> Result<Vec<Bucket>> {
    let mut out = Vec::new();
    loop {
        match source.next() {
            SourcePoll::Ready(b) => out.push(b),
            SourcePoll::Exhausted => return Ok(out),
            SourcePoll::Failed(e) => return Err(e),
            SourcePoll::NotReady => anyhow::bail!("unexpected NotReady"),
        }
    }
}

#[test]
fn buckets_survive_a_jsonl_file() -> Result<()> {
    let file = mock_bucket_file(&weather_buckets(), "jsonl")?;
    assert_eq!(read_buckets_jsonl(file.path())?, weather_buckets());
    Ok(())
}

#[cfg(feature = "compression-gzip")]
#[test]
fn gzip_files_are_read_transparently() -> Result<()> {
    let file = mock_bucket_file(&weather_buckets(), "jsonl.gz")?;
    let raw = fs::read(file.path())?;
    assert_eq!(&raw[..2], &[0x1f, 0x8b]);
    assert_eq!(read_buckets_jsonl(file.path())?, weather_buckets());
    Ok(())
}

#[cfg(feature = "compression-zstd")]
#[test]
fn zstd_files_are_read_transparently() -> Result<()> {
    let file = mock_bucket_file(&weather_buckets(), "jsonl.zst")?;
    assert_eq!(read_buckets_jsonl(file.path())?, weather_buckets());
    Ok(())
}

#[cfg(feature = "compression-gzip")]
#[test]
fn gzip_without_suffix_is_detected_by_magic_bytes() -> Result<()> {
    let dir = TempDirPath::new()?;
    let gz = dir.join("buckets.jsonl.gz");
    write_buckets_jsonl(&gz, &weather_buckets())?;
    let renamed = dir.join("buckets.dat");
    fs::rename(&gz, &renamed)?;
    assert_eq!(read_buckets_jsonl(&renamed)?, weather_buckets());
    Ok(())
}

#[test]
fn blank_lines_are_skipped() -> Result<()> {
    let file = TempFilePath::with_extension("jsonl")?;
    let bucket = serde_json::to_string(&weather_buckets()[2])?;
    fs::write(file.path(), format!("\n{bucket}\n   \n\n{bucket}\n"))?;
    assert_eq!(read_buckets_jsonl(file.path())?.len(), 2);
    Ok(())
}

#[test]
fn malformed_line_fails_the_source_once() -> Result<()> {
    let file = TempFilePath::with_extension("jsonl")?;
    let bucket = serde_json::to_string(&weather_buckets()[0])?;
    fs::write(file.path(), format!("{bucket}\n{{ not json\n{bucket}\n"))?;

    let mut source = JsonlBucketSource::<Bucket>::open(file.path());
    assert!(source.next().is_ready());
    match source.next() {
        SourcePoll::Failed(e) => assert!(format!("{e:#}").contains("line 2"), "{e:#}"),
        other => panic!("expected Failed, got {other:?}"),
    }
    assert!(matches!(source.next(), SourcePoll::Exhausted));
    Ok(())
}

#[test]
fn missing_file_is_a_source_failure() {
    let mut source = JsonlBucketSource::<Bucket>::open("/no/such/buckets.jsonl");
    assert!(matches!(source.next(), SourcePoll::Failed(_)));
}

#[test]
fn glob_reads_matching_files_in_path_order() -> Result<()> {
    let dir = TempDirPath::new()?;
    let buckets = weather_buckets();
    write_buckets_jsonl(dir.join("day=2/buckets.jsonl"), &buckets[1..])?;
    write_buckets_jsonl(dir.join("day=1/buckets.jsonl"), &buckets[..1])?;
    fs::write(dir.join("notes.txt"), "ignored")?;

    let pattern = format!("{}/day=*/buckets.jsonl", dir.path().display());
    let mut source = JsonlBucketSource::<Bucket>::from_glob(&pattern)?;
    assert_eq!(drain(&mut source)?, buckets);
    Ok(())
}

#[test]
fn glob_with_no_matches_is_an_error() -> Result<()> {
    let dir = TempDirPath::new()?;
    let pattern = format!("{}/*.jsonl", dir.path().display());
    assert!(JsonlBucketSource::<Bucket>::from_glob(&pattern).is_err());
    Ok(())
}

#[test]
fn sample_from_file_and_write_results() -> Result<()> {
    let dir = TempDirPath::new()?;
    let input = dir.join("in.jsonl");
    // Every bucket five times in a fixed interleaving stands in for a random cursor.
    let mut stream = Vec::new();
    for _ in 0..5 {
        stream.extend(weather_buckets());
    }
    write_buckets_jsonl(&input, &stream)?;

    let config = SampleConfig {
        seed: Some(8),
        ..SampleConfig::new(2, 4)
    };
    let source = JsonlBucketSource::open(&input);
    let mut stage = SampleFromBuckets::from_config(&config, source, BucketUnpacker::default())?;
    let samples = Runner::default().run_collect(&mut stage)?;
    assert_eq!(samples.len(), 2);

    let output = dir.join("out/samples.jsonl");
    assert_eq!(write_samples_jsonl(&output, &samples)?, 2);
    let lines = fs::read_to_string(&output)?;
    assert_eq!(lines.lines().count(), 2);
    Ok(())
}

#[test]
fn writer_and_reader_agree_on_plain_text() -> Result<()> {
    let file = TempFilePath::with_extension("txt")?;
    let mut w = create_writer(file.path())?;
    w.write_all(b"one\ntwo\n")?;
    w.finish()?;
    let lines: Vec<String> = open_reader(file.path())?.lines().collect::<Result<_, _>>()?;
    assert_eq!(lines, ["one", "two"]);
    Ok(())
}

#[cfg(feature = "compression-gzip")]
#[test]
fn finished_gzip_writer_reads_back_whole() -> Result<()> {
    let file = TempFilePath::with_extension("txt.gz")?;
    let mut w = create_writer(file.path())?;
    assert_eq!(w.path(), file.path());
    w.write_all(b"one\ntwo\n")?;
    w.finish()?;
    let lines: Vec<String> = open_reader(file.path())?.lines().collect::<Result<_, _>>()?;
    assert_eq!(lines, ["one", "two"]);
    Ok(())
}

#[cfg(feature = "compression-zstd")]
#[test]
fn finished_zstd_writer_reads_back_whole() -> Result<()> {
    let file = TempFilePath::with_extension("txt.zst")?;
    let mut w = create_writer(file.path())?;
    w.write_all(b"one\ntwo\n")?;
    w.finish()?;
    let raw = fs::read(file.path())?;
    assert_eq!(&raw[..4], &[0x28, 0xb5, 0x2f, 0xfd]);
    let lines: Vec<String> = open_reader(file.path())?.lines().collect::<Result<_, _>>()?;
    assert_eq!(lines, ["one", "two"]);
    Ok(())
}
