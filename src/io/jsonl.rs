//! JSON Lines bucket files.
//!
//! - [`JsonlBucketSource`] streams buckets from one or more `.jsonl` files,
//!   one document per poll, so a large export is never loaded whole.
//! - [`read_buckets_jsonl`] / [`write_buckets_jsonl`] load and store whole files.
//! - [`write_samples_jsonl`] writes sampled measurements out.
//!
//! Empty or whitespace-only lines are skipped. Compressed files are handled
//! transparently (see [`compression`](crate::io::compression)).

use crate::bucket::Bucket;
use crate::io::compression::{create_writer, open_reader};
use crate::io::glob::expand_glob_required;
use crate::materializer::Document;
use crate::source::{BucketSource, SourcePoll};
use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::VecDeque;
use std::fs::create_dir_all;
use std::io::{BufRead, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

struct OpenFile {
    path: PathBuf,
    reader: Box<dyn BufRead>,
    line_no: usize,
}

/// Streams buckets out of JSON Lines files in file order, then line order.
///
/// The files should already be in random order (for example, an export
/// taken through a random cursor). Decode and I/O failures are reported as
/// [`SourcePoll::Failed`]; the source reports `Exhausted` afterwards.
pub struct JsonlBucketSource<T = Bucket> {
    pending: VecDeque<PathBuf>,
    current: Option<OpenFile>,
    buf: String,
    _m: PhantomData<T>,
}

impl<T: DeserializeOwned> JsonlBucketSource<T> {
    /// Read the given files in order.
    pub fn from_paths<P: Into<PathBuf>>(paths: impl IntoIterator<Item = P>) -> Self {
        Self {
            pending: paths.into_iter().map(Into::into).collect(),
            current: None,
            buf: String::new(),
            _m: PhantomData,
        }
    }

    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::from_paths([path.into()])
    }

    /// Read every file matching `pattern`, in sorted path order.
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern is invalid or matches nothing.
    pub fn from_glob(pattern: &str) -> Result<Self> {
        Ok(Self::from_paths(expand_glob_required(pattern)?))
    }

    fn fail(&mut self, err: anyhow::Error) -> SourcePoll<T> {
        self.pending.clear();
        self.current = None;
        SourcePoll::Failed(err)
    }

    fn read_next(&mut self) -> Result<Option<T>> {
        loop {
            if self.current.is_none() {
                let Some(path) = self.pending.pop_front() else {
                    return Ok(None);
                };
                let reader = open_reader(&path)?;
                tracing::debug!(path = %path.display(), "reading bucket file");
                self.current = Some(OpenFile {
                    path,
                    reader,
                    line_no: 0,
                });
            }
            let Some(file) = self.current.as_mut() else {
                continue;
            };

            self.buf.clear();
            file.line_no += 1;
            let read = file.reader.read_line(&mut self.buf).with_context(|| {
                format!("read line {} in {}", file.line_no, file.path.display())
            })?;
            if read == 0 {
                self.current = None;
                continue;
            }
            let line = self.buf.trim();
            if line.is_empty() {
                continue;
            }
            let value = serde_json::from_str(line).with_context(|| {
                format!("parse bucket on line {} in {}", file.line_no, file.path.display())
            })?;
            return Ok(Some(value));
        }
    }
}

impl<T: DeserializeOwned> BucketSource for JsonlBucketSource<T> {
    type Bucket = T;

    fn next(&mut self) -> SourcePoll<T> {
        match self.read_next() {
            Ok(Some(bucket)) => SourcePoll::Ready(bucket),
            Ok(None) => SourcePoll::Exhausted,
            Err(e) => self.fail(e),
        }
    }
}

/// Load every bucket in a JSON Lines file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or a line fails to decode.
pub fn read_buckets_jsonl(path: impl AsRef<Path>) -> Result<Vec<Bucket>> {
    let mut source = JsonlBucketSource::<Bucket>::open(path.as_ref());
    let mut out = Vec::new();
    loop {
        match source.next() {
            SourcePoll::Ready(b) => out.push(b),
            SourcePoll::Exhausted => return Ok(out),
            SourcePoll::Failed(e) => return Err(e),
            SourcePoll::NotReady => return Err(anyhow!("file source reported NotReady")),
        }
    }
}

/// Write buckets as JSON Lines, creating parent directories.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
pub fn write_buckets_jsonl(path: impl AsRef<Path>, buckets: &[Bucket]) -> Result<usize> {
    write_jsonl(path.as_ref(), buckets)
}

/// Write sampled measurements as JSON Lines, creating parent directories.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
pub fn write_samples_jsonl(path: impl AsRef<Path>, samples: &[Document]) -> Result<usize> {
    write_jsonl(path.as_ref(), samples)
}

fn write_jsonl<T: Serialize>(path: &Path, items: &[T]) -> Result<usize> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        create_dir_all(parent).with_context(|| format!("mkdir -p {}", parent.display()))?;
    }
    let mut w = create_writer(path)?;
    for (i, item) in items.iter().enumerate() {
        serde_json::to_writer(&mut w, item)
            .with_context(|| format!("serialize item #{i} to {}", path.display()))?;
        w.write_all(b"\n")?;
    }
    w.finish()?;
    Ok(items.len())
}
