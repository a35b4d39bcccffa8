//! Temporary bucket files for I/O tests.

use crate::bucket::Bucket;
use crate::io::jsonl::write_buckets_jsonl;
use anyhow::Result;
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempDir};

/// A temporary file that is deleted when dropped.
pub struct TempFilePath {
    _file: NamedTempFile,
    path: PathBuf,
}

impl TempFilePath {
    /// # Errors
    ///
    /// Returns an error if the temporary file cannot be created.
    pub fn new() -> std::io::Result<Self> {
        Self::with_suffix("")
    }

    /// Create a temporary file whose name ends in `.{extension}`, so that
    /// extension-based codec detection applies.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary file cannot be created.
    pub fn with_extension(extension: &str) -> std::io::Result<Self> {
        Self::with_suffix(&format!(".{extension}"))
    }

    fn with_suffix(suffix: &str) -> std::io::Result<Self> {
        let file = tempfile::Builder::new().suffix(suffix).tempfile()?;
        let path = file.path().to_path_buf();
        Ok(Self { _file: file, path })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// A temporary directory that is deleted, with its contents, when dropped.
pub struct TempDirPath {
    dir: TempDir,
}

impl TempDirPath {
    /// # Errors
    ///
    /// Returns an error if the temporary directory cannot be created.
    pub fn new() -> std::io::Result<Self> {
        Ok(Self { dir: TempDir::new()? })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of `name` inside the directory. Nothing is created.
    #[must_use]
    pub fn join(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

/// Write `buckets` to a fresh temporary `.{extension}` file as JSON Lines.
///
/// Use `"jsonl"` for plain text, or `"jsonl.gz"` / `"jsonl.zst"` for a
/// compressed file.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
///
/// # Example
///
/// ```
/// use ironsample::io::jsonl::read_buckets_jsonl;
/// use ironsample::testing::{mock_bucket_file, weather_buckets};
///
/// # fn main() -> anyhow::Result<()> {
/// let file = mock_bucket_file(&weather_buckets(), "jsonl")?;
/// assert_eq!(read_buckets_jsonl(file.path())?, weather_buckets());
/// # Ok(())
/// # }
/// ```
pub fn mock_bucket_file(buckets: &[Bucket], extension: &str) -> Result<TempFilePath> {
    let file = TempFilePath::with_extension(extension)?;
    write_buckets_jsonl(file.path(), buckets)?;
    Ok(file)
}
