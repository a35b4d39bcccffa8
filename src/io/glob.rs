//! Resolving bucket-file patterns.
//!
//! ```no_run
//! use ironsample::io::glob::expand_glob;
//!
//! // Every daily export of one collection
//! let files = expand_glob("exports/weather/day=*/buckets.jsonl.gz")?;
//! # use anyhow::Error; Ok::<(), Error>(())
//! ```

use anyhow::{Context, Result, bail};
use glob::glob;
use std::path::PathBuf;

/// Expand `pattern` into the matching regular files, sorted.
///
/// Zero matches is not an error here; see [`expand_glob_required`].
///
/// # Errors
///
/// Returns an error if the pattern is invalid or a directory cannot be read.
pub fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>> {
    let paths = glob(pattern).with_context(|| format!("invalid glob pattern: {pattern}"))?;

    let mut result = Vec::new();
    for entry in paths {
        let path =
            entry.with_context(|| format!("error reading glob entry for pattern: {pattern}"))?;
        if path.is_file() {
            result.push(path);
        }
    }
    result.sort();
    Ok(result)
}

/// Like [`expand_glob`], but zero matches is an error.
///
/// # Errors
///
/// Returns an error if the pattern is invalid or matches no files.
pub fn expand_glob_required(pattern: &str) -> Result<Vec<PathBuf>> {
    let files = expand_glob(pattern)?;
    if files.is_empty() {
        bail!("no bucket files found matching pattern: {pattern}");
    }
    Ok(files)
}
