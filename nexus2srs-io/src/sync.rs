//! Batch conversion of many files, one pipeline per worker thread.

use crate::convert::{nxs2dat, resolve_destination, ConversionSummary, ConvertOptions};
use crate::Result;
use log::{debug, info, warn};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// File extension of NeXus scan files.
pub const NEXUS_EXTENSION: &str = "nxs";

/// Options for converting a directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncOptions {
    /// Output directory, relative to the scanned directory unless absolute (default: `spool`).
    pub spool_dir: PathBuf,
    /// Convert even when the output is newer than its source.
    pub force: bool,
    /// Worker threads; `None` uses the global rayon pool.
    pub threads: Option<usize>,
    pub convert: ConvertOptions,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            spool_dir: PathBuf::from("spool"),
            force: false,
            threads: None,
            convert: ConvertOptions::default(),
        }
    }
}

impl SyncOptions {
    /// Set the output directory.
    #[must_use]
    pub fn with_spool_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.spool_dir = dir.into();
        self
    }

    /// Convert up-to-date files again.
    #[must_use]
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Set the number of worker threads.
    #[must_use]
    pub fn with_threads(mut self, threads: Option<usize>) -> Self {
        self.threads = threads;
        self
    }

    /// Set the per-file conversion options.
    #[must_use]
    pub fn with_convert(mut self, convert: ConvertOptions) -> Self {
        self.convert = convert;
        self
    }
}

/// Per-file outcome of a batch run.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub converted: Vec<ConversionSummary>,
    /// Sources whose output was already up to date.
    pub skipped: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, crate::Error)>,
}

impl SyncReport {
    /// Returns true if no file failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// NeXus files directly inside `dir`, sorted by name.
///
/// # Errors
/// Returns an error if the directory cannot be read.
pub fn list_nexus_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_nexus = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(NEXUS_EXTENSION));
        if is_nexus && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Returns true if `output` exists and is not older than `source`.
#[must_use]
pub fn is_up_to_date(source: &Path, output: &Path) -> bool {
    match (modified(source), modified(output)) {
        (Some(source), Some(output)) => output >= source,
        _ => false,
    }
}

/// Convert `sources` in parallel, keeping the input order in the result.
///
/// # Errors
/// Returns an error only if the worker pool cannot be built; per-file failures are
/// reported in the result.
pub fn convert_many(
    sources: &[PathBuf],
    destination: Option<&Path>,
    options: &ConvertOptions,
    threads: Option<usize>,
) -> Result<Vec<(PathBuf, Result<ConversionSummary>)>> {
    let run = || {
        sources
            .par_iter()
            .map(|source| (source.clone(), nxs2dat(source, destination, options)))
            .collect::<Vec<_>>()
    };
    match threads {
        Some(threads) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()?;
            Ok(pool.install(run))
        }
        None => Ok(run()),
    }
}

/// Convert every NeXus file in `dir` into the spool directory.
///
/// Outputs newer than their source are skipped unless [`SyncOptions::force`] is set.
///
/// # Errors
/// Returns an error if the directories cannot be read or created, or the worker pool
/// cannot be built.
pub fn sync_directory(dir: &Path, options: &SyncOptions) -> Result<SyncReport> {
    let spool = dir.join(&options.spool_dir);
    fs::create_dir_all(&spool)?;

    let mut report = SyncReport::default();
    let mut pending = Vec::new();
    for source in list_nexus_files(dir)? {
        let output = resolve_destination(&source, Some(&spool));
        if !options.force && is_up_to_date(&source, &output) {
            debug!("{} is up to date", output.display());
            report.skipped.push(source);
        } else {
            pending.push(source);
        }
    }
    info!(
        "{}: {} files to convert, {} up to date",
        dir.display(),
        pending.len(),
        report.skipped.len()
    );

    for (source, outcome) in convert_many(&pending, Some(&spool), &options.convert, options.threads)? {
        match outcome {
            Ok(summary) => report.converted.push(summary),
            Err(e) => {
                warn!("{e}");
                report.failed.push((source, e));
            }
        }
    }
    Ok(report)
}
