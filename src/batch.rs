/**
 * Batch orchestration over the album folders of an export root
 *
 * The immediate subdirectories are listed once, then each one is processed on
 * a rayon worker: resolve its date, rename or merge it, and optionally restore
 * the timestamps of the files it ends up in. Workers only ever touch their own
 * source directory, so no locking is needed. Failures are logged per item and
 * never stop the batch.
 */

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::exiftool::ExifTool;
use crate::file_ops::{relocate, CollisionPolicy, DirectoryOutcome, DirectoryTask};
use crate::timestamps::{correct_file_times, TimestampOutcome};

#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Worker threads (default: CPU count / 2)
    pub workers: Option<usize>,
    pub collision: CollisionPolicy,
    /// Restore capture timestamps after renaming, when exiftool is available
    pub correct_timestamps: bool,
    pub show_progress: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            workers: None,
            collision: CollisionPolicy::default(),
            correct_timestamps: true,
            show_progress: false,
        }
    }
}

/// What happened to one subdirectory of the root
#[derive(Debug, Clone)]
pub struct DirectoryReport {
    pub source: PathBuf,
    /// `None` when the batch only corrected timestamps
    pub outcome: Option<DirectoryOutcome>,
    pub timestamps: Vec<TimestampOutcome>,
}

/// Per-directory results, kept for the summary only
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub directories: Vec<DirectoryReport>,
}

impl BatchReport {
    fn count_outcomes(&self, predicate: impl Fn(&DirectoryOutcome) -> bool) -> usize {
        self.directories
            .iter()
            .filter_map(|d| d.outcome.as_ref())
            .filter(|&o| predicate(o))
            .count()
    }

    pub fn renamed(&self) -> usize {
        self.count_outcomes(|o| matches!(o, DirectoryOutcome::Renamed { .. }))
    }

    pub fn merged(&self) -> usize {
        self.count_outcomes(|o| matches!(o, DirectoryOutcome::Merged { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count_outcomes(|o| matches!(o, DirectoryOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count_outcomes(DirectoryOutcome::is_failure)
    }

    pub fn timestamps_corrected(&self) -> usize {
        self.timestamp_outcomes().filter(|t| t.is_corrected()).count()
    }

    pub fn timestamp_failures(&self) -> usize {
        self.timestamp_outcomes().filter(|t| t.is_failure()).count()
    }

    pub fn timestamp_outcomes(&self) -> impl Iterator<Item = &TimestampOutcome> {
        self.directories.iter().flat_map(|d| d.timestamps.iter())
    }
}

/// Immediate subdirectories of `root`, fixed before any processing starts.
pub fn list_subdirectories(root: &Path) -> Result<Vec<PathBuf>> {
    let mut directories = Vec::new();
    for entry in fs::read_dir(root)
        .with_context(|| format!("Failed to read directory: {}", root.display()))?
    {
        match entry {
            Ok(entry) if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) => {
                directories.push(entry.path());
            }
            Ok(_) => {}
            Err(e) => warn!("Failed to read entry in {}: {}", root.display(), e),
        }
    }
    directories.sort();
    Ok(directories)
}

/// "Normalize folders": rename/merge every album folder under `root`.
pub fn normalize_folders(
    root: &Path,
    tool: &ExifTool,
    options: &BatchOptions,
) -> Result<BatchReport> {
    let directories = list_subdirectories(root)?;
    info!("Found {} folders in {}", directories.len(), root.display());

    let tool = if options.correct_timestamps {
        available_tool(tool)
    } else {
        None
    };

    let pool = build_pool(options.workers)?;
    let pb = progress_bar(directories.len(), "Normalizing folders", options.show_progress);

    let reports: Vec<DirectoryReport> = pool.install(|| {
        directories
            .par_iter()
            .map(|directory| {
                let report = normalize_directory(directory, tool, options.collision);
                pb.inc(1);
                report
            })
            .collect()
    });

    pb.finish_with_message("Normalizing complete");
    Ok(BatchReport { directories: reports })
}

/// "Correct timestamps only": restore capture times in every album folder under `root`.
pub fn correct_timestamps_only(
    root: &Path,
    tool: &ExifTool,
    options: &BatchOptions,
) -> Result<BatchReport> {
    let directories = list_subdirectories(root)?;

    let Some(tool) = available_tool(tool) else {
        return Ok(BatchReport::default());
    };

    let pool = build_pool(options.workers)?;
    let pb = progress_bar(directories.len(), "Correcting timestamps", options.show_progress);

    let reports: Vec<DirectoryReport> = pool.install(|| {
        directories
            .par_iter()
            .map(|directory| {
                let report = DirectoryReport {
                    source: directory.clone(),
                    outcome: None,
                    timestamps: correct_directory(tool, directory),
                };
                pb.inc(1);
                report
            })
            .collect()
    });

    pb.finish_with_message("Timestamps complete");
    Ok(BatchReport { directories: reports })
}

fn normalize_directory(
    directory: &Path,
    tool: Option<&ExifTool>,
    policy: CollisionPolicy,
) -> DirectoryReport {
    let outcome = match DirectoryTask::from_source(directory) {
        Ok(task) => relocate(&task, policy),
        Err(e) => {
            info!("No match, skipping {}: {}", directory.display(), e);
            DirectoryOutcome::Skipped {
                path: directory.to_path_buf(),
                reason: e.to_string(),
            }
        }
    };

    let timestamps = match (tool, outcome.final_directory()) {
        (Some(tool), Some(final_directory)) => correct_directory(tool, final_directory),
        _ => Vec::new(),
    };

    DirectoryReport {
        source: directory.to_path_buf(),
        outcome: Some(outcome),
        timestamps,
    }
}

/// Restore timestamps of the files directly inside `directory`, one at a time.
fn correct_directory(tool: &ExifTool, directory: &Path) -> Vec<TimestampOutcome> {
    WalkDir::new(directory)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Failed to read entry in {}: {}", directory.display(), e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| correct_file_times(tool, entry.path()))
        .collect()
}

/// Probe once per batch; a missing tool only disables timestamp correction.
fn available_tool(tool: &ExifTool) -> Option<&ExifTool> {
    match tool.ensure_available() {
        Ok(version) => {
            info!("Using exiftool {} at {}", version, tool.tool_path().display());
            Some(tool)
        }
        Err(e) => {
            warn!("{}; timestamp correction disabled", e);
            None
        }
    }
}

fn build_pool(workers: Option<usize>) -> Result<ThreadPool> {
    let threads = match workers {
        Some(count) => count.max(1),
        // I/O bound: half the cores
        None => (num_cpus::get() / 2).max(1),
    };
    info!("Using thread pool with {} threads (CPUs: {})", threads, num_cpus::get());

    ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("album-worker-{}", i))
        .build()
        .context("Failed to build worker thread pool")
}

fn progress_bar(len: usize, message: &'static str, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(len as u64);
    let style = ProgressStyle::default_bar()
        .template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} \
             ({per_sec:.1} dirs/s) ETA: {eta} {msg}",
        )
        .map(|style| style.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb.set_message(message);
    pb
}
