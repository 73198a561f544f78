/**
 * Directory merge/rename engine
 *
 * Moves an album folder to its `YYYY-MM-DD` sibling. If that sibling already
 * exists the folder's files are merged into it one by one and the emptied
 * source is removed. Every file move and directory operation fails on its own;
 * nothing here aborts the batch.
 */

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use std::ffi::OsStr;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::OrganizeError;
use crate::folder_name::{resolve_folder_name, ResolvedDate};
use crate::hashing::ContentHasher;

/// What to do when a merged file's name already exists at the destination
/// with different content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollisionPolicy {
    /// Replace the destination file (last write wins)
    #[default]
    Overwrite,
    /// Leave the file in the source directory
    Skip,
    /// Move it under a free `-2`, `-3`, ... suffixed name
    Rename,
}

impl FromStr for CollisionPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "overwrite" => Ok(Self::Overwrite),
            "skip" => Ok(Self::Skip),
            "rename" => Ok(Self::Rename),
            _ => anyhow::bail!(
                "Invalid collision policy: {}. Must be 'overwrite', 'skip', or 'rename'",
                s
            ),
        }
    }
}

/// One album folder scheduled for normalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryTask {
    pub source_path: PathBuf,
    pub parent_path: PathBuf,
    pub resolved_date: ResolvedDate,
}

impl DirectoryTask {
    /// Resolve the date in `source_path`'s leaf name.
    pub fn from_source(source_path: &Path) -> std::result::Result<Self, OrganizeError> {
        let name = source_path
            .file_name()
            .and_then(OsStr::to_str)
            .ok_or_else(|| OrganizeError::NoDateMatch(source_path.to_string_lossy().into_owned()))?;

        let (parsed, resolved_date) = resolve_folder_name(name)?;
        debug!(
            "\"{}\" found \"{}\", resolved as \"{}\"",
            name, parsed.date_token, resolved_date
        );

        Ok(Self {
            source_path: source_path.to_path_buf(),
            parent_path: source_path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
            resolved_date,
        })
    }

    pub fn destination(&self) -> PathBuf {
        self.parent_path.join(self.resolved_date.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileMoveOutcome {
    Moved { from: PathBuf, to: PathBuf },
    /// Identical content was already at the destination; the source copy was removed
    Duplicate { removed: PathBuf, existing: PathBuf },
    /// Left in place by `CollisionPolicy::Skip`
    Kept { path: PathBuf },
    Failed { path: PathBuf, message: String },
}

impl FileMoveOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryOutcome {
    Renamed {
        from: PathBuf,
        to: PathBuf,
    },
    Merged {
        from: PathBuf,
        to: PathBuf,
        files: Vec<FileMoveOutcome>,
        source_removed: bool,
    },
    Skipped {
        path: PathBuf,
        reason: String,
    },
    Failed {
        path: PathBuf,
        message: String,
    },
}

impl DirectoryOutcome {
    /// Directory holding the album's files after the operation, if any.
    pub fn final_directory(&self) -> Option<&Path> {
        match self {
            Self::Renamed { to, .. } | Self::Merged { to, .. } => Some(to),
            Self::Skipped { .. } | Self::Failed { .. } => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

impl fmt::Display for DirectoryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Renamed { from, to } => {
                write!(f, "Renamed \"{}\" -> \"{}\"", from.display(), to.display())
            }
            Self::Merged { from, to, files, source_removed } => {
                let failed = files.iter().filter(|file| file.is_failure()).count();
                write!(
                    f,
                    "Merged \"{}\" into \"{}\" ({} files, {} failed{})",
                    from.display(),
                    to.display(),
                    files.len(),
                    failed,
                    if *source_removed { "" } else { ", source left behind" }
                )
            }
            Self::Skipped { path, reason } => {
                write!(f, "Skipped \"{}\": {}", path.display(), reason)
            }
            Self::Failed { path, message } => {
                write!(f, "Failed \"{}\": {}", path.display(), message)
            }
        }
    }
}

/// Rename or merge one album folder into its dated sibling.
pub fn relocate(task: &DirectoryTask, policy: CollisionPolicy) -> DirectoryOutcome {
    let source = &task.source_path;
    let destination = task.destination();

    if destination == *source {
        return DirectoryOutcome::Skipped {
            path: source.clone(),
            reason: "already normalized".to_string(),
        };
    }

    match fs::metadata(&destination) {
        Ok(metadata) if metadata.is_dir() => return merge_into(source, &destination, policy),
        Ok(_) => {
            let message = format!(
                "Destination exists and is not a directory: {}",
                destination.display()
            );
            error!("{}", message);
            return DirectoryOutcome::Failed {
                path: source.clone(),
                message,
            };
        }
        Err(_) => {}
    }

    match fs::rename(source, &destination) {
        Ok(()) => {
            info!("Renamed \"{}\" -> \"{}\"", source.display(), destination.display());
            DirectoryOutcome::Renamed {
                from: source.clone(),
                to: destination,
            }
        }
        // A sibling worker created the destination in the meantime
        Err(e) if destination.is_dir() => {
            debug!("Rename of {} raced with another worker ({}), merging", source.display(), e);
            merge_into(source, &destination, policy)
        }
        Err(e) => {
            error!(
                "Failed to rename \"{}\" -> \"{}\": {}",
                source.display(),
                destination.display(),
                e
            );
            DirectoryOutcome::Failed {
                path: source.clone(),
                message: e.to_string(),
            }
        }
    }
}

/// Move every file of `source` into the existing `destination`, then remove `source`.
pub fn merge_into(source: &Path, destination: &Path, policy: CollisionPolicy) -> DirectoryOutcome {
    info!("Merging \"{}\" into \"{}\"", source.display(), destination.display());

    let entries = match fs::read_dir(source) {
        Ok(entries) => entries,
        Err(e) => {
            error!("Failed to list {}: {}", source.display(), e);
            return DirectoryOutcome::Failed {
                path: source.to_path_buf(),
                message: e.to_string(),
            };
        }
    };

    let hasher = ContentHasher::new();
    let mut files = Vec::new();

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Failed to read entry in {}: {}", source.display(), e);
                continue;
            }
        };

        // Subdirectories are not merged; they keep the source from being removed
        if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            debug!("Not merging subdirectory {}", entry.path().display());
            continue;
        }

        let outcome = move_file_into(&entry.path(), destination, policy, &hasher);
        if let FileMoveOutcome::Failed { path, message } = &outcome {
            error!("Failed to move {}: {}", path.display(), message);
        }
        files.push(outcome);
    }

    let source_removed = match fs::remove_dir(source) {
        Ok(()) => true,
        Err(e) => {
            warn!("Left residual directory {}: {}", source.display(), e);
            false
        }
    };

    DirectoryOutcome::Merged {
        from: source.to_path_buf(),
        to: destination.to_path_buf(),
        files,
        source_removed,
    }
}

fn move_file_into(
    source_file: &Path,
    destination_dir: &Path,
    policy: CollisionPolicy,
    hasher: &ContentHasher,
) -> FileMoveOutcome {
    let Some(file_name) = source_file.file_name() else {
        return FileMoveOutcome::Failed {
            path: source_file.to_path_buf(),
            message: "path has no file name".to_string(),
        };
    };

    let target = destination_dir.join(file_name);

    if target.exists() {
        match hasher.same_content(source_file, &target) {
            Ok(true) => return drop_duplicate(source_file, target),
            Ok(false) => {}
            Err(e) => debug!(
                "Could not compare {} with {}: {:#}",
                source_file.display(),
                target.display(),
                e
            ),
        }
    }

    let placed = match policy {
        CollisionPolicy::Overwrite => {
            if target.exists() {
                debug!("Overwriting {}", target.display());
            }
            move_file(source_file, &target).map(|()| Some(target))
        }
        CollisionPolicy::Skip => match place_new(source_file, &target) {
            Ok(()) => Ok(Some(target)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                info!("Keeping {}: {} already exists", source_file.display(), target.display());
                Ok(None)
            }
            Err(e) => Err(e).with_context(|| place_failed(source_file, &target)),
        },
        CollisionPolicy::Rename => {
            place_renamed(source_file, destination_dir, Path::new(file_name)).map(Some)
        }
    };

    match placed {
        Ok(Some(target)) => FileMoveOutcome::Moved {
            from: source_file.to_path_buf(),
            to: target,
        },
        Ok(None) => FileMoveOutcome::Kept {
            path: source_file.to_path_buf(),
        },
        Err(e) => FileMoveOutcome::Failed {
            path: source_file.to_path_buf(),
            message: format!("{:#}", e),
        },
    }
}

fn drop_duplicate(source_file: &Path, existing: PathBuf) -> FileMoveOutcome {
    match fs::remove_file(source_file) {
        Ok(()) => {
            debug!(
                "Removed duplicate {} (same as {})",
                source_file.display(),
                existing.display()
            );
            FileMoveOutcome::Duplicate {
                removed: source_file.to_path_buf(),
                existing,
            }
        }
        Err(e) => FileMoveOutcome::Failed {
            path: source_file.to_path_buf(),
            message: format!("Failed to remove duplicate: {}", e),
        },
    }
}

/// Place the file under its own name or the first free `<stem>-N.<ext>`, N from 2.
fn place_renamed(source_file: &Path, dir: &Path, file_name: &Path) -> Result<PathBuf> {
    let mut counter = 1;
    loop {
        let candidate = if counter == 1 {
            dir.join(file_name)
        } else {
            dir.join(suffixed_name(file_name, counter))
        };
        match place_new(source_file, &candidate) {
            Ok(()) => return Ok(candidate),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => counter += 1,
            Err(e) => return Err(e).with_context(|| place_failed(source_file, &candidate)),
        }
    }
}

fn suffixed_name(file_name: &Path, counter: u32) -> String {
    let stem = file_name
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    match file_name.extension() {
        Some(ext) => format!("{}-{}.{}", stem, counter, ext.to_string_lossy()),
        None => format!("{}-{}", stem, counter),
    }
}

fn place_failed(source_path: &Path, target_path: &Path) -> String {
    format!(
        "Failed to move file from '{}' to '{}'",
        source_path.display(),
        target_path.display()
    )
}

/// Move a file to `target_path` only if that name is still free.
///
/// The name is claimed atomically (hard link, or `create_new` copy where links
/// are unavailable), so a sibling worker merging into the same directory gets
/// `AlreadyExists` instead of replacing the file.
fn place_new(source_path: &Path, target_path: &Path) -> io::Result<()> {
    match fs::hard_link(source_path, target_path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Err(e),
        Err(e) => {
            debug!("Hard link to {} failed ({}), copying", target_path.display(), e);
            copy_new(source_path, target_path)?;
        }
    }
    fs::remove_file(source_path)
}

fn copy_new(source_path: &Path, target_path: &Path) -> io::Result<()> {
    let mut reader = File::open(source_path)?;
    let mut writer = OpenOptions::new().write(true).create_new(true).open(target_path)?;

    let copied = io::copy(&mut reader, &mut writer)
        .and_then(|_| writer.set_permissions(reader.metadata()?.permissions()));
    if copied.is_err() {
        // Do not leave a truncated file holding the name
        let _ = fs::remove_file(target_path);
    }
    copied
}

/// Move a single file, falling back to copy+delete across devices.
fn move_file(source_path: &Path, target_path: &Path) -> Result<()> {
    debug!("Moving '{}' -> '{}'", source_path.display(), target_path.display());

    match fs::rename(source_path, target_path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            debug!("Cross-device move detected, using copy+delete strategy");
            fs::copy(source_path, target_path).with_context(|| {
                format!(
                    "Failed to copy file from '{}' to '{}'",
                    source_path.display(),
                    target_path.display()
                )
            })?;
            fs::remove_file(source_path).with_context(|| {
                format!("Failed to remove moved file: {}", source_path.display())
            })?;
            Ok(())
        }
        Err(e) => Err(e).with_context(|| place_failed(source_path, target_path)),
    }
}
