use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use std::path::{Path, PathBuf};

use album_date_rs::batch::{self, BatchOptions, BatchReport};
use album_date_rs::logging::setup_logging;
use album_date_rs::{CollisionPolicy, DirectoryOutcome, ExifTool};

#[derive(Parser)]
#[command(name = "album-date")]
#[command(version)]
#[command(about = "Normalizes exported photo album folders to ISO dates and restores capture timestamps")]
#[command(long_about = "Renames exported album folders such as '東京都 - 渋谷区, 2021年3月9日' to '2021-03-09'.

If the dated folder already exists, the album's files are merged into it and the
emptied album folder is removed. Afterwards each file's modification (and, where
supported, creation) time is set to the 'Create Date' read by exiftool.

exiftool is looked up next to this executable unless --exiftool is given.
Without it, folders are still normalized but timestamps are left alone.")]
struct Cli {
    /// Increase verbosity (-v=INFO, -vv=DEBUG, -vvv=TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Append log entries to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Path to the exiftool executable file; PATH is not searched (default: next to this program)
    #[arg(long, global = true)]
    exiftool: Option<PathBuf>,

    /// Ask exiftool for tag names without whitespace (-s)
    #[arg(long, global = true)]
    short_tag_names: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rename or merge album folders to YYYY-MM-DD, then restore timestamps
    Normalize {
        /// Export root whose immediate subfolders are albums
        root: PathBuf,
        /// Number of parallel workers (default: CPU count / 2)
        #[arg(short, long)]
        workers: Option<usize>,
        /// Same-named file on merge: overwrite (default), skip, or rename
        #[arg(long, default_value = "overwrite")]
        collision: String,
        /// Only rename/merge folders, leave timestamps alone
        #[arg(long)]
        no_timestamps: bool,
    },
    /// Restore capture timestamps in every album folder without renaming
    Timestamps {
        /// Export root whose immediate subfolders are albums
        root: PathBuf,
        /// Number of parallel workers (default: CPU count / 2)
        #[arg(short, long)]
        workers: Option<usize>,
    },
    /// Check whether exiftool can be run
    Probe,
    /// Copy EXIF tags between an image and a sidecar file
    Sidecar {
        #[command(subcommand)]
        action: SidecarAction,
    },
}

#[derive(Subcommand)]
enum SidecarAction {
    /// Save the EXIF group of an image into a sidecar file
    Save { image: PathBuf, sidecar: PathBuf },
    /// Write all tags of a sidecar file onto an existing image
    Restore { sidecar: PathBuf, image: PathBuf },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.log_file.as_deref())?;

    info!("Starting album-date");

    let tool = match &cli.exiftool {
        Some(path) => ExifTool::new(path),
        None => ExifTool::bundled(),
    }
    .short_tag_names(cli.short_tag_names);

    match cli.command {
        Commands::Normalize { root, workers, collision, no_timestamps } => {
            let options = BatchOptions {
                workers,
                collision: collision.parse::<CollisionPolicy>()?,
                correct_timestamps: !no_timestamps,
                show_progress: true,
            };
            check_root(&root)?;
            let report = batch::normalize_folders(&root, &tool, &options)?;
            print_summary(&report);
            Ok(())
        }
        Commands::Timestamps { root, workers } => {
            let options = BatchOptions {
                workers,
                show_progress: true,
                ..BatchOptions::default()
            };
            check_root(&root)?;
            let report = batch::correct_timestamps_only(&root, &tool, &options)?;
            print_summary(&report);
            Ok(())
        }
        Commands::Probe => {
            match tool.version() {
                Some(version) => println!("exiftool {} at {}", version, tool.tool_path().display()),
                None => println!("exiftool not available at {}", tool.tool_path().display()),
            }
            Ok(())
        }
        Commands::Sidecar { action } => match action {
            SidecarAction::Save { image, sidecar } => tool
                .save_exif_data(&image, &sidecar)
                .with_context(|| format!("Failed to save EXIF data of {}", image.display())),
            SidecarAction::Restore { sidecar, image } => tool
                .write_exif_data(&sidecar, &image)
                .with_context(|| format!("Failed to write EXIF data to {}", image.display())),
        },
    }
}

fn check_root(root: &Path) -> Result<()> {
    if !root.is_dir() {
        anyhow::bail!("Not a directory: {}", root.display());
    }
    Ok(())
}

fn print_summary(report: &BatchReport) {
    println!("\nProcessing complete!");
    println!("Folders scanned: {}", report.directories.len());
    println!("Folders renamed: {}", report.renamed());
    println!("Folders merged: {}", report.merged());
    println!("Folders skipped: {}", report.skipped());
    println!("Folder errors: {}", report.failed());
    println!("Timestamps corrected: {}", report.timestamps_corrected());
    println!("Timestamp errors: {}", report.timestamp_failures());

    let failures: Vec<&DirectoryOutcome> = report
        .directories
        .iter()
        .filter_map(|d| d.outcome.as_ref())
        .filter(|o| o.is_failure())
        .collect();

    if !failures.is_empty() {
        println!("\nErrors:");
        for outcome in failures {
            println!("  {}", outcome);
        }
    }
}
