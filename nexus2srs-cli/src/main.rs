//! nexus2srs CLI
//!
//! Converts NeXus scan files into classic SRS `.dat` files.
#![allow(clippy::uninlined_format_args)]

use clap::{ArgAction, Parser, Subcommand};
use log::{error, info};
use nexus2srs_core::{ClassifyOptions, RecordSummary};
use nexus2srs_io::{
    classify_file, convert_many, sync_directory, ConvertOptions, SrsFormat, SyncOptions,
};
use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("{0}")]
    Io(#[from] nexus2srs_io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Usage(String),

    #[error("{failed} of {total} file(s) failed")]
    Failed { failed: usize, total: usize },
}

/// Convert NeXus/HDF5 scan files into SRS .dat files.
#[derive(Parser)]
#[command(name = "nexus2srs")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log output (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert one or more NeXus files
    Convert {
        /// Input NeXus file(s)
        #[arg(required = true)]
        input: Vec<PathBuf>,

        /// Output file, or directory receiving <stem>.dat
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write detector frames as TIFF files
        #[arg(long)]
        tiff: bool,

        /// Replace image files that already exist
        #[arg(long, requires = "tiff")]
        overwrite_images: bool,

        /// Digits after the decimal point in the scan table
        #[arg(long, default_value = "6")]
        precision: usize,

        /// Worker threads (default: one per core)
        #[arg(short, long)]
        jobs: Option<usize>,
    },

    /// Convert every NeXus file in a directory that has no up-to-date output
    Sync {
        /// Directory containing .nxs files
        dir: PathBuf,

        /// Output directory, relative to DIR unless absolute
        #[arg(long, default_value = "spool")]
        spool: PathBuf,

        /// Write detector frames as TIFF files
        #[arg(long)]
        tiff: bool,

        /// Worker threads (default: one per core)
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Convert files even if their output is up to date
        #[arg(long)]
        force: bool,
    },

    /// Show how a NeXus file would be classified
    Info {
        /// Input NeXus file
        input: PathBuf,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn print_summary(input: &std::path::Path, summary: &RecordSummary) {
    println!("File: {}", input.display());
    println!(
        "Index: {} datasets, {} groups, {} unresolvable",
        summary.stats.datasets, summary.stats.groups, summary.stats.unresolved
    );
    match summary.resolver {
        Some(resolver) => println!("Resolver: {}", resolver),
        None => println!("Resolver: none (metadata only)"),
    }
    println!("Points: {}", summary.points);
    println!("Columns: {}", summary.columns.join(", "));
    println!("Metadata: {} entries", summary.metadata);
    if let Some(command) = &summary.scan_command {
        println!("Command: {}", command);
    }
    if !summary.detectors.is_empty() {
        println!("Detectors: {}", summary.detectors.join(", "));
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Convert {
            input,
            output,
            tiff,
            overwrite_images,
            precision,
            jobs,
        } => {
            let options = ConvertOptions::default()
                .with_images(tiff)
                .with_overwrite_images(overwrite_images)
                .with_format(SrsFormat::default().with_precision(precision));
            let total = input.len();
            if total > 1 && output.as_ref().is_some_and(|path| !path.is_dir()) {
                return Err(CliError::Usage(
                    "--output must be an existing directory when converting several files".into(),
                ));
            }
            let mut failed = 0;
            for (source, outcome) in convert_many(&input, output.as_deref(), &options, jobs)? {
                match outcome {
                    Ok(summary) => {
                        println!("{} -> {}", source.display(), summary.destination.display());
                        if summary.images.total() > 0 {
                            println!(
                                "  images: {} written, {} existing, {} failed",
                                summary.images.written,
                                summary.images.existing,
                                summary.images.failed
                            );
                        }
                    }
                    Err(e) => {
                        error!("{e}");
                        failed += 1;
                    }
                }
            }
            if failed > 0 {
                return Err(CliError::Failed { failed, total });
            }
        }

        Commands::Sync {
            dir,
            spool,
            tiff,
            jobs,
            force,
        } => {
            let options = SyncOptions::default()
                .with_spool_dir(spool)
                .with_force(force)
                .with_threads(jobs)
                .with_convert(ConvertOptions::default().with_images(tiff));
            let report = sync_directory(&dir, &options)?;
            info!("sync of {} finished", dir.display());
            println!(
                "Converted: {}, up to date: {}, failed: {}",
                report.converted.len(),
                report.skipped.len(),
                report.failed.len()
            );
            for (_, e) in &report.failed {
                error!("{e}");
            }
            if !report.is_success() {
                return Err(CliError::Failed {
                    failed: report.failed.len(),
                    total: report.converted.len() + report.failed.len(),
                });
            }
        }

        Commands::Info { input, json } => {
            let (_, record) = classify_file(&input, &ClassifyOptions::default())?;
            let summary = record.summary();
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_summary(&input, &summary);
            }
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_sync() {
        let cli = Cli::try_parse_from(["nexus2srs", "-vv", "sync", "/data", "--jobs", "4"]).unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Sync {
                dir, spool, jobs, force, ..
            } => {
                assert_eq!(dir, PathBuf::from("/data"));
                assert_eq!(spool, PathBuf::from("spool"));
                assert_eq!(jobs, Some(4));
                assert!(!force);
            }
            _ => panic!("expected sync"),
        }
    }

    #[test]
    fn test_overwrite_requires_tiff() {
        assert!(Cli::try_parse_from(["nexus2srs", "convert", "a.nxs", "--overwrite-images"]).is_err());
        assert!(
            Cli::try_parse_from(["nexus2srs", "convert", "a.nxs", "--tiff", "--overwrite-images"])
                .is_ok()
        );
    }
}
