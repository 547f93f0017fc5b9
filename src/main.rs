//! MongoDB collection backup tool
//!
//! Exports collections to JSON lines, zips them and uploads the archives to
//! Google Drive, an S3-compatible bucket or a local directory. Re-running is
//! safe: archives already present at the destination are skipped.

// mongodrive-backup/src/main.rs
mod backup;
mod config;
mod errors;
mod storage;
mod utils;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::AppConfig;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "mongodrive-backup", version, about = "Back up MongoDB collections as zip archives")]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(long, global = true, default_value = "config.json")]
    config: PathBuf,

    /// Disable the progress bar (progress is still logged)
    #[arg(long, global = true)]
    no_progress: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Bundle every collection into one timestamped archive and upload it
    Bulk,
    /// Export, compress and upload each collection separately
    Backup,
    /// Zip exported JSON files found in a local directory
    Compress {
        /// Directory holding *.json / *.jsonl exports (defaults to local_dirs.json_dir)
        #[arg(long)]
        input: Option<PathBuf>,
        /// Directory to write archives to (defaults to local_dirs.zip_dir)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Upload every zip archive found in a local directory
    Upload {
        /// Directory holding *.zip archives (defaults to local_dirs.zip_dir)
        #[arg(long)]
        input: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run_app(cli).await {
        Ok(true) => {
            println!("✅ Operation completed successfully.");
            ExitCode::SUCCESS
        }
        Ok(false) => {
            eprintln!("❌ Operation finished with failures.");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("❌ Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Runs the selected command. `Ok(false)` means the run completed but at
/// least one unit failed.
async fn run_app(cli: Cli) -> Result<bool> {
    let app_config = AppConfig::load_from_json(&cli.config).context(format!(
        "Failed to load application configuration from {}",
        cli.config.display()
    ))?;
    let show_progress = !cli.no_progress;

    match cli.command {
        Command::Bulk => {
            println!("🚀 Starting bulk backup of {}...", app_config.database_name);
            let report = backup::run_bulk_flow(&app_config, show_progress).await?;
            backup::print_bulk_report(&report);
            Ok(true)
        }
        Command::Backup => {
            println!("🚀 Starting per-collection backup of {}...", app_config.database_name);
            let report = backup::run_per_collection_flow(&app_config, show_progress).await?;
            backup::print_batch_report(&report);
            Ok(report.is_success())
        }
        Command::Compress { input, output } => {
            let input = input.unwrap_or_else(|| app_config.local_dirs.json_dir.clone());
            let output = output.unwrap_or_else(|| app_config.local_dirs.zip_dir.clone());
            println!("🗜 Compressing {} into {}...", input.display(), output.display());
            let summary = backup::run_compress_flow(&app_config, &input, &output)?;
            for (path, reason) in &summary.failed {
                println!("❌ {}: {}", path.display(), reason);
            }
            println!(
                "Summary: {} archive(s) written, {} already present, {} failed",
                summary.written.len(),
                summary.skipped.len(),
                summary.failed.len()
            );
            Ok(summary.is_success())
        }
        Command::Upload { input } => {
            let input = input.unwrap_or_else(|| app_config.local_dirs.zip_dir.clone());
            println!("📤 Uploading archives from {}...", input.display());
            let report = backup::run_upload_flow(&app_config, &input, show_progress).await?;
            backup::print_batch_report(&report);
            Ok(report.is_success())
        }
    }
}
