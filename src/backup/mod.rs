pub(crate) mod archive;
pub(crate) mod bson_json;
pub(crate) mod db_dump;
pub(crate) mod logic;
pub(crate) mod progress;
pub(crate) mod uploader;

#[cfg(test)]
pub(crate) mod testing;

use anyhow::{Context, Result};
use std::path::Path;

use crate::config::AppConfig;
use crate::storage::connect_store;
use crate::utils::{human_bytes, setting::check_source_connection};
use archive::{CompressSummary, compress_directory};
use db_dump::MongoSource;
use logic::{BatchReport, BulkReport, Pipeline, UnitStatus, upload_directory};
use uploader::{UploadOutcome, Uploader};

async fn connect_source(app_config: &AppConfig) -> Result<MongoSource> {
    let source = MongoSource::connect(&app_config.mongo_uri, &app_config.database_name)
        .await
        .context("Failed to create MongoDB client")?;
    check_source_connection(&source)
        .await
        .context("Cannot proceed with backup - database connection failed")?;
    Ok(source)
}

/// Bundles every collection into one archive and uploads it once.
pub async fn run_bulk_flow(app_config: &AppConfig, show_progress: bool) -> Result<BulkReport> {
    let source = connect_source(app_config).await?;
    let store = connect_store(&app_config.destination).await?;
    let uploader = Uploader::new(store.as_ref(), app_config.retry);

    let report = Pipeline::new(&source, uploader, app_config.destination.folder_id())
        .with_collections(app_config.collections.clone())
        .with_progress_bar(show_progress)
        .run_bulk()
        .await
        .context("Bulk backup failed")?;
    Ok(report)
}

/// Exports, archives and uploads each collection on its own.
pub async fn run_per_collection_flow(app_config: &AppConfig, show_progress: bool) -> Result<BatchReport> {
    let source = connect_source(app_config).await?;
    let store = connect_store(&app_config.destination).await?;
    let uploader = Uploader::new(store.as_ref(), app_config.retry);

    let report = Pipeline::new(&source, uploader, app_config.destination.folder_id())
        .with_collections(app_config.collections.clone())
        .with_progress_bar(show_progress)
        .run_per_collection()
        .await
        .context("Per-collection backup failed")?;
    Ok(report)
}

pub fn run_compress_flow(app_config: &AppConfig, input: &Path, output: &Path) -> Result<CompressSummary> {
    compress_directory(input, output, app_config.local_dirs.remove_after_compression)
        .with_context(|| format!("Compression of {} failed", input.display()))
}

pub async fn run_upload_flow(app_config: &AppConfig, input: &Path, show_progress: bool) -> Result<BatchReport> {
    let store = connect_store(&app_config.destination).await?;
    let uploader = Uploader::new(store.as_ref(), app_config.retry);
    upload_directory(&uploader, app_config.destination.folder_id(), input, show_progress).await
}

pub fn print_bulk_report(report: &BulkReport) {
    match report {
        BulkReport::NothingToDo => println!("⚠ No collections found, nothing was uploaded."),
        BulkReport::Completed(summary) => {
            let verb = match summary.outcome {
                UploadOutcome::Uploaded(_) => "📤 Uploaded",
                UploadOutcome::Skipped(_) => "⏭ Already present, skipped",
            };
            println!(
                "{} {} ({} collections, {} documents, {})",
                verb,
                summary.archive_name,
                summary.collections,
                summary.documents,
                human_bytes(summary.archive_bytes as u64)
            );
            if summary.skipped_documents > 0 {
                println!("⚠ {} document(s) could not be serialized and were left out", summary.skipped_documents);
            }
            println!("   Remote id: {}", summary.outcome.remote_file().id);
            println!("⏱ Finished in {:.1?}", summary.elapsed);
        }
    }
}

pub fn print_batch_report(report: &BatchReport) {
    for line in batch_report_lines(report) {
        println!("{}", line);
    }
}

fn batch_report_lines(report: &BatchReport) -> Vec<String> {
    if report.is_noop() {
        return vec!["⚠ Nothing to do.".to_string()];
    }

    let mut lines = Vec::with_capacity(report.outcomes.len() + 1);
    for outcome in &report.outcomes {
        let label = outcome.archive_name.as_deref().unwrap_or(&outcome.name);
        let documents = if outcome.documents > 0 {
            format!(", {} documents", outcome.documents)
        } else {
            String::new()
        };
        lines.push(match &outcome.status {
            UnitStatus::Uploaded(file) => {
                format!("📤 {}: uploaded {} (id: {}{})", outcome.name, label, file.id, documents)
            }
            UnitStatus::Skipped(file) => {
                format!("⏭ {}: {} already present (id: {}{})", outcome.name, label, file.id, documents)
            }
            UnitStatus::Failed(e) => format!("❌ {}: {}", outcome.name, e),
        });
        if outcome.skipped_documents > 0 {
            lines.push(format!("   ⚠ {} document(s) left out", outcome.skipped_documents));
        }
    }

    lines.push(format!(
        "Summary: {} uploaded, {} skipped, {} failed in {:.1?}",
        report.uploaded().len(),
        report.skipped().len(),
        report.failed().len(),
        report.elapsed
    ));
    lines
}
