// mongodrive-backup/src/backup/logic.rs
use anyhow::Context;
use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};
use walkdir::WalkDir;

use super::archive::{archive_entries, build_bulk, build_per_collection};
use super::db_dump::{DocumentSource, Exporter};
use super::progress::ProgressTracker;
use super::uploader::{UploadOutcome, Uploader};
use crate::errors::{BackupError, Result};
use crate::storage::RemoteFile;
use crate::utils::human_bytes;

#[derive(Debug)]
pub enum UnitStatus {
    Uploaded(RemoteFile),
    Skipped(RemoteFile),
    Failed(BackupError),
}

impl From<UploadOutcome> for UnitStatus {
    fn from(outcome: UploadOutcome) -> Self {
        match outcome {
            UploadOutcome::Uploaded(file) => UnitStatus::Uploaded(file),
            UploadOutcome::Skipped(file) => UnitStatus::Skipped(file),
        }
    }
}

/// Result of one collection (or one local archive) in a batch run.
#[derive(Debug)]
pub struct UnitOutcome {
    pub name: String,
    pub archive_name: Option<String>,
    pub documents: u64,
    pub skipped_documents: u64,
    pub status: UnitStatus,
}

/// Outcome list of a run where units succeed or fail independently.
#[derive(Debug)]
pub struct BatchReport {
    pub outcomes: Vec<UnitOutcome>,
    pub elapsed: Duration,
}

impl BatchReport {
    pub fn uploaded(&self) -> Vec<&UnitOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, UnitStatus::Uploaded(_)))
            .collect()
    }

    pub fn skipped(&self) -> Vec<&UnitOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, UnitStatus::Skipped(_)))
            .collect()
    }

    pub fn failed(&self) -> Vec<&UnitOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, UnitStatus::Failed(_)))
            .collect()
    }

    pub fn is_noop(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn is_success(&self) -> bool {
        self.failed().is_empty()
    }
}

#[derive(Debug)]
pub struct BulkSummary {
    pub archive_name: String,
    pub collections: usize,
    pub documents: u64,
    pub skipped_documents: u64,
    pub archive_bytes: usize,
    pub outcome: UploadOutcome,
    pub elapsed: Duration,
}

#[derive(Debug)]
pub enum BulkReport {
    NothingToDo,
    Completed(BulkSummary),
}

/// Sequences export → archive → upload for one database and one
/// destination folder.
pub struct Pipeline<'a> {
    source: &'a dyn DocumentSource,
    uploader: Uploader<'a>,
    folder: String,
    include: Option<Vec<String>>,
    show_progress: bool,
}

impl<'a> Pipeline<'a> {
    pub fn new(source: &'a dyn DocumentSource, uploader: Uploader<'a>, folder: &str) -> Self {
        Pipeline {
            source,
            uploader,
            folder: folder.to_string(),
            include: None,
            show_progress: false,
        }
    }

    /// Restricts runs to the named collections, keeping source order.
    pub fn with_collections(mut self, include: Option<Vec<String>>) -> Self {
        self.include = include;
        self
    }

    pub fn with_progress_bar(mut self, enabled: bool) -> Self {
        self.show_progress = enabled;
        self
    }

    async fn collection_names(&self) -> Result<Vec<String>> {
        let names = self.source.list_collection_names().await?;
        let Some(include) = &self.include else {
            return Ok(names);
        };

        for wanted in include {
            if !names.contains(wanted) {
                warn!(
                    "⚠ Collection '{}' not found in database {}, ignoring",
                    wanted,
                    self.source.database_name()
                );
            }
        }
        Ok(names.into_iter().filter(|n| include.contains(n)).collect())
    }

    /// Every collection into one timestamp-named archive, one upload.
    /// Any failure aborts the run.
    pub async fn run_bulk(&self) -> Result<BulkReport> {
        let names = self.collection_names().await?;
        if names.is_empty() {
            warn!("⚠ No collections found to bundle.");
            return Ok(BulkReport::NothingToDo);
        }

        info!(
            "✉️  Bundling {} collections of database {}",
            names.len(),
            self.source.database_name()
        );
        let exporter = Exporter::new(self.source);
        let mut tracker = ProgressTracker::new(names.len() as u64, self.show_progress);
        let mut snapshots = Vec::with_capacity(names.len());

        for name in &names {
            tracker.start_unit(&format!("Adding '{}.jsonl'", name));
            snapshots.push(exporter.export(name).await?);
            tracker.finish_unit();
        }

        let documents: u64 = snapshots.iter().map(|s| s.documents).sum();
        let skipped_documents: u64 = snapshots.iter().map(|s| s.skipped).sum();
        let collections = snapshots.len();

        let Some(archive) = build_bulk(snapshots, &Local::now())? else {
            return Ok(BulkReport::NothingToDo);
        };
        info!(
            "✅ Created in-memory zip: {} ({} entries, {})",
            archive.name,
            archive.entries.len(),
            human_bytes(archive.bytes.len() as u64)
        );

        let outcome = self
            .uploader
            .upload(&self.folder, &archive.name, &archive.bytes)
            .await?;
        let elapsed = tracker.finish();
        info!("⏱ Bulk backup finished in {:.2?}", elapsed);

        Ok(BulkReport::Completed(BulkSummary {
            archive_name: archive.name,
            collections,
            documents,
            skipped_documents,
            archive_bytes: archive.bytes.len(),
            outcome,
            elapsed,
        }))
    }

    /// One archive and one upload per collection. A failing collection is
    /// logged and recorded; the run moves on to the next one.
    pub async fn run_per_collection(&self) -> Result<BatchReport> {
        let names = self.collection_names().await?;
        info!(
            "Starting backup of {} collection(s) of database {}...",
            names.len(),
            self.source.database_name()
        );

        let mut tracker = ProgressTracker::new(names.len() as u64, self.show_progress);
        let mut outcomes = Vec::with_capacity(names.len());

        for name in &names {
            tracker.start_unit(&format!("Backing up '{}'", name));
            let outcome = self.backup_collection(name).await;
            if let UnitStatus::Failed(ref e) = outcome.status {
                error!("❌ Backup of collection '{}' failed: {}", name, e);
            }
            outcomes.push(outcome);
            tracker.finish_unit();
        }

        let elapsed = tracker.finish();
        info!("⏱ Per-collection backup finished in {:.2?}", elapsed);
        Ok(BatchReport { outcomes, elapsed })
    }

    async fn backup_collection(&self, name: &str) -> UnitOutcome {
        let mut documents = 0;
        let mut skipped_documents = 0;
        let mut archive_name = None;

        let result: Result<UploadOutcome> = async {
            let snapshot = Exporter::new(self.source).export(name).await?;
            documents = snapshot.documents;
            skipped_documents = snapshot.skipped;

            let archive = build_per_collection(snapshot, self.source.database_name())?;
            archive_name = Some(archive.name.clone());

            let upload = self
                .uploader
                .upload(&self.folder, &archive.name, &archive.bytes)
                .await?;
            match &upload {
                UploadOutcome::Uploaded(_) => info!("✅ Compressed and uploaded: {}", archive.name),
                UploadOutcome::Skipped(_) => info!("⏭ {} already present, nothing uploaded", archive.name),
            }
            Ok(upload)
        }
        .await;

        UnitOutcome {
            name: name.to_string(),
            archive_name,
            documents,
            skipped_documents,
            status: match result {
                Ok(upload) => upload.into(),
                Err(e) => UnitStatus::Failed(e),
            },
        }
    }
}

/// Uploads every `*.zip` directly under `dir`. Unreadable archives and failed
/// uploads are recorded per file; the loop always continues.
pub async fn upload_directory(
    uploader: &Uploader<'_>,
    folder: &str,
    dir: &Path,
    show_progress: bool,
) -> anyhow::Result<BatchReport> {
    if !dir.is_dir() {
        anyhow::bail!("Upload source is not a directory: {}", dir.display());
    }

    let mut files: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk directory: {}", dir.display()))?;
        let path = entry.path();
        if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("zip") {
            files.push(path.to_path_buf());
        }
    }

    let mut tracker = ProgressTracker::new(files.len() as u64, show_progress);
    let mut outcomes = Vec::with_capacity(files.len());

    for path in files {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        tracker.start_unit(&format!("Uploading {}", name));

        let status = match read_archive(&path) {
            Ok(bytes) => match uploader.upload(folder, &name, &bytes).await {
                Ok(outcome) => outcome.into(),
                Err(e) => UnitStatus::Failed(e),
            },
            Err(e) => {
                error!("❌ {}", e);
                UnitStatus::Failed(e)
            }
        };

        outcomes.push(UnitOutcome {
            name: name.clone(),
            archive_name: Some(name),
            documents: 0,
            skipped_documents: 0,
            status,
        });
        tracker.finish_unit();
    }

    let elapsed = tracker.finish();
    Ok(BatchReport { outcomes, elapsed })
}

fn read_archive(path: &Path) -> Result<Vec<u8>> {
    let bytes = fs::read(path)
        .map_err(|e| BackupError::InvalidArchive(format!("{}: {}", path.display(), e)))?;
    archive_entries(&bytes)
        .map_err(|e| BackupError::InvalidArchive(format!("{}: {:#}", path.display(), e)))?;
    Ok(bytes)
}
