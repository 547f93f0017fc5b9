// mongodrive-backup/src/backup/archive.rs
use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone};
use std::collections::HashSet;
use std::fmt::Display;
use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::db_dump::CollectionSnapshot;
use crate::errors::BackupError;
use crate::utils::write_file_atomically;

/// A named byte payload inside an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub data: Vec<u8>,
}

/// A fully built, in-memory ZIP archive.
#[derive(Debug, Clone)]
pub struct Archive {
    pub name: String,
    pub entries: Vec<String>,
    pub bytes: Vec<u8>,
}

pub fn per_collection_archive_name(collection: &str, database: &str) -> String {
    format!("{}_{}.zip", collection, database)
}

pub fn bulk_archive_name<Tz>(now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    format!("{}.zip", now.format("%d-%m-%y-%H%M%S"))
}

fn entry_options() -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(CompressionMethod::Deflated)
}

/// Builds a deflate-compressed ZIP in memory.
///
/// Either the whole archive is returned or nothing is: on any failure the
/// partially written buffer is dropped.
pub fn build_archive(name: &str, entries: &[ArchiveEntry]) -> crate::errors::Result<Archive> {
    let mut seen = HashSet::new();
    for entry in entries {
        if !seen.insert(entry.name.as_str()) {
            return Err(BackupError::ArchiveWrite(format!(
                "duplicate entry name '{}' in archive {}",
                entry.name, name
            )));
        }
    }

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for entry in entries {
        writer.start_file(entry.name.as_str(), entry_options())?;
        writer.write_all(&entry.data).map_err(|e| {
            BackupError::ArchiveWrite(format!("failed to write entry '{}' to {}: {}", entry.name, name, e))
        })?;
    }
    let bytes = writer.finish()?.into_inner();

    Ok(Archive {
        name: name.to_string(),
        entries: entries.iter().map(|e| e.name.clone()).collect(),
        bytes,
    })
}

/// One archive holding `<collection>.json`, named `<collection>_<database>.zip`.
pub fn build_per_collection(
    snapshot: CollectionSnapshot,
    database: &str,
) -> crate::errors::Result<Archive> {
    let name = per_collection_archive_name(&snapshot.collection, database);
    let entry = ArchiveEntry {
        name: format!("{}.json", snapshot.collection),
        data: snapshot.data,
    };
    build_archive(&name, &[entry])
}

/// One shared archive with a `<collection>.jsonl` entry per snapshot.
///
/// Returns `Ok(None)` for an empty snapshot list; callers must not upload.
pub fn build_bulk<Tz>(
    snapshots: Vec<CollectionSnapshot>,
    now: &DateTime<Tz>,
) -> crate::errors::Result<Option<Archive>>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    if snapshots.is_empty() {
        return Ok(None);
    }

    let entries: Vec<ArchiveEntry> = snapshots
        .into_iter()
        .map(|snapshot| ArchiveEntry {
            name: format!("{}.jsonl", snapshot.collection),
            data: snapshot.data,
        })
        .collect();

    build_archive(&bulk_archive_name(now), &entries).map(Some)
}

/// Reads every entry of a ZIP archive back into memory.
pub fn archive_entries(bytes: &[u8]) -> Result<Vec<ArchiveEntry>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).context("Not a readable ZIP archive")?;
    let mut entries = Vec::with_capacity(archive.len());

    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .with_context(|| format!("Failed to open archive entry #{}", i))?;
        let name = file.name().to_string();
        let mut data = Vec::new();
        file.read_to_end(&mut data)
            .with_context(|| format!("Failed to decompress archive entry {}", name))?;
        entries.push(ArchiveEntry { name, data });
    }

    Ok(entries)
}

#[derive(Debug, Default)]
pub struct CompressSummary {
    pub written: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
    /// Source files that could not be compressed, with the reason.
    pub failed: Vec<(PathBuf, String)>,
}

impl CompressSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Zips every `*.json` / `*.jsonl` file directly under `input_dir` into
/// `output_dir/<stem>.zip`. Archives that already exist are left alone.
/// A file that cannot be compressed is recorded in `failed` and the loop
/// moves on to the next one.
pub fn compress_directory(
    input_dir: &Path,
    output_dir: &Path,
    remove_originals: bool,
) -> Result<CompressSummary> {
    if !input_dir.is_dir() {
        anyhow::bail!("Source for compression is not a directory: {}", input_dir.display());
    }
    fs::create_dir_all(output_dir).with_context(|| {
        format!("Failed to create archive directory: {}", output_dir.display())
    })?;

    let mut summary = CompressSummary::default();

    for entry in WalkDir::new(input_dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk directory: {}", input_dir.display()))?;
        let path = entry.path();
        if !path.is_file() || !is_export_file(path) {
            continue;
        }

        let (Some(stem), Some(file_name)) = (
            path.file_stem().and_then(|s| s.to_str()),
            path.file_name().and_then(|s| s.to_str()),
        ) else {
            warn!("⚠ Skipping file with non UTF-8 name: {}", path.display());
            continue;
        };

        let zip_path = output_dir.join(format!("{}.zip", stem));
        if zip_path.exists() {
            warn!("⚠ Skipping compression, file already exists: {}", zip_path.display());
            summary.skipped.push(zip_path);
            continue;
        }

        match compress_file(path, file_name, stem, &zip_path, remove_originals) {
            Ok(()) => {
                info!("✅ Compressed file saved in: {}", zip_path.display());
                summary.written.push(zip_path);
            }
            Err(e) => {
                error!("❌ Failed to compress {}: {:#}", path.display(), e);
                summary.failed.push((path.to_path_buf(), format!("{:#}", e)));
            }
        }
    }

    Ok(summary)
}

fn compress_file(
    path: &Path,
    file_name: &str,
    stem: &str,
    zip_path: &Path,
    remove_original: bool,
) -> Result<()> {
    let data = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let archive = build_archive(
        &format!("{}.zip", stem),
        &[ArchiveEntry {
            name: file_name.to_string(),
            data,
        }],
    )?;
    write_file_atomically(zip_path, &archive.bytes)
        .with_context(|| format!("Failed to write archive {}", zip_path.display()))?;

    if remove_original {
        fs::remove_file(path)
            .with_context(|| format!("Failed to remove {} after compression", path.display()))?;
    }
    Ok(())
}

fn is_export_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("json") | Some("jsonl")
    )
}
