// mongodrive-backup/src/storage/local.rs
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};

use super::{RemoteFile, RemoteStore};
use crate::config::LocalStoreConfig;
use crate::errors::{BackupError, Result};
use crate::utils::write_file_atomically;

/// Archives kept on local disk under `root_dir/<folder>/<name>`.
pub struct LocalStore {
    root_dir: PathBuf,
}

impl LocalStore {
    pub fn new(cfg: &LocalStoreConfig) -> Self {
        LocalStore {
            root_dir: cfg.root_dir.clone(),
        }
    }

    fn file_path(&self, folder: &str, name: &str) -> Result<PathBuf> {
        let folder_path = Path::new(folder);
        if folder_path
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(BackupError::Storage(format!("Invalid folder name: {}", folder)));
        }
        let name_path = Path::new(name);
        if name.is_empty() || name_path.components().count() != 1 || name_path.file_name().is_none() {
            return Err(BackupError::Storage(format!("Invalid file name: {}", name)));
        }
        Ok(self.root_dir.join(folder_path).join(name))
    }
}

#[async_trait]
impl RemoteStore for LocalStore {
    fn describe(&self) -> String {
        format!("local directory {}", self.root_dir.display())
    }

    async fn find_file(&self, folder: &str, name: &str) -> Result<Option<RemoteFile>> {
        let path = self.file_path(folder, name)?;
        let exists = tokio::fs::try_exists(&path)
            .await
            .map_err(|e| BackupError::storage(&format!("Failed to stat {}", path.display()), e))?;

        Ok(exists.then(|| RemoteFile {
            id: path.display().to_string(),
            name: name.to_string(),
            folder: folder.to_string(),
        }))
    }

    async fn create_file(&self, folder: &str, name: &str, bytes: &[u8]) -> Result<RemoteFile> {
        let path = self.file_path(folder, name)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                BackupError::storage(&format!("Failed to create directory {}", parent.display()), e)
            })?;
        }

        let target = path.clone();
        let data = bytes.to_vec();
        tokio::task::spawn_blocking(move || write_file_atomically(&target, &data))
            .await
            .map_err(|e| BackupError::storage("Local write task failed", e))?
            .map_err(|e| BackupError::storage(&format!("Failed to write {}", path.display()), e))?;

        Ok(RemoteFile {
            id: path.display().to_string(),
            name: name.to_string(),
            folder: folder.to_string(),
        })
    }
}
