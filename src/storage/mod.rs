//! Destination storage backends.
//!
//! Every backend exposes the same two calls the uploader needs: look up a
//! live file by folder and exact name, and create a new file under a folder.
//! Authentication is settled when the backend is built; the uploader only
//! sees an authenticated handle.

pub(crate) mod drive;
pub(crate) mod local;
pub(crate) mod s3;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::DestinationConfig;

/// A file in the destination storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub id: String,
    pub name: String,
    pub folder: String,
}

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Human-readable destination description for logs.
    fn describe(&self) -> String;

    /// Finds a non-deleted file named exactly `name` directly under `folder`.
    async fn find_file(&self, folder: &str, name: &str) -> crate::errors::Result<Option<RemoteFile>>;

    /// Creates a new file. Never overwrites an existing one on purpose; the
    /// caller is expected to have checked with [`RemoteStore::find_file`].
    async fn create_file(
        &self,
        folder: &str,
        name: &str,
        bytes: &[u8],
    ) -> crate::errors::Result<RemoteFile>;
}

/// Builds the backend selected by the configured destination kind.
pub async fn connect_store(destination: &DestinationConfig) -> Result<Box<dyn RemoteStore>> {
    let store: Box<dyn RemoteStore> = match destination {
        DestinationConfig::S3(cfg) => Box::new(s3::S3Store::connect(cfg).await),
        DestinationConfig::Drive(cfg) => Box::new(drive::DriveStore::new(cfg)?),
        DestinationConfig::Local(cfg) => Box::new(local::LocalStore::new(cfg)),
    };
    tracing::info!("🔹 Destination: {}", store.describe());
    Ok(store)
}
