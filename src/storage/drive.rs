//! Google Drive v3 backend.
//!
//! Talks to the REST API directly with a bearer token obtained elsewhere
//! (service account or interactive consent); token refresh is not handled.

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use super::{RemoteFile, RemoteStore};
use crate::config::DriveConfig;
use crate::errors::{BackupError, Result};

const DEFAULT_API_BASE_URL: &str = "https://www.googleapis.com";

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct DriveFileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

pub struct DriveStore {
    client: reqwest::Client,
    access_token: String,
    api_base_url: String,
}

impl DriveStore {
    pub fn new(cfg: &DriveConfig) -> anyhow::Result<Self> {
        let base = cfg.api_base_url.as_deref().unwrap_or(DEFAULT_API_BASE_URL);
        Url::parse(base).with_context(|| format!("Invalid Drive API base URL: {}", base))?;

        Ok(DriveStore {
            client: reqwest::Client::new(),
            access_token: cfg.access_token.clone(),
            api_base_url: base.trim_end_matches('/').to_string(),
        })
    }
}

/// Escapes a value for a single-quoted Drive query literal.
fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

pub(crate) fn file_lookup_query(folder: &str, name: &str) -> String {
    format!(
        "'{}' in parents and trashed=false and name='{}'",
        escape_query_value(folder),
        escape_query_value(name)
    )
}

/// Body of a `multipart/related` upload: JSON metadata part, then content.
pub(crate) fn multipart_related_body(boundary: &str, metadata: &serde_json::Value, content: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(content.len() + 512);
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata.to_string().as_bytes());
    body.extend_from_slice(format!("\r\n--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(b"Content-Type: application/zip\r\n\r\n");
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body
}

#[async_trait]
impl RemoteStore for DriveStore {
    fn describe(&self) -> String {
        "Google Drive".to_string()
    }

    async fn find_file(&self, folder: &str, name: &str) -> Result<Option<RemoteFile>> {
        let query = file_lookup_query(folder, name);
        debug!("Drive lookup: {}", query);

        let list: DriveFileList = self
            .client
            .get(format!("{}/drive/v3/files", self.api_base_url))
            .bearer_auth(&self.access_token)
            .query(&[("q", query.as_str()), ("fields", "files(id,name)"), ("pageSize", "1")])
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(|e| BackupError::storage("Failed to list Drive files", e))?
            .json()
            .await
            .map_err(|e| BackupError::storage("Unexpected Drive file list response", e))?;

        Ok(list.files.into_iter().next().map(|file| RemoteFile {
            id: file.id,
            name: file.name,
            folder: folder.to_string(),
        }))
    }

    async fn create_file(&self, folder: &str, name: &str, bytes: &[u8]) -> Result<RemoteFile> {
        let boundary = format!("backup-{}", Uuid::new_v4().simple());
        let metadata = json!({ "name": name, "parents": [folder] });
        let body = multipart_related_body(&boundary, &metadata, bytes);

        let created: DriveFile = self
            .client
            .post(format!("{}/upload/drive/v3/files", self.api_base_url))
            .bearer_auth(&self.access_token)
            .query(&[("uploadType", "multipart"), ("fields", "id,name")])
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", boundary),
            )
            .body(body)
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(|e| BackupError::storage(&format!("Failed to upload {} to Drive", name), e))?
            .json()
            .await
            .map_err(|e| BackupError::storage("Unexpected Drive upload response", e))?;

        Ok(RemoteFile {
            id: created.id,
            name: created.name,
            folder: folder.to_string(),
        })
    }
}
