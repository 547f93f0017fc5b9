// mongodrive-backup/src/storage/s3.rs
use async_trait::async_trait;
use aws_sdk_s3 as s3;
use s3::config::Region;
use s3::primitives::ByteStream;
use tracing::debug;

use super::{RemoteFile, RemoteStore};
use crate::config::SpacesConfig;
use crate::errors::{BackupError, Result};

/// S3-compatible object storage (AWS, DigitalOcean Spaces, MinIO).
/// The remote folder is a key prefix inside the configured bucket.
pub struct S3Store {
    client: s3::Client,
    bucket_name: String,
    endpoint_url: String,
}

impl S3Store {
    pub async fn connect(spaces_config: &SpacesConfig) -> Self {
        let sdk_config = aws_config::defaults(s3::config::BehaviorVersion::latest())
            .endpoint_url(&spaces_config.endpoint_url)
            .region(Region::new(spaces_config.region.clone()))
            .credentials_provider(s3::config::Credentials::new(
                &spaces_config.access_key_id,
                &spaces_config.secret_access_key,
                None, // session_token
                None, // expiry
                "Static",
            ))
            .load()
            .await;

        S3Store {
            client: s3::Client::new(&sdk_config),
            bucket_name: spaces_config.bucket_name.clone(),
            endpoint_url: spaces_config.endpoint_url.clone(),
        }
    }
}

pub(crate) fn object_key(folder: &str, name: &str) -> String {
    let folder = folder.trim_matches('/');
    if folder.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", folder, name)
    }
}

#[async_trait]
impl RemoteStore for S3Store {
    fn describe(&self) -> String {
        format!("s3://{} at {}", self.bucket_name, self.endpoint_url)
    }

    async fn find_file(&self, folder: &str, name: &str) -> Result<Option<RemoteFile>> {
        let key = object_key(folder, name);
        debug!("HEAD s3://{}/{}", self.bucket_name, key);

        match self
            .client
            .head_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .send()
            .await
        {
            Ok(_) => Ok(Some(RemoteFile {
                id: key,
                name: name.to_string(),
                folder: folder.to_string(),
            })),
            Err(err) if err.as_service_error().is_some_and(|e| e.is_not_found()) => Ok(None),
            Err(err) => Err(BackupError::storage(
                &format!("Failed to check s3://{}/{}", self.bucket_name, key),
                s3::error::DisplayErrorContext(err),
            )),
        }
    }

    async fn create_file(&self, folder: &str, name: &str, bytes: &[u8]) -> Result<RemoteFile> {
        let key = object_key(folder, name);
        debug!("PUT s3://{}/{} ({} bytes)", self.bucket_name, key, bytes.len());

        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .content_type("application/zip")
            .body(ByteStream::from(bytes.to_vec()))
            .send()
            .await
            .map_err(|err| {
                BackupError::storage(
                    &format!("Failed to upload to s3://{}/{}", self.bucket_name, key),
                    s3::error::DisplayErrorContext(err),
                )
            })?;

        Ok(RemoteFile {
            id: key,
            name: name.to_string(),
            folder: folder.to_string(),
        })
    }
}
