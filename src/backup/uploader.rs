// mongodrive-backup/src/backup/uploader.rs
use tracing::{error, info, warn};

use crate::config::RetryPolicy;
use crate::errors::{BackupError, Result};
use crate::storage::{RemoteFile, RemoteStore};

/// Terminal, non-error outcomes of an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// A new remote file was created.
    Uploaded(RemoteFile),
    /// A live file with the same folder and name already existed.
    Skipped(RemoteFile),
}

impl UploadOutcome {
    pub fn remote_file(&self) -> &RemoteFile {
        match self {
            UploadOutcome::Uploaded(file) | UploadOutcome::Skipped(file) => file,
        }
    }
}

/// Pushes named buffers to a remote folder, never creating a second file
/// with the same `(folder, name)`.
///
/// The existence check and the create are two separate calls, so two
/// concurrent runs can both pass the check. Runs are expected to be
/// single-instance.
pub struct Uploader<'a> {
    store: &'a dyn RemoteStore,
    policy: RetryPolicy,
}

impl<'a> Uploader<'a> {
    pub fn new(store: &'a dyn RemoteStore, policy: RetryPolicy) -> Self {
        Uploader { store, policy }
    }

    async fn lookup(&self, folder: &str, name: &str) -> Result<Option<RemoteFile>> {
        self.store.find_file(folder, name).await
    }

    /// Whether a live file named `name` is already under `folder`.
    pub async fn exists(&self, folder: &str, name: &str) -> Result<bool> {
        Ok(self.lookup(folder, name).await?.is_some())
    }

    /// Existence check first, then up to `max_attempts` creates.
    pub async fn upload(&self, folder: &str, name: &str, bytes: &[u8]) -> Result<UploadOutcome> {
        match self.lookup(folder, name).await {
            Ok(Some(existing)) => {
                warn!("⚠ Skipping upload, file already exists in destination: {}", name);
                return Ok(UploadOutcome::Skipped(existing));
            }
            Ok(None) => {}
            Err(e) => {
                error!("❌ Failed to check existing files for {}: {}", name, e);
                return Err(BackupError::Upload {
                    name: name.to_string(),
                    attempts: 0,
                    reason: format!("existence check failed: {}", e),
                });
            }
        }

        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.store.create_file(folder, name, bytes).await {
                Ok(file) => {
                    info!(
                        "✅ Successfully uploaded {} to {} (id: {})",
                        name,
                        self.store.describe(),
                        file.id
                    );
                    return Ok(UploadOutcome::Uploaded(file));
                }
                Err(e) => {
                    error!("❌ Upload of {} failed on attempt {}: {}", name, attempt, e);
                    if attempt >= max_attempts {
                        error!("❌ All retries failed. Unable to upload {}.", name);
                        return Err(BackupError::Upload {
                            name: name.to_string(),
                            attempts: attempt,
                            reason: e.to_string(),
                        });
                    }
                    info!("Retrying upload of {}... attempt {}", name, attempt + 1);
                    tokio::time::sleep(self.policy.retry_delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::testing::MemoryStore;
    use std::time::Duration;
    use tokio::time::Instant;

    fn policy(max_attempts: u32, delay_secs: u64) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            retry_delay: Duration::from_secs(delay_secs),
        }
    }

    #[tokio::test]
    async fn test_second_upload_of_same_name_is_skipped() {
        let store = MemoryStore::new();
        let uploader = Uploader::new(&store, RetryPolicy::default());

        let first = uploader.upload("folder", "a.zip", b"one").await.unwrap();
        let second = uploader.upload("folder", "a.zip", b"two").await.unwrap();

        assert!(matches!(first, UploadOutcome::Uploaded(_)));
        assert!(matches!(second, UploadOutcome::Skipped(_)));
        assert_eq!(first.remote_file(), second.remote_file());
        assert_eq!(store.file_count(), 1);
        assert_eq!(store.create_calls(), 1);
        assert_eq!(store.contents("folder", "a.zip").unwrap(), b"one");
        // One existence lookup per upload, shared with `exists`.
        assert_eq!(store.find_calls(), 2);
        assert!(uploader.exists("folder", "a.zip").await.unwrap());
        assert_eq!(store.find_calls(), 3);
    }

    #[tokio::test]
    async fn test_same_name_in_other_folder_is_uploaded() {
        let store = MemoryStore::new().with_existing("folder-a", "a.zip");
        let uploader = Uploader::new(&store, RetryPolicy::default());

        let outcome = uploader.upload("folder-b", "a.zip", b"x").await.unwrap();

        assert!(matches!(outcome, UploadOutcome::Uploaded(_)));
        assert_eq!(store.file_count(), 2);
    }

    #[tokio::test]
    async fn test_exists_reports_remote_state() {
        let store = MemoryStore::new().with_existing("folder", "orders_shop.zip");
        let uploader = Uploader::new(&store, RetryPolicy::default());

        assert!(uploader.exists("folder", "orders_shop.zip").await.unwrap());
        assert!(!uploader.exists("folder", "users_shop.zip").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_transfer_is_bounded() {
        let store = MemoryStore::always_failing();
        let uploader = Uploader::new(&store, policy(3, 2));

        let started = Instant::now();
        let err = uploader.upload("folder", "a.zip", b"x").await.unwrap_err();

        assert_eq!(store.create_calls(), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(4));
        match err {
            BackupError::Upload { name, attempts, reason } => {
                assert_eq!(name, "a.zip");
                assert_eq!(attempts, 3);
                assert!(reason.contains("transfer 3 refused"), "last error surfaced: {}", reason);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_are_retried() {
        let store = MemoryStore::failing_first(2);
        let uploader = Uploader::new(&store, policy(3, 2));

        let outcome = uploader.upload("folder", "a.zip", b"x").await.unwrap();

        assert!(matches!(outcome, UploadOutcome::Uploaded(_)));
        assert_eq!(store.create_calls(), 3);
        assert_eq!(store.file_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_attempt_policy_does_not_wait() {
        let store = MemoryStore::always_failing();
        let uploader = Uploader::new(&store, policy(1, 30));

        let started = Instant::now();
        assert!(uploader.upload("folder", "a.zip", b"x").await.is_err());

        assert_eq!(store.create_calls(), 1);
        assert!(started.elapsed() < Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_failed_existence_check_never_creates() {
        let store = MemoryStore::failing_lookups();
        let uploader = Uploader::new(&store, RetryPolicy::default());

        let err = uploader.upload("folder", "a.zip", b"x").await.unwrap_err();

        assert!(matches!(err, BackupError::Upload { attempts: 0, .. }));
        assert_eq!(store.create_calls(), 0);
        assert_eq!(store.find_calls(), 1);
        assert!(uploader.exists("folder", "a.zip").await.is_err());
    }
}
