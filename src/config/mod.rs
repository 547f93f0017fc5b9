// mongodrive-backup/src/config/mod.rs
use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_RETRY_DELAY_SECONDS: u64 = 2;
const DEFAULT_JSON_DIR: &str = "json";
const DEFAULT_ZIP_DIR: &str = "zip";

// Environment variables that take precedence over config.json values.
pub const ENV_MONGO_URI: &str = "MONGO_URI";
pub const ENV_DATABASE_NAME: &str = "DATABASE_NAME";
pub const ENV_DRIVE_FOLDER_ID: &str = "GOOGLE_DRIVE_FOLDER_ID";
pub const ENV_DRIVE_ACCESS_TOKEN: &str = "GOOGLE_DRIVE_ACCESS_TOKEN";

// Structs for deserializing config.json
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum JsonDestinationConfig {
    S3 {
        bucket_name: Option<String>,
        region: Option<String>,
        access_key_id: Option<String>,
        secret_access_key: Option<String>,
        endpoint_url: Option<String>,
        folder_prefix: Option<String>,
    },
    Drive {
        folder_id: Option<String>,
        access_token: Option<String>,
        api_base_url: Option<String>,
    },
    Local {
        root_dir: Option<PathBuf>,
        folder: Option<String>,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JsonUploadOptions {
    pub max_retries: Option<u32>,
    pub retry_delay_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JsonLocalDirs {
    pub json_dir: Option<PathBuf>,
    pub zip_dir: Option<PathBuf>,
    pub remove_after_compression: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawJsonConfig {
    pub mongo_uri: Option<String>,
    pub database_name: Option<String>,
    pub collections: Option<Vec<String>>,
    pub destination: Option<JsonDestinationConfig>,
    pub upload: Option<JsonUploadOptions>,
    pub local_dirs: Option<JsonLocalDirs>,
}

// Application's internal configuration structs
#[derive(Debug, Clone)]
pub struct SpacesConfig {
    pub endpoint_url: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket_name: String,
    pub folder_prefix: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DriveConfig {
    pub folder_id: String,
    pub access_token: String,
    pub api_base_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LocalStoreConfig {
    pub root_dir: PathBuf,
    pub folder: Option<String>,
}

#[derive(Debug, Clone)]
pub enum DestinationConfig {
    S3(SpacesConfig),
    Drive(DriveConfig),
    Local(LocalStoreConfig),
}

impl DestinationConfig {
    /// Remote folder identity handed to the uploader: a key prefix for S3,
    /// a folder id for Drive, a subdirectory for the local store.
    pub fn folder_id(&self) -> &str {
        match self {
            DestinationConfig::S3(cfg) => cfg.folder_prefix.as_deref().unwrap_or(""),
            DestinationConfig::Drive(cfg) => &cfg.folder_id,
            DestinationConfig::Local(cfg) => cfg.folder.as_deref().unwrap_or(""),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of transfer attempts, including the first one.
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: DEFAULT_MAX_RETRIES,
            retry_delay: Duration::from_secs(DEFAULT_RETRY_DELAY_SECONDS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LocalDirs {
    pub json_dir: PathBuf,
    pub zip_dir: PathBuf,
    pub remove_after_compression: bool,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub mongo_uri: String,
    pub database_name: String,
    pub collections: Option<Vec<String>>,
    pub destination: DestinationConfig,
    pub retry: RetryPolicy,
    pub local_dirs: LocalDirs,
}

impl AppConfig {
    /// Reads config.json and applies environment overrides. This is the only
    /// place the process environment is consulted.
    pub fn load_from_json(config_path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file at {}", config_path.display()))?;
        let raw_json_config: RawJsonConfig = serde_json::from_str(&config_content)
            .with_context(|| {
                format!(
                    "Failed to parse JSON from config file at {}",
                    config_path.display()
                )
            })?;

        Self::from_raw(raw_json_config, |key| env::var(key).ok())
    }

    pub fn from_raw<F>(raw: RawJsonConfig, lookup_env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

        let mongo_uri = non_empty(lookup_env(ENV_MONGO_URI))
            .or_else(|| non_empty(raw.mongo_uri.clone()))
            .context("mongo_uri must be set in config.json (or MONGO_URI in the environment)")?;
        let database_name = non_empty(lookup_env(ENV_DATABASE_NAME))
            .or_else(|| non_empty(raw.database_name.clone()))
            .context("database_name must be set in config.json (or DATABASE_NAME in the environment)")?;

        let collections = match raw.collections {
            Some(names) => {
                if names.iter().any(|name| name.trim().is_empty()) {
                    anyhow::bail!("collections in config.json must not contain empty names: {:?}", names);
                }
                Some(names)
            }
            None => None,
        };

        let destination = parse_destination(raw.destination, &lookup_env)?;
        let retry = parse_retry_policy(raw.upload.unwrap_or_default())?;

        let dirs = raw.local_dirs.unwrap_or_default();
        let local_dirs = LocalDirs {
            json_dir: dirs.json_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_JSON_DIR)),
            zip_dir: dirs.zip_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_ZIP_DIR)),
            remove_after_compression: dirs.remove_after_compression.unwrap_or(true),
        };

        Ok(AppConfig {
            mongo_uri,
            database_name,
            collections,
            destination,
            retry,
            local_dirs,
        })
    }
}

fn parse_destination<F>(
    raw: Option<JsonDestinationConfig>,
    lookup_env: &F,
) -> Result<DestinationConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = raw.context("destination must be defined in config.json")?;
    let required = |value: Option<String>, field: &str| -> Result<String> {
        value
            .filter(|s| !s.trim().is_empty())
            .with_context(|| format!("destination.{} must be set in config.json", field))
    };

    match raw {
        JsonDestinationConfig::S3 {
            bucket_name,
            region,
            access_key_id,
            secret_access_key,
            endpoint_url,
            folder_prefix,
        } => {
            let endpoint_url = required(endpoint_url, "endpoint_url")?;
            url::Url::parse(&endpoint_url)
                .with_context(|| format!("destination.endpoint_url is not a valid URL: {}", endpoint_url))?;
            Ok(DestinationConfig::S3(SpacesConfig {
                bucket_name: required(bucket_name, "bucket_name")?,
                region: required(region, "region")?,
                access_key_id: required(access_key_id, "access_key_id")?,
                secret_access_key: required(secret_access_key, "secret_access_key")?,
                endpoint_url,
                folder_prefix: folder_prefix.filter(|s| !s.is_empty()),
            }))
        }
        JsonDestinationConfig::Drive {
            folder_id,
            access_token,
            api_base_url,
        } => Ok(DestinationConfig::Drive(DriveConfig {
            folder_id: required(lookup_env(ENV_DRIVE_FOLDER_ID).or(folder_id), "folder_id")?,
            access_token: required(
                lookup_env(ENV_DRIVE_ACCESS_TOKEN).or(access_token),
                "access_token",
            )?,
            api_base_url: api_base_url.filter(|s| !s.is_empty()),
        })),
        JsonDestinationConfig::Local { root_dir, folder } => {
            let root_dir = root_dir.context("destination.root_dir must be set in config.json")?;
            if root_dir.as_os_str().is_empty() {
                anyhow::bail!("destination.root_dir cannot be empty in config.json.");
            }
            Ok(DestinationConfig::Local(LocalStoreConfig {
                root_dir,
                folder: folder.filter(|s| !s.is_empty()),
            }))
        }
    }
}

fn parse_retry_policy(raw: JsonUploadOptions) -> Result<RetryPolicy> {
    let max_attempts = raw.max_retries.unwrap_or(DEFAULT_MAX_RETRIES);
    if max_attempts == 0 {
        anyhow::bail!("upload.max_retries must be at least 1 (it counts the first attempt).");
    }
    Ok(RetryPolicy {
        max_attempts,
        retry_delay: Duration::from_secs(raw.retry_delay_seconds.unwrap_or(DEFAULT_RETRY_DELAY_SECONDS)),
    })
}
