use thiserror::Error;

/// Failure kinds of the export → archive → upload pipeline.
///
/// A duplicate remote file is not an error; the uploader reports it as
/// [`crate::backup::uploader::UploadOutcome::Skipped`].
#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Source database unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Document {position} of collection '{collection}' could not be serialized: {reason}")]
    Serialization {
        collection: String,
        position: u64,
        reason: String,
    },

    #[error("Archive write failed: {0}")]
    ArchiveWrite(String),

    #[error("Invalid archive: {0}")]
    InvalidArchive(String),

    #[error("Upload of {name} failed after {attempts} attempt(s): {reason}")]
    Upload {
        name: String,
        attempts: u32,
        reason: String,
    },

    #[error("Storage operation failed: {0}")]
    Storage(String),
}

impl BackupError {
    pub fn source_unavailable(context: &str, err: impl std::fmt::Display) -> Self {
        BackupError::SourceUnavailable(format!("{}: {}", context, err))
    }

    pub fn storage(context: &str, err: impl std::fmt::Display) -> Self {
        BackupError::Storage(format!("{}: {}", context, err))
    }
}

impl From<mongodb::error::Error> for BackupError {
    fn from(err: mongodb::error::Error) -> Self {
        BackupError::SourceUnavailable(err.to_string())
    }
}

impl From<zip::result::ZipError> for BackupError {
    fn from(err: zip::result::ZipError) -> Self {
        BackupError::ArchiveWrite(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BackupError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_error_message_names_file_and_attempts() {
        let err = BackupError::Upload {
            name: "users_shop.zip".to_string(),
            attempts: 3,
            reason: "connection reset".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Upload of users_shop.zip failed after 3 attempt(s): connection reset"
        );
    }

    #[test]
    fn test_zip_error_maps_to_archive_write() {
        let err: BackupError = zip::result::ZipError::FileNotFound.into();
        assert!(matches!(err, BackupError::ArchiveWrite(_)));
    }
}
