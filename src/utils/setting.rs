// Source connectivity check run before every pipeline
use tracing::{error, info};

use crate::backup::db_dump::DocumentSource;
use crate::errors::Result;

pub async fn check_source_connection(source: &dyn DocumentSource) -> Result<()> {
    match source.ping().await {
        Ok(()) => {
            info!("✅ Successfully connected to database {}", source.database_name());
            Ok(())
        }
        Err(e) => {
            error!("❌ Failed to connect to database {}: {}", source.database_name(), e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::testing::MemorySource;
    use crate::errors::BackupError;

    #[tokio::test]
    async fn test_reachable_source_passes() {
        let source = MemorySource::new("shop");
        assert!(check_source_connection(&source).await.is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_source_is_source_unavailable() {
        let source = MemorySource::new("shop").failing_listing();
        let err = check_source_connection(&source).await.unwrap_err();
        assert!(matches!(err, BackupError::SourceUnavailable(_)));
    }
}
