// mongodrive-backup/src/backup/db_dump.rs
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use mongodb::bson::{RawDocumentBuf, doc};
use mongodb::{Client, Database};
use tracing::{debug, info, warn};

use super::bson_json::document_to_json;
use crate::errors::{BackupError, Result};
use crate::utils::human_bytes;

pub type DocumentStream = BoxStream<'static, Result<RawDocumentBuf>>;

/// Read-only view of the database being backed up.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    fn database_name(&self) -> &str;

    async fn list_collection_names(&self) -> Result<Vec<String>>;

    /// Every document of `collection`, in the store's natural order.
    async fn documents(&self, collection: &str) -> Result<DocumentStream>;

    async fn ping(&self) -> Result<()>;
}

pub struct MongoSource {
    db: Database,
}

impl MongoSource {
    pub async fn connect(uri: &str, database_name: &str) -> Result<Self> {
        let client = Client::with_uri_str(uri)
            .await
            .map_err(|e| BackupError::source_unavailable("Failed to create MongoDB client", e))?;
        Ok(MongoSource {
            db: client.database(database_name),
        })
    }
}

#[async_trait]
impl DocumentSource for MongoSource {
    fn database_name(&self) -> &str {
        self.db.name()
    }

    async fn list_collection_names(&self) -> Result<Vec<String>> {
        self.db.list_collection_names().await.map_err(|e| {
            BackupError::source_unavailable(
                &format!("Failed to list collections of database '{}'", self.db.name()),
                e,
            )
        })
    }

    async fn documents(&self, collection: &str) -> Result<DocumentStream> {
        let cursor = self
            .db
            .collection::<RawDocumentBuf>(collection)
            .find(doc! {})
            .await
            .map_err(|e| {
                BackupError::source_unavailable(
                    &format!("Failed to open cursor on collection '{}'", collection),
                    e,
                )
            })?;

        let name = collection.to_string();
        Ok(cursor
            .map_err(move |e| {
                BackupError::source_unavailable(&format!("Cursor on collection '{}' failed", name), e)
            })
            .boxed())
    }

    async fn ping(&self) -> Result<()> {
        self.db
            .run_command(doc! { "ping": 1 })
            .await
            .map(|_| ())
            .map_err(|e| BackupError::source_unavailable("MongoDB ping failed", e))
    }
}

/// Serialized contents of one collection, one JSON document per line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSnapshot {
    pub collection: String,
    pub documents: u64,
    /// Documents dropped because they could not be decoded.
    pub skipped: u64,
    pub data: Vec<u8>,
}

impl CollectionSnapshot {
    pub fn byte_size(&self) -> usize {
        self.data.len()
    }
}

pub struct Exporter<'a> {
    source: &'a dyn DocumentSource,
}

impl<'a> Exporter<'a> {
    pub fn new(source: &'a dyn DocumentSource) -> Self {
        Exporter { source }
    }

    /// Reads every document of `collection` into a JSON Lines buffer.
    ///
    /// Undecodable documents are skipped and logged; the export goes on.
    /// Source failures (listing, cursor) abort with `SourceUnavailable`.
    pub async fn export(&self, collection: &str) -> Result<CollectionSnapshot> {
        debug!("Exporting collection '{}'", collection);
        let mut stream = self.source.documents(collection).await?;

        let mut data = Vec::new();
        let mut documents = 0u64;
        let mut skipped = 0u64;
        let mut position = 0u64;

        while let Some(item) = stream.next().await {
            let raw = item?;
            position += 1;

            match encode_line(&raw, &mut data) {
                Ok(()) => documents += 1,
                Err(reason) => {
                    let err = BackupError::Serialization {
                        collection: collection.to_string(),
                        position,
                        reason,
                    };
                    warn!("⚠ Skipping document: {}", err);
                    skipped += 1;
                }
            }
        }

        let snapshot = CollectionSnapshot {
            collection: collection.to_string(),
            documents,
            skipped,
            data,
        };
        info!(
            "✅ Exported collection '{}': {} document(s), {} skipped, {}",
            collection,
            documents,
            skipped,
            human_bytes(snapshot.byte_size() as u64)
        );
        Ok(snapshot)
    }
}

// Appends one JSON line; on failure `out` is left untouched.
fn encode_line(raw: &RawDocumentBuf, out: &mut Vec<u8>) -> std::result::Result<(), String> {
    let doc = raw.to_document().map_err(|e| e.to_string())?;
    let line = serde_json::to_vec(&document_to_json(&doc)).map_err(|e| e.to_string())?;
    out.extend_from_slice(&line);
    out.push(b'\n');
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::testing::{MemorySource, malformed_document, raw};
    use mongodb::bson::oid::ObjectId;

    #[tokio::test]
    async fn test_export_writes_one_line_per_document() {
        let source = MemorySource::new("shop")
            .with_collection("users", vec![raw(doc! { "name": "Alice" }), raw(doc! { "name": "Bob" })]);

        let snapshot = Exporter::new(&source).export("users").await.unwrap();

        assert_eq!(snapshot.collection, "users");
        assert_eq!(snapshot.documents, 2);
        assert_eq!(snapshot.skipped, 0);
        let text = String::from_utf8(snapshot.data.clone()).unwrap();
        assert_eq!(text, "{\"name\":\"Alice\"}\n{\"name\":\"Bob\"}\n");
        assert_eq!(snapshot.byte_size(), text.len());
    }

    #[tokio::test]
    async fn test_export_of_empty_collection_is_empty_buffer() {
        let source = MemorySource::new("shop").with_collection("orders", vec![]);

        let snapshot = Exporter::new(&source).export("orders").await.unwrap();

        assert_eq!(snapshot.documents, 0);
        assert!(snapshot.data.is_empty());
    }

    #[tokio::test]
    async fn test_export_coerces_object_ids_to_strings() {
        let oid = ObjectId::new();
        let source = MemorySource::new("shop").with_collection("users", vec![raw(doc! { "_id": oid })]);

        let snapshot = Exporter::new(&source).export("users").await.unwrap();

        let line: serde_json::Value = serde_json::from_slice(&snapshot.data).unwrap();
        assert_eq!(line["_id"], serde_json::Value::String(oid.to_hex()));
    }

    #[tokio::test]
    async fn test_export_skips_undecodable_documents() {
        let source = MemorySource::new("shop").with_collection(
            "users",
            vec![raw(doc! { "n": 1 }), malformed_document(), raw(doc! { "n": 3 })],
        );

        let snapshot = Exporter::new(&source).export("users").await.unwrap();

        assert_eq!(snapshot.documents, 2);
        assert_eq!(snapshot.skipped, 1);
        let text = String::from_utf8(snapshot.data).unwrap();
        assert_eq!(text.lines().collect::<Vec<_>>(), vec!["{\"n\":1}", "{\"n\":3}"]);
    }

    #[tokio::test]
    async fn test_export_of_unreadable_collection_is_source_unavailable() {
        let source = MemorySource::new("shop")
            .with_collection("users", vec![])
            .failing_collection("users");

        let err = Exporter::new(&source).export("users").await.unwrap_err();

        assert!(matches!(err, BackupError::SourceUnavailable(_)));
    }
}
