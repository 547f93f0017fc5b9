//! In-memory source and destination used by the pipeline tests.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use mongodb::bson::{Document, RawDocumentBuf};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use super::db_dump::{DocumentSource, DocumentStream};
use crate::errors::{BackupError, Result};
use crate::storage::{RemoteFile, RemoteStore};

pub fn raw(doc: Document) -> RawDocumentBuf {
    RawDocumentBuf::from_document(&doc).unwrap()
}

/// A document with an invalid element type byte: valid framing, undecodable body.
pub fn malformed_document() -> RawDocumentBuf {
    RawDocumentBuf::from_bytes(vec![8, 0, 0, 0, 0x20, b'a', 0, 0]).unwrap()
}

pub struct MemorySource {
    database: String,
    collections: Vec<(String, Vec<RawDocumentBuf>)>,
    failing: HashSet<String>,
    listing_fails: bool,
}

impl MemorySource {
    pub fn new(database: &str) -> Self {
        MemorySource {
            database: database.to_string(),
            collections: Vec::new(),
            failing: HashSet::new(),
            listing_fails: false,
        }
    }

    pub fn with_collection(mut self, name: &str, docs: Vec<RawDocumentBuf>) -> Self {
        self.collections.push((name.to_string(), docs));
        self
    }

    pub fn failing_collection(mut self, name: &str) -> Self {
        self.failing.insert(name.to_string());
        self
    }

    pub fn failing_listing(mut self) -> Self {
        self.listing_fails = true;
        self
    }
}

#[async_trait]
impl DocumentSource for MemorySource {
    fn database_name(&self) -> &str {
        &self.database
    }

    async fn list_collection_names(&self) -> Result<Vec<String>> {
        if self.listing_fails {
            return Err(BackupError::SourceUnavailable("listing refused".to_string()));
        }
        Ok(self.collections.iter().map(|(name, _)| name.clone()).collect())
    }

    async fn documents(&self, collection: &str) -> Result<DocumentStream> {
        if self.failing.contains(collection) {
            return Err(BackupError::SourceUnavailable(format!("cannot read {}", collection)));
        }
        let docs = self
            .collections
            .iter()
            .find(|(name, _)| name == collection)
            .map(|(_, docs)| docs.clone())
            .unwrap_or_default();
        Ok(stream::iter(docs.into_iter().map(Ok)).boxed())
    }

    async fn ping(&self) -> Result<()> {
        if self.listing_fails {
            return Err(BackupError::SourceUnavailable("ping refused".to_string()));
        }
        Ok(())
    }
}

/// Remote store keeping files in memory, with scriptable transfer failures.
#[derive(Default)]
pub struct MemoryStore {
    files: Mutex<HashMap<(String, String), (RemoteFile, Vec<u8>)>>,
    // Pops one entry per create call: `true` means the transfer fails.
    scripted_failures: Mutex<VecDeque<bool>>,
    always_fail: bool,
    lookup_fails: bool,
    create_calls: Mutex<u32>,
    find_calls: Mutex<u32>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn always_failing() -> Self {
        MemoryStore {
            always_fail: true,
            ..Self::default()
        }
    }

    pub fn failing_lookups() -> Self {
        MemoryStore {
            lookup_fails: true,
            ..Self::default()
        }
    }

    /// The next `n` transfers fail, later ones succeed.
    pub fn failing_first(n: usize) -> Self {
        let store = Self::default();
        store.scripted_failures.lock().unwrap().extend(std::iter::repeat(true).take(n));
        store
    }

    pub fn with_existing(self, folder: &str, name: &str) -> Self {
        let file = RemoteFile {
            id: format!("existing-{}", name),
            name: name.to_string(),
            folder: folder.to_string(),
        };
        self.files
            .lock()
            .unwrap()
            .insert((folder.to_string(), name.to_string()), (file, Vec::new()));
        self
    }

    pub fn create_calls(&self) -> u32 {
        *self.create_calls.lock().unwrap()
    }

    pub fn find_calls(&self) -> u32 {
        *self.find_calls.lock().unwrap()
    }

    pub fn file_count(&self) -> usize {
        self.files.lock().unwrap().len()
    }

    pub fn file_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .files
            .lock()
            .unwrap()
            .keys()
            .map(|(_, name)| name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn contents(&self, folder: &str, name: &str) -> Option<Vec<u8>> {
        self.files
            .lock()
            .unwrap()
            .get(&(folder.to_string(), name.to_string()))
            .map(|(_, bytes)| bytes.clone())
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    async fn find_file(&self, folder: &str, name: &str) -> Result<Option<RemoteFile>> {
        *self.find_calls.lock().unwrap() += 1;
        if self.lookup_fails {
            return Err(BackupError::Storage("lookup refused".to_string()));
        }
        Ok(self
            .files
            .lock()
            .unwrap()
            .get(&(folder.to_string(), name.to_string()))
            .map(|(file, _)| file.clone()))
    }

    async fn create_file(&self, folder: &str, name: &str, bytes: &[u8]) -> Result<RemoteFile> {
        let call = {
            let mut calls = self.create_calls.lock().unwrap();
            *calls += 1;
            *calls
        };
        let scripted = self.scripted_failures.lock().unwrap().pop_front().unwrap_or(false);
        if self.always_fail || scripted {
            return Err(BackupError::Storage(format!("transfer {} refused", call)));
        }

        let file = RemoteFile {
            id: format!("mem-{}", call),
            name: name.to_string(),
            folder: folder.to_string(),
        };
        self.files.lock().unwrap().insert(
            (folder.to_string(), name.to_string()),
            (file.clone(), bytes.to_vec()),
        );
        Ok(file)
    }
}
