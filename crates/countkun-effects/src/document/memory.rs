//! In-memory document store handler
//!
//! Every clone shares the same documents, so several store instances built on
//! clones behave like independent clients of one remote service. Documents are
//! held as encoded JSON so no client can ever alias another client's copy.
//!
//! The handler can simulate a lost link with [`MemoryDocumentStore::disconnect`]
//! and [`MemoryDocumentStore::reconnect`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use countkun_core::effects::{
    DocumentError, DocumentEvent, DocumentStoreEffects, DocumentStream, VersionedDocument,
};
use countkun_core::{SharedState, Version};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{event_stream, ChangeFeed, DEFAULT_FEED_CAPACITY};

#[derive(Debug, Clone)]
struct StoredDocument {
    version: Version,
    bytes: Vec<u8>,
}

impl StoredDocument {
    fn decode(&self) -> Result<VersionedDocument, DocumentError> {
        let state: SharedState = serde_json::from_slice(&self.bytes)?;
        Ok(VersionedDocument::new(self.version, state))
    }
}

#[derive(Debug)]
struct MemoryInner {
    documents: Mutex<HashMap<String, StoredDocument>>,
    feed: ChangeFeed,
    connected: AtomicBool,
}

/// In-memory, versioned, subscribable document store
#[derive(Debug, Clone)]
pub struct MemoryDocumentStore {
    inner: Arc<MemoryInner>,
}

impl MemoryDocumentStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::with_feed_capacity(DEFAULT_FEED_CAPACITY)
    }

    /// Create an empty store buffering at most `capacity` events per watcher
    pub fn with_feed_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                documents: Mutex::new(HashMap::new()),
                feed: ChangeFeed::new(capacity),
                connected: AtomicBool::new(true),
            }),
        }
    }

    /// Simulate link loss: watchers receive a disconnect event and every
    /// operation fails with `Unavailable` until [`Self::reconnect`].
    pub fn disconnect(&self, reason: impl Into<String>) {
        let reason = reason.into();
        self.inner.connected.store(false, Ordering::SeqCst);
        info!(%reason, "Memory document store disconnected");
        self.inner
            .feed
            .publish_all(&DocumentEvent::Disconnected { reason });
    }

    /// Restore the link and re-deliver each document's current snapshot.
    pub async fn reconnect(&self) {
        self.inner.connected.store(true, Ordering::SeqCst);
        info!("Memory document store reconnected");

        let documents = self.inner.documents.lock().await;
        for (key, stored) in documents.iter() {
            if let Ok(document) = stored.decode() {
                self.inner
                    .feed
                    .publish(key, DocumentEvent::Committed(document));
            }
        }
    }

    /// Current committed version of a document, if it exists
    pub async fn version(&self, key: &str) -> Option<Version> {
        let documents = self.inner.documents.lock().await;
        documents.get(key).map(|stored| stored.version)
    }

    fn ensure_connected(&self) -> Result<(), DocumentError> {
        if self.inner.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DocumentError::unavailable("memory document store is disconnected"))
        }
    }

    /// Encode and store `state` as the next version; caller holds the lock.
    fn commit(
        &self,
        documents: &mut HashMap<String, StoredDocument>,
        key: &str,
        state: SharedState,
    ) -> Result<Version, DocumentError> {
        let version = documents
            .get(key)
            .map_or(Version::FIRST, |stored| stored.version.next());
        let bytes = serde_json::to_vec(&state)?;
        documents.insert(key.to_string(), StoredDocument { version, bytes });

        debug!(key, %version, "Committed document");
        self.inner.feed.publish(
            key,
            DocumentEvent::Committed(VersionedDocument::new(version, state)),
        );
        Ok(version)
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStoreEffects for MemoryDocumentStore {
    async fn get_or_create(
        &self,
        key: &str,
        seed: SharedState,
    ) -> Result<VersionedDocument, DocumentError> {
        self.ensure_connected()?;
        let mut documents = self.inner.documents.lock().await;
        if let Some(stored) = documents.get(key) {
            return stored.decode();
        }
        let version = self.commit(&mut documents, key, seed.clone())?;
        info!(key, %version, "Seeded document");
        Ok(VersionedDocument::new(version, seed))
    }

    async fn read(&self, key: &str) -> Result<Option<VersionedDocument>, DocumentError> {
        self.ensure_connected()?;
        let documents = self.inner.documents.lock().await;
        documents.get(key).map(StoredDocument::decode).transpose()
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Version,
        state: SharedState,
    ) -> Result<Version, DocumentError> {
        self.ensure_connected()?;
        let mut documents = self.inner.documents.lock().await;
        let actual = documents
            .get(key)
            .map(|stored| stored.version)
            .ok_or_else(|| DocumentError::not_found(key))?;
        if actual != expected {
            return Err(DocumentError::VersionConflict { expected, actual });
        }
        self.commit(&mut documents, key, state)
    }

    async fn replace(&self, key: &str, state: SharedState) -> Result<Version, DocumentError> {
        self.ensure_connected()?;
        let mut documents = self.inner.documents.lock().await;
        self.commit(&mut documents, key, state)
    }

    async fn watch(&self, key: &str) -> Result<DocumentStream, DocumentError> {
        self.ensure_connected()?;
        let receiver = self.inner.feed.subscribe(key);
        Ok(event_stream(receiver, self.clone(), key.to_string()))
    }
}
