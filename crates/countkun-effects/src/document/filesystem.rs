//! Filesystem document store handler
//!
//! Each document is one JSON file holding `{ version, state }`. Writes go to a
//! uniquely named temporary file in the store directory that is synced and
//! renamed over the target, so a reader never sees a half-written document.
//!
//! Every write path loads, checks and commits while holding an exclusive
//! advisory lock on the store's `LOCK` file, so handles in other processes
//! serialize with this one. Change notifications are delivered to watchers in
//! the same process only.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use countkun_core::effects::{
    DocumentError, DocumentEvent, DocumentStoreEffects, DocumentStream, VersionedDocument,
};
use countkun_core::{SharedState, Version};
use fs2::FileExt;
use tempfile::NamedTempFile;
use tokio::fs;
use tokio::sync::Mutex;
use tokio::task;
use tracing::{debug, info, warn};

use super::{event_stream, ChangeFeed, DEFAULT_FEED_CAPACITY};

/// Sidecar file every writer locks before touching a document
pub const LOCK_FILE_NAME: &str = "LOCK";

/// Exclusive advisory lock on the store directory, released on drop
#[derive(Debug)]
struct DirectoryLock {
    file: File,
}

impl DirectoryLock {
    fn acquire(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        file.lock_exclusive()?;
        Ok(Self { file })
    }
}

impl Drop for DirectoryLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!(error = %e, "Failed to release store lock");
        }
    }
}

#[derive(Debug)]
struct FileInner {
    base_path: PathBuf,
    write_lock: Mutex<()>,
    feed: ChangeFeed,
}

/// JSON-file backed document store
#[derive(Debug, Clone)]
pub struct FileDocumentStore {
    inner: Arc<FileInner>,
}

impl FileDocumentStore {
    /// Open (creating if needed) a store rooted at `base_path`
    pub async fn open(base_path: impl Into<PathBuf>) -> Result<Self, DocumentError> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path).await.map_err(|e| {
            DocumentError::io(format!(
                "Failed to create store directory {}: {e}",
                base_path.display()
            ))
        })?;
        info!(path = %base_path.display(), "Opened file document store");

        Ok(Self {
            inner: Arc::new(FileInner {
                base_path,
                write_lock: Mutex::new(()),
                feed: ChangeFeed::new(DEFAULT_FEED_CAPACITY),
            }),
        })
    }

    /// File that holds the document for `key`
    pub fn document_path(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.inner.base_path.join(format!("{file_name}.json"))
    }

    async fn load(&self, key: &str) -> Result<Option<VersionedDocument>, DocumentError> {
        let path = self.document_path(key);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(DocumentError::io(format!(
                    "Failed to read {}: {e}",
                    path.display()
                )))
            }
        };

        let document: VersionedDocument = serde_json::from_slice(&bytes)?;
        document
            .state
            .validate()
            .map_err(|e| DocumentError::serialization(e.to_string()))?;
        Ok(Some(document))
    }

    /// Take the cross-process write lock; blocks a worker thread, not the runtime.
    async fn lock_directory(&self) -> Result<DirectoryLock, DocumentError> {
        let path = self.inner.base_path.join(LOCK_FILE_NAME);
        task::spawn_blocking(move || {
            DirectoryLock::acquire(&path).map_err(|e| {
                DocumentError::io(format!("Failed to lock {}: {e}", path.display()))
            })
        })
        .await
        .map_err(|e| DocumentError::io(format!("Lock task failed: {e}")))?
    }

    /// Write data atomically: unique temp file, sync, rename
    async fn write_atomic(&self, path: &Path, data: Vec<u8>) -> Result<(), DocumentError> {
        let dir = self.inner.base_path.clone();
        let target = path.to_path_buf();
        task::spawn_blocking(move || {
            let mut file = NamedTempFile::new_in(&dir)
                .map_err(|e| DocumentError::io(format!("Failed to create temp file: {e}")))?;
            file.write_all(&data)
                .map_err(|e| DocumentError::io(format!("Failed to write data: {e}")))?;
            file.as_file()
                .sync_all()
                .map_err(|e| DocumentError::io(format!("Failed to sync: {e}")))?;
            file.persist(&target)
                .map(|_| ())
                .map_err(|e| DocumentError::io(format!("Failed to rename temp file: {e}")))
        })
        .await
        .map_err(|e| DocumentError::io(format!("Write task failed: {e}")))?
    }

    /// Persist `state` as the version after `current`; caller holds both locks.
    async fn commit(
        &self,
        key: &str,
        current: Option<Version>,
        state: SharedState,
    ) -> Result<Version, DocumentError> {
        let version = current.map_or(Version::FIRST, Version::next);
        let document = VersionedDocument::new(version, state);
        let bytes = serde_json::to_vec_pretty(&document)?;
        self.write_atomic(&self.document_path(key), bytes).await?;

        debug!(key, %version, "Committed document to disk");
        self.inner
            .feed
            .publish(key, DocumentEvent::Committed(document));
        Ok(version)
    }
}

#[async_trait]
impl DocumentStoreEffects for FileDocumentStore {
    async fn get_or_create(
        &self,
        key: &str,
        seed: SharedState,
    ) -> Result<VersionedDocument, DocumentError> {
        let _guard = self.inner.write_lock.lock().await;
        let _lock = self.lock_directory().await?;
        if let Some(document) = self.load(key).await? {
            return Ok(document);
        }
        let version = self.commit(key, None, seed.clone()).await?;
        info!(key, %version, "Seeded document on disk");
        Ok(VersionedDocument::new(version, seed))
    }

    async fn read(&self, key: &str) -> Result<Option<VersionedDocument>, DocumentError> {
        self.load(key).await
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Version,
        state: SharedState,
    ) -> Result<Version, DocumentError> {
        let _guard = self.inner.write_lock.lock().await;
        let _lock = self.lock_directory().await?;
        let actual = self
            .load(key)
            .await?
            .map(|document| document.version)
            .ok_or_else(|| DocumentError::not_found(key))?;
        if actual != expected {
            return Err(DocumentError::VersionConflict { expected, actual });
        }
        self.commit(key, Some(actual), state).await
    }

    async fn replace(&self, key: &str, state: SharedState) -> Result<Version, DocumentError> {
        let _guard = self.inner.write_lock.lock().await;
        let _lock = self.lock_directory().await?;
        let current = self.load(key).await?.map(|document| document.version);
        self.commit(key, current, state).await
    }

    async fn watch(&self, key: &str) -> Result<DocumentStream, DocumentError> {
        let receiver = self.inner.feed.subscribe(key);
        Ok(event_stream(receiver, self.clone(), key.to_string()))
    }
}
