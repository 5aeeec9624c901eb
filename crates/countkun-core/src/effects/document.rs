//! Backing document store contract
//!
//! # Effect Classification
//!
//! - **Category**: Infrastructure Effect
//! - **Implementation**: `countkun-effects` (memory and filesystem handlers)
//! - **Usage**: `SharedCounterStore` in `countkun-sync`
//!
//! A document store keyed by a fixed identifier that supports
//! create-if-absent, a change stream carrying a full snapshot per commit, and
//! a conditional write keyed on the previously read [`Version`].

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::state::SharedState;
use crate::types::Version;

/// Error type for document store operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum DocumentError {
    /// Store cannot be reached
    #[error("Document store unavailable: {reason}")]
    Unavailable {
        /// What made the store unreachable
        reason: String,
    },
    /// Document does not exist
    #[error("Document not found: {key}")]
    NotFound {
        /// Key that was looked up
        key: String,
    },
    /// Conditional write lost to another writer
    #[error("Version conflict: expected {expected}, found {actual}")]
    VersionConflict {
        /// Version the writer read
        expected: Version,
        /// Version currently stored
        actual: Version,
    },
    /// Stored bytes could not be encoded or decoded
    #[error("Serialization failed: {message}")]
    Serialization {
        /// Codec error message
        message: String,
    },
    /// Underlying I/O failed
    #[error("I/O failed: {message}")]
    Io {
        /// I/O error message
        message: String,
    },
}

impl DocumentError {
    /// Create an unavailable error
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create an I/O error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for DocumentError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

/// A committed document together with its commit version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedDocument {
    /// Commit version
    pub version: Version,
    /// Document contents
    pub state: SharedState,
}

impl VersionedDocument {
    /// Pair a state with its version
    pub fn new(version: Version, state: SharedState) -> Self {
        Self { version, state }
    }
}

/// Change notification delivered by [`DocumentStoreEffects::watch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentEvent {
    /// A write committed; carries the full new document
    Committed(VersionedDocument),
    /// The observation link dropped; later commits may be missed until a
    /// fresh snapshot is fetched
    Disconnected {
        /// What took the link down
        reason: String,
    },
}

/// Stream of change notifications for one document, in commit order.
pub type DocumentStream = BoxStream<'static, DocumentEvent>;

/// Durable, subscribable document store.
#[async_trait]
pub trait DocumentStoreEffects: Send + Sync {
    /// Return the document, creating it from `seed` if it does not exist.
    ///
    /// When several callers race, exactly one seed is committed and every
    /// caller receives that document.
    async fn get_or_create(
        &self,
        key: &str,
        seed: SharedState,
    ) -> Result<VersionedDocument, DocumentError>;

    /// Fresh read of the latest committed document.
    async fn read(&self, key: &str) -> Result<Option<VersionedDocument>, DocumentError>;

    /// Commit `state` only if the stored version still equals `expected`.
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Version,
        state: SharedState,
    ) -> Result<Version, DocumentError>;

    /// Commit `state` unconditionally.
    async fn replace(&self, key: &str, state: SharedState) -> Result<Version, DocumentError>;

    /// Subscribe to commits made after this call returns.
    async fn watch(&self, key: &str) -> Result<DocumentStream, DocumentError>;
}

/// Blanket implementation for Arc<T> where T: DocumentStoreEffects
#[async_trait]
impl<T: DocumentStoreEffects + ?Sized> DocumentStoreEffects for Arc<T> {
    async fn get_or_create(
        &self,
        key: &str,
        seed: SharedState,
    ) -> Result<VersionedDocument, DocumentError> {
        (**self).get_or_create(key, seed).await
    }

    async fn read(&self, key: &str) -> Result<Option<VersionedDocument>, DocumentError> {
        (**self).read(key).await
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Version,
        state: SharedState,
    ) -> Result<Version, DocumentError> {
        (**self).compare_and_swap(key, expected, state).await
    }

    async fn replace(&self, key: &str, state: SharedState) -> Result<Version, DocumentError> {
        (**self).replace(key, state).await
    }

    async fn watch(&self, key: &str) -> Result<DocumentStream, DocumentError> {
        (**self).watch(key).await
    }
}
