//! Store error taxonomy
//!
//! Every mutating operation returns a [`StoreResult`] the caller must inspect.
//! None of these errors is fatal to the process.

use serde::{Deserialize, Serialize};

use crate::effects::{DocumentError, TimeError};
use crate::history::HistoryError;
use crate::types::Rank;

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by the shared counter store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum StoreError {
    /// Mutation attempted before the first authoritative snapshot arrived
    #[error("Store is not ready: no authoritative snapshot received yet")]
    NotReady,

    /// Observation link lost, or no signed-in actor
    #[error("Store is disconnected: {reason}")]
    Disconnected {
        /// What took the link down
        reason: String,
    },

    /// Decrement attempted on an exhausted rank
    #[error("{rank} is already exhausted")]
    AlreadyZero {
        /// Rank that had no remaining count
        rank: Rank,
    },

    /// Conditional write kept losing to concurrent writers
    #[error("Conditional write abandoned after {attempts} attempts")]
    Contention {
        /// Number of conditional writes attempted
        attempts: u32,
    },

    /// Malformed caller input
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// Description of what was wrong with the input
        message: String,
    },

    /// Backing store failed for a reason other than link loss
    #[error("Backing store error: {message}")]
    Backend {
        /// Error message reported by the backing store
        message: String,
    },

    /// Internal invariant violated
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the violated invariant
        message: String,
    },
}

impl StoreError {
    /// Create a disconnected error
    pub fn disconnected(reason: impl Into<String>) -> Self {
        Self::Disconnected {
            reason: reason.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a backing store error
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether the end user should simply try again once the store is
    /// synchronized.
    pub fn is_try_again(&self) -> bool {
        matches!(self, Self::NotReady | Self::Disconnected { .. })
    }
}

impl From<DocumentError> for StoreError {
    fn from(err: DocumentError) -> Self {
        match err {
            DocumentError::Unavailable { reason } => Self::Disconnected { reason },
            other => Self::backend(other.to_string()),
        }
    }
}

impl From<TimeError> for StoreError {
    fn from(err: TimeError) -> Self {
        Self::internal(err.to_string())
    }
}

impl From<HistoryError> for StoreError {
    fn from(err: HistoryError) -> Self {
        Self::internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Version;

    #[test]
    fn test_unavailable_maps_to_disconnected() {
        let err: StoreError = DocumentError::unavailable("link down").into();
        assert_eq!(err, StoreError::disconnected("link down"));
        assert!(err.is_try_again());
    }

    #[test]
    fn test_conflict_maps_to_backend() {
        let err: StoreError = DocumentError::VersionConflict {
            expected: Version::new(1),
            actual: Version::new(2),
        }
        .into();
        assert!(matches!(err, StoreError::Backend { .. }));
        assert!(!err.is_try_again());
    }

    #[test]
    fn test_already_zero_message_uses_label() {
        let err = StoreError::AlreadyZero { rank: Rank::ALL[1] };
        assert_eq!(err.to_string(), "2等 is already exhausted");
    }
}
