//! Sign-in gate
//!
//! Credential handling is out of scope; the store only needs to know whether
//! an actor is signed in right now and to be told when that changes. No actor
//! is treated the same as a lost link.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Whether an actor is allowed to mutate the shared inventory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthState {
    /// Nobody is signed in
    #[default]
    SignedOut,
    /// An actor is signed in
    SignedIn {
        /// Actor identifier (e.g. an email address)
        actor: String,
    },
}

impl AuthState {
    /// Create a signed-in state
    pub fn signed_in(actor: impl Into<String>) -> Self {
        Self::SignedIn {
            actor: actor.into(),
        }
    }

    /// Whether an actor is present
    pub fn is_signed_in(&self) -> bool {
        matches!(self, Self::SignedIn { .. })
    }

    /// Signed-in actor, if any
    pub fn actor(&self) -> Option<&str> {
        match self {
            Self::SignedIn { actor } => Some(actor),
            Self::SignedOut => None,
        }
    }
}

/// Watchable authorization signal.
pub trait AuthorizationEffects: Send + Sync {
    /// Current state.
    fn current(&self) -> AuthState;

    /// Receiver that observes every subsequent change.
    fn watch(&self) -> watch::Receiver<AuthState>;
}

impl<T: AuthorizationEffects + ?Sized> AuthorizationEffects for Arc<T> {
    fn current(&self) -> AuthState {
        (**self).current()
    }

    fn watch(&self) -> watch::Receiver<AuthState> {
        (**self).watch()
    }
}
