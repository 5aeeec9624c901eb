//! Sign-in gate handler
//!
//! Holds the current [`AuthState`] and notifies watchers on every change. The
//! store treats signing out exactly like losing the link.

use std::sync::Arc;

use countkun_core::effects::{AuthState, AuthorizationEffects};
use tokio::sync::watch;
use tracing::info;

/// Sign-in state shared by every clone
#[derive(Debug, Clone)]
pub struct SessionGate {
    state: Arc<watch::Sender<AuthState>>,
}

impl SessionGate {
    /// Gate with nobody signed in
    pub fn new() -> Self {
        Self::with_state(AuthState::SignedOut)
    }

    /// Gate with `actor` already signed in
    pub fn signed_in(actor: impl Into<String>) -> Self {
        Self::with_state(AuthState::signed_in(actor))
    }

    fn with_state(state: AuthState) -> Self {
        let (sender, _) = watch::channel(state);
        Self {
            state: Arc::new(sender),
        }
    }

    /// Sign `actor` in, replacing any current actor
    pub fn sign_in(&self, actor: impl Into<String>) {
        let actor = actor.into();
        info!(%actor, "Actor signed in");
        self.state.send_replace(AuthState::signed_in(actor));
    }

    /// Sign the current actor out
    pub fn sign_out(&self) {
        info!("Actor signed out");
        self.state.send_replace(AuthState::SignedOut);
    }
}

impl Default for SessionGate {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthorizationEffects for SessionGate {
    fn current(&self) -> AuthState {
        self.state.borrow().clone()
    }

    fn watch(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_watchers_see_sign_out() {
        let gate = SessionGate::signed_in("operator@example.com");
        let mut receiver = gate.watch();
        assert_eq!(gate.current().actor(), Some("operator@example.com"));

        gate.sign_out();
        receiver.changed().await.unwrap();
        assert!(!receiver.borrow().is_signed_in());
    }

    #[test]
    fn test_default_is_signed_out() {
        assert_eq!(SessionGate::default().current(), AuthState::SignedOut);
    }
}
