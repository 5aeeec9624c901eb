//! Observation link
//!
//! One task per store instance keeps the shared [`StoreView`] in step with the
//! backing document. It starts on the first subscription and is torn down with
//! the last one. The task owns only the collaborators it needs, never the
//! store itself, so dropping every handle releases everything.
//!
//! Phase handling:
//! - no signed-in actor: `Disconnected`, wait for sign-in
//! - watch established and document fetched (created if absent): `Synchronized`
//! - disconnect event from the backing store: `Disconnected`, keep listening
//!   on the same stream until a commit arrives
//! - stream ended or fetch failed: `Disconnected`, retry after the reconnect
//!   delay

use std::sync::Arc;

use countkun_core::effects::{
    AuthState, AuthorizationEffects, DocumentEvent, DocumentStoreEffects, PhysicalTimeEffects,
};
use countkun_core::{SharedState, VersionedDocument};
use futures::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::view::{StoreView, SyncPhase};

/// Collaborators the link task needs, shared with the store.
#[derive(Clone)]
pub(crate) struct LinkContext {
    pub(crate) key: String,
    pub(crate) reconnect_delay_ms: u64,
    pub(crate) documents: Arc<dyn DocumentStoreEffects>,
    pub(crate) time: Arc<dyn PhysicalTimeEffects>,
    pub(crate) auth: Arc<dyn AuthorizationEffects>,
    pub(crate) view: Arc<watch::Sender<StoreView>>,
}

/// Why an observation pass ended.
enum LinkExit {
    SignedOut,
    Lost(String),
    GateClosed,
}

/// A spawned link: its context plus the flag raised at shutdown.
struct LinkTask {
    context: LinkContext,
    stopped: watch::Receiver<bool>,
}

impl LinkTask {
    /// Record an authoritative snapshot.
    ///
    /// Pushed notifications older than what is already shown are dropped so
    /// observers never move backwards; fresh fetches always win.
    fn apply_snapshot(&self, document: VersionedDocument, fetched: bool) {
        if !document.state.is_consistent() {
            warn!(
                version = %document.version,
                "Received document whose counts disagree with its history"
            );
        }

        let stopped = &self.stopped;
        self.context.view.send_if_modified(|view| {
            // A torn-down link must not overwrite the reset view
            if *stopped.borrow() {
                return false;
            }
            let was_synchronized = view.phase == SyncPhase::Synchronized;
            let newer = match view.version() {
                Some(current) => fetched || document.version > current,
                None => true,
            };

            if newer {
                debug!(version = %document.version, "Applied authoritative snapshot");
                view.document = Some(document);
            } else {
                debug!(version = %document.version, "Ignored stale notification");
            }

            if !was_synchronized {
                info!(version = ?view.version(), "Store synchronized");
                view.phase = SyncPhase::Synchronized;
            }
            newer || !was_synchronized
        });
    }

    /// Mark the shown state stale, keeping the last snapshot.
    fn mark_disconnected(&self, reason: &str) {
        let stopped = &self.stopped;
        self.context.view.send_if_modified(|view| match &view.phase {
            _ if *stopped.borrow() => false,
            SyncPhase::Uninitialized => false,
            SyncPhase::Disconnected { reason: current } if current == reason => false,
            _ => {
                warn!(%reason, "Store disconnected");
                view.phase = SyncPhase::Disconnected {
                    reason: reason.to_string(),
                };
                true
            }
        });
    }

    /// Drive the link until the gate goes away.
    async fn run(self) {
        let mut auth = self.context.auth.watch();
        loop {
            let signed_in = auth.borrow_and_update().is_signed_in();
            if !signed_in {
                self.mark_disconnected("no signed-in actor");
                if auth.changed().await.is_err() {
                    return;
                }
                continue;
            }

            match self.observe(&mut auth).await {
                LinkExit::SignedOut => self.mark_disconnected("actor signed out"),
                LinkExit::Lost(reason) => {
                    self.mark_disconnected(&reason);
                    let delay_ms = self.context.reconnect_delay_ms;
                    if let Err(err) = self.context.time.sleep_ms(delay_ms).await {
                        warn!(error = %err, "Reconnect delay failed");
                    }
                }
                LinkExit::GateClosed => return,
            }
        }
    }

    /// One pass: watch, fetch, then follow notifications.
    async fn observe(&self, auth: &mut watch::Receiver<AuthState>) -> LinkExit {
        // Watch before fetching so no commit falls between the two
        let context = &self.context;
        let mut events = match context.documents.watch(&context.key).await {
            Ok(events) => events,
            Err(err) => return LinkExit::Lost(err.to_string()),
        };

        match context
            .documents
            .get_or_create(&context.key, SharedState::initial())
            .await
        {
            Ok(document) => self.apply_snapshot(document, true),
            Err(err) => return LinkExit::Lost(err.to_string()),
        }

        loop {
            tokio::select! {
                changed = auth.changed() => {
                    if changed.is_err() {
                        return LinkExit::GateClosed;
                    }
                    if !auth.borrow_and_update().is_signed_in() {
                        return LinkExit::SignedOut;
                    }
                }
                event = events.next() => match event {
                    Some(DocumentEvent::Committed(document)) => self.apply_snapshot(document, false),
                    Some(DocumentEvent::Disconnected { reason }) => self.mark_disconnected(&reason),
                    None => return LinkExit::Lost("change stream ended".to_string()),
                },
            }
        }
    }
}

/// Running link task with its shutdown signal.
#[derive(Debug)]
pub(crate) struct LinkHandle {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl LinkHandle {
    /// Spawn the link on the current tokio runtime.
    pub(crate) fn spawn(context: LinkContext) -> Self {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let task = LinkTask {
            context,
            stopped: shutdown_rx.clone(),
        };
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = shutdown_rx.changed() => {}
                _ = task.run() => {}
            }
        });
        Self {
            shutdown_tx,
            handle,
        }
    }

    /// Stop observing immediately.
    pub(crate) fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        self.handle.abort();
    }
}
