//! Document store handlers
//!
//! - [`MemoryDocumentStore`]: in-process store shared by every client handle
//!   cloned from it; used by tests and the CLI simulation
//! - [`FileDocumentStore`]: JSON document on disk with atomic replace
//!
//! Both publish commits through a [`ChangeFeed`], one broadcast channel per
//! document key.

mod filesystem;
mod memory;

pub use filesystem::{FileDocumentStore, LOCK_FILE_NAME};
pub use memory::MemoryDocumentStore;

use std::collections::HashMap;

use countkun_core::effects::{DocumentEvent, DocumentStoreEffects, DocumentStream};
use futures::stream;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Default number of undelivered events buffered per watcher.
pub const DEFAULT_FEED_CAPACITY: usize = 64;

/// Per-key broadcast of commit notifications.
#[derive(Debug)]
pub(crate) struct ChangeFeed {
    senders: Mutex<HashMap<String, broadcast::Sender<DocumentEvent>>>,
    capacity: usize,
}

impl ChangeFeed {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            senders: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub(crate) fn subscribe(&self, key: &str) -> broadcast::Receiver<DocumentEvent> {
        let mut senders = self.senders.lock();
        senders
            .entry(key.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Deliver an event to every current watcher of `key`.
    pub(crate) fn publish(&self, key: &str, event: DocumentEvent) {
        let senders = self.senders.lock();
        if let Some(sender) = senders.get(key) {
            // No receivers is fine: nobody is watching right now
            let delivered = sender.send(event).unwrap_or(0);
            debug!(key, delivered, "Published document event");
        }
    }

    /// Deliver an event to every watcher of every key.
    pub(crate) fn publish_all(&self, event: &DocumentEvent) {
        let senders = self.senders.lock();
        for sender in senders.values() {
            let _ = sender.send(event.clone());
        }
    }
}

/// Turn a feed receiver into a [`DocumentStream`].
///
/// A watcher that falls behind the feed buffer skips straight to a fresh read
/// of the document instead of replaying the commits it missed; versions keep
/// increasing, so notifications stay in commit order.
pub(crate) fn event_stream<S>(
    receiver: broadcast::Receiver<DocumentEvent>,
    store: S,
    key: String,
) -> DocumentStream
where
    S: DocumentStoreEffects + Clone + 'static,
{
    Box::pin(stream::unfold(
        (receiver, store, key),
        |(mut receiver, store, key)| async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => return Some((event, (receiver, store, key))),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(key, skipped, "Watcher lagged behind, refetching document");
                        let event = match store.read(&key).await {
                            Ok(Some(document)) => DocumentEvent::Committed(document),
                            Ok(None) => continue,
                            Err(err) => DocumentEvent::Disconnected {
                                reason: err.to_string(),
                            },
                        };
                        return Some((event, (receiver, store, key)));
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        },
    ))
}
