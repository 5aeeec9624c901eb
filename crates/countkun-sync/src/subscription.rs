//! Subscription handles
//!
//! A [`Subscription`] is a stream of [`StoreView`] snapshots that owns its own
//! teardown: dropping the last live handle stops the observation link and
//! returns the store to `Uninitialized`.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use countkun_core::{Version, VersionedDocument};
use futures::{Stream, StreamExt};
use tokio_stream::wrappers::WatchStream;

use crate::store::StoreInner;
use crate::view::{StoreView, SyncPhase};

/// Live view of a [`SharedCounterStore`](crate::SharedCounterStore).
///
/// The first item is the view at the time of subscribing; every later item is
/// a change. Intermediate views may be skipped when the consumer is slow, but
/// items always follow commit order. After teardown the stream yields an
/// `Uninitialized` view and then waits for the store to be subscribed again.
pub struct Subscription {
    inner: Arc<StoreInner>,
    generation: u64,
    updates: WatchStream<StoreView>,
    last_version: Option<Version>,
}

impl Subscription {
    pub(crate) fn new(
        inner: Arc<StoreInner>,
        generation: u64,
        updates: WatchStream<StoreView>,
    ) -> Self {
        Self {
            inner,
            generation,
            updates,
            last_version: None,
        }
    }

    /// Wait for the next authoritative document this handle has not yet
    /// returned.
    ///
    /// Phase-only changes are skipped. Returns `None` once the store is torn
    /// down.
    pub async fn next_snapshot(&mut self) -> Option<VersionedDocument> {
        while let Some(view) = self.updates.next().await {
            if view.phase == SyncPhase::Uninitialized {
                return None;
            }
            let Some(document) = view.document else {
                continue;
            };
            if self
                .last_version
                .map_or(true, |seen| document.version != seen)
            {
                self.last_version = Some(document.version);
                return Some(document);
            }
        }
        None
    }

    /// Wait until a view satisfies `predicate`, returning that view.
    pub async fn wait_for<F>(&mut self, mut predicate: F) -> Option<StoreView>
    where
        F: FnMut(&StoreView) -> bool,
    {
        while let Some(view) = self.updates.next().await {
            if predicate(&view) {
                return Some(view);
            }
            if view.phase == SyncPhase::Uninitialized {
                return None;
            }
        }
        None
    }

    /// Stop observing. Equivalent to dropping the handle.
    pub fn unsubscribe(self) {}
}

impl Stream for Subscription {
    type Item = StoreView;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.updates).poll_next(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.inner.release(self.generation);
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("generation", &self.generation)
            .field("last_version", &self.last_version)
            .finish_non_exhaustive()
    }
}
