//! Shared counter store
//!
//! [`SharedCounterStore`] is the sole mutator of the shared inventory. It never
//! edits its cached copy: every mutation is committed to the backing document
//! store, and observers (the committer included) only see the change once the
//! commit comes back through the observation link.
//!
//! Draws are read-modify-write against a fresh read, committed with a
//! conditional write keyed on the read version and retried under the
//! configured [`RetryPolicy`](countkun_core::RetryPolicy). Resets are
//! unconditional replacements.

use std::sync::Arc;
use std::time::Duration;

use countkun_core::effects::{
    AuthorizationEffects, DocumentError, DocumentStoreEffects, PhysicalTimeEffects,
};
use countkun_core::{
    ChartPoint, CounterVector, HistoryEntry, Rank, SharedState, StoreError, StoreResult, Version,
    VersionedDocument,
};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info, instrument, warn};

use crate::config::{ConfigError, StoreConfig};
use crate::link::{LinkContext, LinkHandle};
use crate::subscription::Subscription;
use crate::view::{RankSummary, StoreView, SyncPhase};

// ===== Link bookkeeping =====

#[derive(Debug, Default)]
struct LinkState {
    handle: Option<LinkHandle>,
    subscribers: usize,
    generation: u64,
}

pub(crate) struct StoreInner {
    config: StoreConfig,
    documents: Arc<dyn DocumentStoreEffects>,
    time: Arc<dyn PhysicalTimeEffects>,
    auth: Arc<dyn AuthorizationEffects>,
    view: Arc<watch::Sender<StoreView>>,
    link: Mutex<LinkState>,
}

impl StoreInner {
    fn link_context(&self) -> LinkContext {
        LinkContext {
            key: self.config.document_key.clone(),
            reconnect_delay_ms: self.config.reconnect_delay_ms,
            documents: self.documents.clone(),
            time: self.time.clone(),
            auth: self.auth.clone(),
            view: self.view.clone(),
        }
    }

    /// Drop one subscriber of `generation`; the last one stops the link.
    pub(crate) fn release(&self, generation: u64) {
        let mut link = self.link.lock();
        if link.generation != generation {
            return;
        }
        link.subscribers = link.subscribers.saturating_sub(1);
        if link.subscribers == 0 {
            self.stop(&mut link);
        }
    }

    /// Stop the link and return to `Uninitialized`; caller holds the lock.
    fn stop(&self, link: &mut LinkState) {
        link.generation += 1;
        link.subscribers = 0;
        if let Some(handle) = link.handle.take() {
            handle.shutdown();
            info!(key = %self.config.document_key, "Observation link torn down");
        }
        self.view.send_replace(StoreView::default());
    }
}

// ===== Store =====

/// Shared five-rank prize counter store.
///
/// Clones share one observation link and one view. Building a store does not
/// contact the backing store; observation starts with the first
/// [`subscribe`](Self::subscribe).
#[derive(Clone)]
pub struct SharedCounterStore {
    inner: Arc<StoreInner>,
}

impl SharedCounterStore {
    /// Create a store over the given collaborators.
    pub fn new<D, T, A>(
        config: StoreConfig,
        documents: D,
        time: T,
        auth: A,
    ) -> Result<Self, ConfigError>
    where
        D: DocumentStoreEffects + 'static,
        T: PhysicalTimeEffects + 'static,
        A: AuthorizationEffects + 'static,
    {
        config.validate()?;
        let (view, _) = watch::channel(StoreView::default());
        Ok(Self {
            inner: Arc::new(StoreInner {
                config,
                documents: Arc::new(documents),
                time: Arc::new(time),
                auth: Arc::new(auth),
                view: Arc::new(view),
                link: Mutex::new(LinkState::default()),
            }),
        })
    }

    /// Configuration this store runs with
    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    // ----- Observation -----

    /// Start observing the shared document, or join the running observation.
    ///
    /// The first subscription moves the store to `Syncing` and spawns the
    /// observation link, which seeds the document if it does not exist yet.
    /// Must be called from within a tokio runtime.
    pub fn subscribe(&self) -> Subscription {
        let mut link = self.inner.link.lock();
        link.subscribers += 1;
        if link.handle.is_none() {
            info!(key = %self.inner.config.document_key, "Starting observation link");
            self.inner.view.send_replace(StoreView {
                phase: SyncPhase::Syncing,
                document: None,
            });
            link.handle = Some(LinkHandle::spawn(self.inner.link_context()));
        }
        let generation = link.generation;
        let updates = WatchStream::new(self.inner.view.subscribe());
        drop(link);

        Subscription::new(self.inner.clone(), generation, updates)
    }

    /// Stop observing regardless of outstanding subscriptions.
    ///
    /// Existing handles see an `Uninitialized` view and no longer count as
    /// subscribers.
    pub fn teardown(&self) {
        let mut link = self.inner.link.lock();
        self.inner.stop(&mut link);
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.inner.link.lock().subscribers
    }

    /// Current view
    pub fn view(&self) -> StoreView {
        self.inner.view.borrow().clone()
    }

    /// Current phase
    pub fn phase(&self) -> SyncPhase {
        self.inner.view.borrow().phase.clone()
    }

    /// Whether no authoritative snapshot has arrived yet
    pub fn loading(&self) -> bool {
        self.inner.view.borrow().loading()
    }

    /// Last authoritative counts; all zero before the first snapshot
    pub fn counts(&self) -> CounterVector {
        self.inner.view.borrow().counts()
    }

    /// Last authoritative history
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.inner.view.borrow().history().to_vec()
    }

    /// History rows for a line chart
    pub fn chart_points(&self) -> Vec<ChartPoint> {
        self.inner.view.borrow().chart_points()
    }

    /// Per-rank rows using the configured low-stock threshold
    pub fn summaries(&self) -> Vec<RankSummary> {
        self.inner
            .view
            .borrow()
            .summaries(self.inner.config.low_stock_threshold)
    }

    /// Wait until this store has observed `version` or a later commit.
    ///
    /// Returns the view that satisfied the wait, or `None` if the store is
    /// torn down first.
    pub async fn observed(&self, version: Version) -> Option<StoreView> {
        let mut receiver = self.inner.view.subscribe();
        let view: StoreView = match receiver
            .wait_for(|view| {
                view.phase == SyncPhase::Uninitialized
                    || view.version().is_some_and(|seen| seen >= version)
            })
            .await
        {
            Ok(view) => (*view).clone(),
            Err(_) => return None,
        };
        (view.phase != SyncPhase::Uninitialized).then_some(view)
    }

    // ----- Mutations -----

    /// Decrement one rank by one, appending the new vector to the history.
    ///
    /// The precondition is checked against the cached counts first, then the
    /// write is computed from a fresh read and committed conditionally on its
    /// version, so the stored count never drops below zero.
    #[instrument(skip(self))]
    pub async fn draw_one(&self, rank: Rank) -> StoreResult<Version> {
        let cached = self.ready_document()?;
        if cached.state.counts().get(rank) == 0 {
            return Err(StoreError::AlreadyZero { rank });
        }

        let key = self.inner.config.document_key.as_str();
        let policy = &self.inner.config.retry;
        let attempts = policy.attempts();

        for attempt in 0..attempts {
            let current = self
                .inner
                .documents
                .read(key)
                .await?
                .ok_or_else(|| StoreError::backend(format!("document {key} does not exist")))?;
            let now_ms = self.inner.time.now_ms().await?;
            let next = current.state.drawn(rank, now_ms)?;
            let counts = next.counts();

            match self
                .inner
                .documents
                .compare_and_swap(key, current.version, next)
                .await
            {
                Ok(version) => {
                    info!(%version, %counts, "Drew one prize");
                    return Ok(version);
                }
                Err(DocumentError::VersionConflict { expected, actual }) => {
                    debug!(
                        attempt = attempt + 1,
                        %expected,
                        %actual,
                        "Conditional write lost to a concurrent writer"
                    );
                    if attempt + 1 < attempts {
                        let delay = policy.calculate_delay(attempt);
                        self.inner.time.sleep_ms(duration_ms(delay)).await?;
                    }
                }
                Err(err) => return Err(err.into()),
            }
        }

        warn!(attempts, "Draw abandoned under contention");
        Err(StoreError::Contention { attempts })
    }

    /// Draw by zero-based rank index.
    pub async fn draw_index(&self, index: usize) -> StoreResult<Version> {
        self.draw_one(Rank::new(index)?).await
    }

    /// Replace the whole state with zero counts and an empty history.
    #[instrument(skip(self))]
    pub async fn reset_all(&self) -> StoreResult<Version> {
        self.ready_document()?;
        let version = self
            .inner
            .documents
            .replace(&self.inner.config.document_key, SharedState::initial())
            .await?;
        info!(%version, "Reset inventory");
        Ok(version)
    }

    /// Start a new round: counts become `initial` and the history restarts
    /// with a single entry holding `initial`.
    #[instrument(skip(self))]
    pub async fn reseed(&self, initial: CounterVector) -> StoreResult<Version> {
        self.ready_document()?;
        let now_ms = self.inner.time.now_ms().await?;
        let version = self
            .inner
            .documents
            .replace(
                &self.inner.config.document_key,
                SharedState::reseeded(initial, now_ms),
            )
            .await?;
        info!(%version, "Reseeded inventory");
        Ok(version)
    }

    /// Reseed from raw values; rejects a wrong length or negative entries.
    pub async fn reseed_from_slice(&self, values: &[i64]) -> StoreResult<Version> {
        let initial = CounterVector::try_from_slice(values)?;
        self.reseed(initial).await
    }

    /// Reseed from form fields; blank fields count as zero.
    pub async fn reseed_from_inputs<S: AsRef<str>>(&self, inputs: &[S]) -> StoreResult<Version> {
        let initial = CounterVector::parse_inputs(inputs)?;
        self.reseed(initial).await
    }

    /// Cached document, provided mutations are currently allowed.
    fn ready_document(&self) -> StoreResult<VersionedDocument> {
        let view = self.inner.view.borrow();
        match &view.phase {
            SyncPhase::Uninitialized | SyncPhase::Syncing => return Err(StoreError::NotReady),
            SyncPhase::Disconnected { reason } => {
                return Err(StoreError::disconnected(reason.clone()))
            }
            SyncPhase::Synchronized => {}
        }
        if !self.inner.auth.current().is_signed_in() {
            return Err(StoreError::disconnected("no signed-in actor"));
        }
        view.document.clone().ok_or(StoreError::NotReady)
    }
}

impl std::fmt::Debug for SharedCounterStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedCounterStore")
            .field("config", &self.inner.config)
            .field("phase", &self.inner.view.borrow().phase)
            .finish_non_exhaustive()
    }
}

fn duration_ms(delay: Duration) -> u64 {
    u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use countkun_core::effects::DocumentStream;
    use countkun_effects::{MemoryDocumentStore, SessionGate, SimulatedTimeHandler};
    use tokio::sync::Notify;

    /// Backing store whose first fetch never completes
    struct StalledFetch {
        inner: MemoryDocumentStore,
        fetching: Arc<Notify>,
    }

    #[async_trait]
    impl DocumentStoreEffects for StalledFetch {
        async fn get_or_create(
            &self,
            _key: &str,
            _seed: SharedState,
        ) -> Result<VersionedDocument, DocumentError> {
            self.fetching.notify_one();
            futures::future::pending().await
        }

        async fn read(&self, key: &str) -> Result<Option<VersionedDocument>, DocumentError> {
            self.inner.read(key).await
        }

        async fn compare_and_swap(
            &self,
            key: &str,
            expected: Version,
            state: SharedState,
        ) -> Result<Version, DocumentError> {
            self.inner.compare_and_swap(key, expected, state).await
        }

        async fn replace(&self, key: &str, state: SharedState) -> Result<Version, DocumentError> {
            self.inner.replace(key, state).await
        }

        async fn watch(&self, key: &str) -> Result<DocumentStream, DocumentError> {
            self.inner.watch(key).await
        }
    }

    const ACTOR: &str = "operator@example.com";

    fn store_with(documents: MemoryDocumentStore, gate: SessionGate) -> SharedCounterStore {
        SharedCounterStore::new(
            StoreConfig::for_testing(),
            documents,
            SimulatedTimeHandler::with_step(1_000, 1),
            gate,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_mutations_before_subscribe_are_not_ready() {
        let store = store_with(MemoryDocumentStore::new(), SessionGate::signed_in(ACTOR));
        assert_eq!(store.phase(), SyncPhase::Uninitialized);
        assert!(store.loading());
        assert_matches!(store.draw_index(0).await, Err(StoreError::NotReady));
        assert_matches!(store.reset_all().await, Err(StoreError::NotReady));
    }

    #[tokio::test]
    async fn test_mutations_while_syncing_are_not_ready() {
        let documents = MemoryDocumentStore::new();
        documents
            .get_or_create(DEFAULT_KEY, SharedState::reseeded(CounterVector::new([2; 5]), 0))
            .await
            .unwrap();
        let fetching = Arc::new(Notify::new());
        let store = SharedCounterStore::new(
            StoreConfig::for_testing(),
            StalledFetch {
                inner: documents.clone(),
                fetching: fetching.clone(),
            },
            SimulatedTimeHandler::with_step(1_000, 1),
            SessionGate::signed_in(ACTOR),
        )
        .unwrap();

        let _subscription = store.subscribe();
        fetching.notified().await;
        assert_eq!(store.phase(), SyncPhase::Syncing);
        assert!(store.loading());

        assert_matches!(store.draw_index(0).await, Err(StoreError::NotReady));
        assert_matches!(store.reset_all().await, Err(StoreError::NotReady));
        assert_matches!(
            store.reseed(CounterVector::new([1; 5])).await,
            Err(StoreError::NotReady)
        );
        assert_eq!(documents.version(DEFAULT_KEY).await, Some(Version::FIRST));
    }

    #[tokio::test]
    async fn test_first_subscribe_seeds_empty_document() {
        let documents = MemoryDocumentStore::new();
        let store = store_with(documents.clone(), SessionGate::signed_in(ACTOR));

        let mut subscription = store.subscribe();
        let document = subscription.next_snapshot().await.unwrap();
        assert_eq!(document.version, Version::FIRST);
        assert!(document.state.counts().is_zero());
        assert!(document.state.history().is_empty());
        assert!(!store.loading());
        assert_eq!(
            documents.version(DEFAULT_KEY).await,
            Some(Version::FIRST)
        );
    }

    #[tokio::test]
    async fn test_draw_index_out_of_range() {
        let store = store_with(MemoryDocumentStore::new(), SessionGate::signed_in(ACTOR));
        assert_matches!(
            store.draw_index(5).await,
            Err(StoreError::InvalidInput { .. })
        );
    }

    #[tokio::test]
    async fn test_last_unsubscribe_tears_down() {
        let store = store_with(MemoryDocumentStore::new(), SessionGate::signed_in(ACTOR));
        let mut first = store.subscribe();
        let second = store.subscribe();
        assert_eq!(store.subscriber_count(), 2);
        first
            .wait_for(|view| view.phase == SyncPhase::Synchronized)
            .await
            .unwrap();

        second.unsubscribe();
        assert_eq!(store.phase(), SyncPhase::Synchronized);

        drop(first);
        assert_eq!(store.subscriber_count(), 0);
        assert_eq!(store.phase(), SyncPhase::Uninitialized);
        assert_eq!(store.view().document, None);
    }

    #[tokio::test]
    async fn test_teardown_ends_snapshot_waits() {
        let store = store_with(MemoryDocumentStore::new(), SessionGate::signed_in(ACTOR));
        let mut subscription = store.subscribe();
        subscription.next_snapshot().await.unwrap();

        store.teardown();
        assert_eq!(subscription.next_snapshot().await, None);
        assert_eq!(store.subscriber_count(), 0);

        // A stale handle dropping later must not touch a new generation
        let _fresh = store.subscribe();
        drop(subscription);
        assert_eq!(store.subscriber_count(), 1);
    }

    const DEFAULT_KEY: &str = countkun_core::DEFAULT_DOCUMENT_KEY;
}
