//! Link loss and sign-in changes.

use assert_matches::assert_matches;
use countkun_core::{CounterVector, Rank, StoreError, Version};
use countkun_effects::{MemoryDocumentStore, SessionGate, SimulatedTimeHandler};
use countkun_sync::{SharedCounterStore, StoreConfig, SyncPhase};

const ACTOR: &str = "operator@example.com";

fn build_store(documents: &MemoryDocumentStore, gate: &SessionGate) -> SharedCounterStore {
    SharedCounterStore::new(
        StoreConfig::for_testing(),
        documents.clone(),
        SimulatedTimeHandler::with_step(5_000, 10),
        gate.clone(),
    )
    .unwrap()
}

fn is_disconnected(phase: &SyncPhase) -> bool {
    matches!(phase, SyncPhase::Disconnected { .. })
}

#[tokio::test]
async fn test_link_loss_keeps_stale_snapshot() {
    let documents = MemoryDocumentStore::new();
    let gate = SessionGate::signed_in(ACTOR);
    let store = build_store(&documents, &gate);
    let mut subscription = store.subscribe();
    subscription.next_snapshot().await.unwrap();

    let version = store
        .reseed(CounterVector::new([1, 1, 1, 1, 1]))
        .await
        .unwrap();
    store.observed(version).await.unwrap();

    documents.disconnect("network lost");
    let stale = subscription
        .wait_for(|view| is_disconnected(&view.phase))
        .await
        .unwrap();
    assert!(stale.is_stale());
    assert_eq!(stale.counts(), CounterVector::new([1, 1, 1, 1, 1]));
    assert_eq!(store.counts(), CounterVector::new([1, 1, 1, 1, 1]));

    assert_matches!(
        store.draw_one(Rank::ALL[0]).await,
        Err(StoreError::Disconnected { .. })
    );
    assert_matches!(
        store.reset_all().await,
        Err(StoreError::Disconnected { .. })
    );

    documents.reconnect().await;
    subscription
        .wait_for(|view| view.phase == SyncPhase::Synchronized)
        .await
        .unwrap();

    let version = store.draw_one(Rank::ALL[0]).await.unwrap();
    let view = store.observed(version).await.unwrap();
    assert_eq!(view.counts(), CounterVector::new([0, 1, 1, 1, 1]));
}

#[tokio::test]
async fn test_sign_out_disconnects() {
    let documents = MemoryDocumentStore::new();
    let gate = SessionGate::signed_in(ACTOR);
    let store = build_store(&documents, &gate);
    let mut subscription = store.subscribe();
    subscription.next_snapshot().await.unwrap();

    gate.sign_out();
    assert_matches!(
        store.reseed(CounterVector::new([2, 0, 0, 0, 0])).await,
        Err(StoreError::Disconnected { .. })
    );
    subscription
        .wait_for(|view| is_disconnected(&view.phase))
        .await
        .unwrap();

    gate.sign_in(ACTOR);
    subscription
        .wait_for(|view| view.phase == SyncPhase::Synchronized)
        .await
        .unwrap();
    let version = store
        .reseed(CounterVector::new([2, 0, 0, 0, 0]))
        .await
        .unwrap();
    assert!(store.observed(version).await.is_some());
}

#[tokio::test]
async fn test_subscribing_signed_out_never_syncs() {
    let documents = MemoryDocumentStore::new();
    let gate = SessionGate::new();
    let store = build_store(&documents, &gate);
    let mut subscription = store.subscribe();

    let view = subscription
        .wait_for(|view| is_disconnected(&view.phase))
        .await
        .unwrap();
    assert_eq!(view.document, None);
    assert_eq!(documents.version(countkun_core::DEFAULT_DOCUMENT_KEY).await, None);
    assert_matches!(
        store.draw_one(Rank::ALL[0]).await,
        Err(StoreError::Disconnected { .. })
    );

    gate.sign_in(ACTOR);
    let document = subscription.next_snapshot().await.unwrap();
    assert_eq!(document.version, Version::FIRST);
}

#[tokio::test]
async fn test_stale_notifications_are_ignored() {
    let documents = MemoryDocumentStore::new();
    let gate = SessionGate::signed_in(ACTOR);
    let store = build_store(&documents, &gate);
    let mut subscription = store.subscribe();
    subscription.next_snapshot().await.unwrap();

    let mut last = Version::FIRST;
    for round in 1..=3u32 {
        last = store
            .reseed(CounterVector::new([round, 0, 0, 0, 0]))
            .await
            .unwrap();
    }

    let mut seen = Vec::new();
    while let Some(document) = subscription.next_snapshot().await {
        seen.push(document.version);
        if document.version == last {
            break;
        }
    }
    assert!(seen.windows(2).all(|pair| pair[0] < pair[1]));
    assert_eq!(store.counts(), CounterVector::new([3, 0, 0, 0, 0]));
}
