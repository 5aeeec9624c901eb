//! Conditional-write loops racing on one document through both handlers.

use countkun_core::{
    CounterVector, DocumentError, DocumentStoreEffects, Rank, SharedState, DEFAULT_DOCUMENT_KEY,
};
use countkun_effects::document::LOCK_FILE_NAME;
use countkun_effects::{FileDocumentStore, MemoryDocumentStore};
use tempfile::TempDir;

const WRITERS: usize = 4;
const DRAWS_PER_WRITER: usize = 5;

/// Draw `count` prizes of rank 0, retrying each until it commits.
async fn draw_until_committed<S: DocumentStoreEffects>(store: &S, count: usize) {
    let mut now_ms = 0;
    for _ in 0..count {
        loop {
            let current = store
                .read(DEFAULT_DOCUMENT_KEY)
                .await
                .unwrap()
                .unwrap();
            now_ms += 1;
            let next = current.state.drawn(Rank::ALL[0], now_ms).unwrap();
            match store
                .compare_and_swap(DEFAULT_DOCUMENT_KEY, current.version, next)
                .await
            {
                Ok(_) => break,
                Err(DocumentError::VersionConflict { .. }) => tokio::task::yield_now().await,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
    }
}

async fn assert_no_lost_updates<S>(store: S)
where
    S: DocumentStoreEffects + Clone + 'static,
{
    let start = (WRITERS * DRAWS_PER_WRITER) as u32 + 2;
    store
        .get_or_create(
            DEFAULT_DOCUMENT_KEY,
            SharedState::reseeded(CounterVector::new([start, 0, 0, 0, 0]), 0),
        )
        .await
        .unwrap();

    let mut tasks = Vec::new();
    for _ in 0..WRITERS {
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            draw_until_committed(&store, DRAWS_PER_WRITER).await;
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let stored = store.read(DEFAULT_DOCUMENT_KEY).await.unwrap().unwrap();
    assert_eq!(stored.state.counts(), CounterVector::new([2, 0, 0, 0, 0]));
    assert_eq!(stored.state.history().len(), 1 + WRITERS * DRAWS_PER_WRITER);
    assert_eq!(stored.version.value(), 1 + (WRITERS * DRAWS_PER_WRITER) as u64);
    assert!(stored.state.is_consistent());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_memory_store_loses_no_updates() {
    assert_no_lost_updates(MemoryDocumentStore::new()).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_file_store_loses_no_updates() {
    let dir = TempDir::new().unwrap();
    let store = FileDocumentStore::open(dir.path()).await.unwrap();
    assert_no_lost_updates(store).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_separately_opened_file_stores_lose_no_updates() {
    const DRAWS: usize = 10;
    let dir = TempDir::new().unwrap();
    let start = (WRITERS * DRAWS) as u32 + 3;
    let seeder = FileDocumentStore::open(dir.path()).await.unwrap();
    seeder
        .get_or_create(
            DEFAULT_DOCUMENT_KEY,
            SharedState::reseeded(CounterVector::new([start, 0, 0, 0, 0]), 0),
        )
        .await
        .unwrap();

    // One handle per writer, each with its own in-process lock, like separate processes.
    let mut tasks = Vec::new();
    for _ in 0..WRITERS {
        let store = FileDocumentStore::open(dir.path()).await.unwrap();
        tasks.push(tokio::spawn(async move {
            draw_until_committed(&store, DRAWS).await;
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let stored = FileDocumentStore::open(dir.path())
        .await
        .unwrap()
        .read(DEFAULT_DOCUMENT_KEY)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.state.counts(), CounterVector::new([3, 0, 0, 0, 0]));
    assert_eq!(stored.state.history().len(), 1 + WRITERS * DRAWS);
    assert_eq!(stored.version.value(), 1 + (WRITERS * DRAWS) as u64);
    assert!(stored.state.is_consistent());

    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name != LOCK_FILE_NAME && !name.ends_with(".json"))
        .collect();
    assert!(leftovers.is_empty(), "stray temp files: {leftovers:?}");
}
