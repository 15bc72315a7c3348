//! Concurrent appenders must never receive the same version number, and
//! concurrent seeders must never both believe they seeded the corpus.

use std::collections::BTreeSet;
use std::sync::Arc;

use redraft_state::fakes::MemoryVersionStore;
use redraft_state::{
    StorageError, SurrealVersionStore, VersionMetadata, VersionOrigin, VersionStore, SEED_VERSION,
};

async fn race_appenders(store: Arc<dyn VersionStore>, writers: usize) -> Vec<u64> {
    let mut handles = Vec::new();
    for i in 0..writers {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            let origin = if i % 2 == 0 {
                VersionOrigin::Search
            } else {
                VersionOrigin::Manual
            };
            store
                .append(&format!("draft from writer {i}"), VersionMetadata::new(origin))
                .await
                .unwrap()
        }));
    }

    let mut numbers = Vec::new();
    for handle in handles {
        numbers.push(handle.await.unwrap());
    }
    numbers
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn memory_store_assigns_unique_numbers_under_contention() {
    let store: Arc<dyn VersionStore> = Arc::new(MemoryVersionStore::new());
    let numbers = race_appenders(Arc::clone(&store), 32).await;

    let unique: BTreeSet<_> = numbers.iter().copied().collect();
    assert_eq!(unique.len(), 32);
    assert_eq!(unique, (0..32).collect::<BTreeSet<u64>>());
    assert_eq!(store.list_all().await.unwrap().len(), 32);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn surreal_store_assigns_unique_numbers_under_contention() {
    let store: Arc<dyn VersionStore> = Arc::new(SurrealVersionStore::in_memory().await.unwrap());
    let numbers = race_appenders(Arc::clone(&store), 32).await;

    let unique: BTreeSet<_> = numbers.iter().copied().collect();
    assert_eq!(unique, (0..32).collect::<BTreeSet<u64>>());
    assert_eq!(store.list_all().await.unwrap().len(), 32);
}

async fn race_seeders(store: Arc<dyn VersionStore>, seeders: usize) -> (usize, usize) {
    let mut handles = Vec::new();
    for i in 0..seeders {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            store
                .seed(
                    &format!("first draft from seeder {i}"),
                    VersionMetadata::new(VersionOrigin::Seed),
                )
                .await
        }));
    }

    let (mut won, mut lost) = (0, 0);
    for handle in handles {
        match handle.await.unwrap() {
            Ok(n) => {
                assert_eq!(n, SEED_VERSION);
                won += 1;
            }
            Err(StorageError::AlreadySeeded) => lost += 1,
            Err(other) => panic!("unexpected seed error: {other}"),
        }
    }
    (won, lost)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn memory_store_lets_exactly_one_seeder_win() {
    let store: Arc<dyn VersionStore> = Arc::new(MemoryVersionStore::new());
    assert_eq!(race_seeders(Arc::clone(&store), 16).await, (1, 15));
    assert_eq!(store.list_all().await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn surreal_store_lets_exactly_one_seeder_win() {
    let store: Arc<dyn VersionStore> = Arc::new(SurrealVersionStore::in_memory().await.unwrap());
    assert_eq!(race_seeders(Arc::clone(&store), 16).await, (1, 15));

    let versions = store.list_all().await.unwrap();
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].metadata.origin, VersionOrigin::Seed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn surreal_seed_racing_appenders_never_lands_after_version_zero() {
    let store: Arc<dyn VersionStore> = Arc::new(SurrealVersionStore::in_memory().await.unwrap());
    let seeder = {
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            store
                .seed("seed draft", VersionMetadata::new(VersionOrigin::Seed))
                .await
        })
    };
    race_appenders(Arc::clone(&store), 8).await;

    let versions = store.list_all().await.unwrap();
    match seeder.await.unwrap() {
        Ok(n) => {
            assert_eq!(n, SEED_VERSION);
            assert_eq!(versions.len(), 9);
        }
        Err(err) => {
            assert_eq!(err, StorageError::AlreadySeeded);
            assert_eq!(versions.len(), 8);
        }
    }
    let seeds: Vec<u64> = versions
        .iter()
        .filter(|v| v.metadata.origin == VersionOrigin::Seed)
        .map(|v| v.version_number)
        .collect();
    assert!(seeds.iter().all(|&n| n == SEED_VERSION));
}
