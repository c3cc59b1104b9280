//! Concurrency properties of the distributed lock and the id generator.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use storefront_kv::{DynKvStore, MemoryKvStore};
use storefront_server::{IdWorker, LockClient};

fn kv() -> DynKvStore {
    Arc::new(MemoryKvStore::new())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_exactly_one_concurrent_try_lock_wins() {
    let locks = LockClient::new(kv());

    let mut handles = Vec::new();
    for _ in 0..32 {
        let lock = locks.lock("lock:shop:1");
        handles.push(tokio::spawn(async move {
            let acquired = lock.try_lock(Duration::from_secs(10)).await.unwrap();
            (acquired, lock)
        }));
    }

    let mut winners = Vec::new();
    for handle in handles {
        let (acquired, lock) = handle.await.unwrap();
        if acquired {
            winners.push(lock);
        }
    }
    assert_eq!(winners.len(), 1);

    assert!(winners[0].unlock().await.unwrap());
    let next = locks.lock("lock:shop:1");
    assert!(next.try_lock(Duration::from_secs(10)).await.unwrap());
}

#[tokio::test]
async fn test_lock_expires_without_unlock() {
    let locks = LockClient::new(kv());
    let crashed = locks.lock("lock:order:1");
    assert!(crashed.try_lock(Duration::from_millis(20)).await.unwrap());

    let waiting = locks.lock("lock:order:1");
    assert!(!waiting.try_lock(Duration::from_secs(10)).await.unwrap());
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert!(waiting.try_lock(Duration::from_secs(10)).await.unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_ids_are_distinct() {
    let ids = IdWorker::new(kv());

    let mut handles = Vec::new();
    for _ in 0..8 {
        let ids = ids.clone();
        handles.push(tokio::spawn(async move {
            let mut out = Vec::with_capacity(100);
            for _ in 0..100 {
                out.push(ids.next_id("order").await.unwrap());
            }
            out
        }));
    }

    let mut all = HashSet::new();
    for handle in handles {
        for id in handle.await.unwrap() {
            assert!(id > 0);
            assert!(all.insert(id), "duplicate id {id}");
        }
    }
    assert_eq!(all.len(), 800);
}

#[tokio::test]
async fn test_ids_grow_over_time() {
    let ids = IdWorker::new(kv());
    let mut previous = ids.next_id("order").await.unwrap();
    for _ in 0..50 {
        let next = ids.next_id("order").await.unwrap();
        assert!(next > previous);
        previous = next;
    }
}
