//! Durable write of one admitted intent.

use std::time::Duration;

use storefront_core::OrderIntent;
use storefront_storage::{DynStorage, StorageError};

use super::error::SeckillResult;
use crate::keys::order_lock_key;
use crate::lock::LockClient;

/// What happened to one intent. Only infrastructure faults are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    Created,
    /// The user already has an order for this voucher; the intent is dropped.
    Duplicate,
    /// Durable stock was already zero.
    SoldOut,
    /// Another intent for the same user is being persisted right now.
    LockUnavailable,
}

impl PersistOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Duplicate => "duplicate",
            Self::SoldOut => "sold_out",
            Self::LockUnavailable => "lock_unavailable",
        }
    }
}

/// Writes orders under the per-user lock, re-checking uniqueness and durable
/// stock inside one transaction.
#[derive(Clone)]
pub struct OrderPersister {
    storage: DynStorage,
    locks: LockClient,
    lock_ttl: Duration,
}

impl OrderPersister {
    pub fn new(storage: DynStorage, locks: LockClient, lock_ttl: Duration) -> Self {
        Self {
            storage,
            locks,
            lock_ttl,
        }
    }

    pub async fn persist(&self, intent: &OrderIntent) -> SeckillResult<PersistOutcome> {
        let lock = self.locks.lock(order_lock_key(intent.user_id));
        if !lock.try_lock(self.lock_ttl).await? {
            tracing::warn!(
                order_id = intent.order_id,
                user_id = intent.user_id,
                "Order for this user already in flight, dropping intent"
            );
            return Ok(PersistOutcome::LockUnavailable);
        }

        let result = self.persist_locked(intent).await;

        if let Err(e) = lock.unlock().await {
            tracing::warn!(key = %lock.key(), error = %e, "Failed to release order lock");
        }

        let outcome = result?;
        match outcome {
            PersistOutcome::Created => tracing::info!(
                order_id = intent.order_id,
                user_id = intent.user_id,
                voucher_id = intent.voucher_id,
                "Order persisted"
            ),
            PersistOutcome::Duplicate => tracing::warn!(
                order_id = intent.order_id,
                user_id = intent.user_id,
                voucher_id = intent.voucher_id,
                "User already has an order for this voucher, intent discarded"
            ),
            PersistOutcome::SoldOut => tracing::error!(
                order_id = intent.order_id,
                voucher_id = intent.voucher_id,
                "Durable stock exhausted for an admitted intent"
            ),
            PersistOutcome::LockUnavailable => {}
        }
        Ok(outcome)
    }

    async fn persist_locked(&self, intent: &OrderIntent) -> SeckillResult<PersistOutcome> {
        let mut tx = self.storage.begin_transaction().await?;

        if tx.order_exists(intent.user_id, intent.voucher_id).await? {
            tx.rollback().await?;
            return Ok(PersistOutcome::Duplicate);
        }

        if !tx.decrement_stock(intent.voucher_id).await? {
            tx.rollback().await?;
            return Ok(PersistOutcome::SoldOut);
        }

        match tx.insert_order(&intent.clone().into_order()).await {
            Ok(()) => {}
            // Lost a race with a writer outside the per-user lock
            Err(StorageError::AlreadyExists { .. }) => {
                tx.rollback().await?;
                return Ok(PersistOutcome::Duplicate);
            }
            Err(e) => return Err(e.into()),
        }

        tx.commit().await?;
        Ok(PersistOutcome::Created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use storefront_core::{SeckillVoucher, now_utc};
    use storefront_db_memory::InMemoryStorage;
    use storefront_kv::{KvStore, MemoryKvStore};
    use storefront_storage::StorefrontStorage;

    async fn setup(stock: i32) -> (OrderPersister, Arc<InMemoryStorage>, Arc<MemoryKvStore>) {
        let storage = Arc::new(InMemoryStorage::new());
        let now = now_utc();
        storage
            .create_voucher(&SeckillVoucher {
                voucher_id: 1,
                stock,
                begin_time: now - Duration::from_secs(60),
                end_time: now + Duration::from_secs(3600),
            })
            .await
            .unwrap();
        let kv = Arc::new(MemoryKvStore::new());
        let persister = OrderPersister::new(
            storage.clone(),
            LockClient::new(kv.clone()),
            Duration::from_secs(10),
        );
        (persister, storage, kv)
    }

    fn intent(order_id: i64, user_id: i64) -> OrderIntent {
        OrderIntent {
            order_id,
            user_id,
            voucher_id: 1,
            created_at: now_utc(),
        }
    }

    #[tokio::test]
    async fn test_creates_order_and_decrements_stock() {
        let (persister, storage, kv) = setup(2).await;
        let outcome = persister.persist(&intent(100, 7)).await.unwrap();
        assert_eq!(outcome, PersistOutcome::Created);

        assert!(storage.get_order(100).await.unwrap().is_some());
        assert_eq!(storage.get_voucher(1).await.unwrap().unwrap().stock, 1);
        assert_eq!(kv.get("lock:order:7").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_duplicate_is_discarded() {
        let (persister, storage, _) = setup(5).await;
        persister.persist(&intent(100, 7)).await.unwrap();
        let outcome = persister.persist(&intent(101, 7)).await.unwrap();
        assert_eq!(outcome, PersistOutcome::Duplicate);

        assert!(storage.get_order(101).await.unwrap().is_none());
        assert_eq!(storage.count_orders(7, 1).await.unwrap(), 1);
        assert_eq!(storage.get_voucher(1).await.unwrap().unwrap().stock, 4);
    }

    #[tokio::test]
    async fn test_durable_stock_exhausted() {
        let (persister, storage, _) = setup(0).await;
        let outcome = persister.persist(&intent(100, 7)).await.unwrap();
        assert_eq!(outcome, PersistOutcome::SoldOut);
        assert_eq!(storage.order_count().await, 0);
    }

    #[tokio::test]
    async fn test_user_lock_contention_drops_intent() {
        let (persister, storage, kv) = setup(5).await;
        kv.set("lock:order:7", "other-worker", Some(Duration::from_secs(10)))
            .await
            .unwrap();

        let outcome = persister.persist(&intent(100, 7)).await.unwrap();
        assert_eq!(outcome, PersistOutcome::LockUnavailable);
        assert_eq!(storage.order_count().await, 0);
        // Someone else's lock is left alone
        assert_eq!(kv.get("lock:order:7").await.unwrap().as_deref(), Some("other-worker"));
    }
}
