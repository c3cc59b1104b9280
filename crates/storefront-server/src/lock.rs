//! Distributed mutual exclusion over the KV store.
//!
//! A lock is a key holding the holder id, created with `SET NX PX`. Release
//! goes through [`KvScript::ReleaseLock`] so a holder whose TTL ran out can
//! never delete a lock that was re-acquired by somebody else.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use storefront_kv::{DynKvStore, KvError, KvScript};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("Lock store error: {0}")]
    Kv(#[from] KvError),
}

pub type LockResult<T> = Result<T, LockError>;

/// Hands out locks whose holder ids are unique per process and per call.
#[derive(Clone)]
pub struct LockClient {
    kv: DynKvStore,
    instance: Arc<str>,
    next_holder: Arc<AtomicU64>,
}

impl LockClient {
    pub fn new(kv: DynKvStore) -> Self {
        Self {
            kv,
            instance: Uuid::new_v4().simple().to_string().into(),
            next_holder: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Creates a handle for `key` with a fresh holder identity.
    ///
    /// Nothing is acquired until [`DistributedLock::try_lock`] is called.
    pub fn lock(&self, key: impl Into<String>) -> DistributedLock {
        let seq = self.next_holder.fetch_add(1, Ordering::Relaxed);
        DistributedLock {
            kv: self.kv.clone(),
            key: key.into(),
            holder: format!("{}-{seq}", self.instance),
        }
    }
}

/// One acquisition attempt on one key. Not reentrant.
pub struct DistributedLock {
    kv: DynKvStore,
    key: String,
    holder: String,
}

impl DistributedLock {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn holder(&self) -> &str {
        &self.holder
    }

    /// Returns `true` iff this call created the lock entry.
    ///
    /// `false` means contention, not failure.
    pub async fn try_lock(&self, ttl: Duration) -> LockResult<bool> {
        let acquired = self.kv.set_nx(&self.key, &self.holder, ttl).await?;
        tracing::trace!(key = %self.key, acquired, "try_lock");
        Ok(acquired)
    }

    /// Deletes the lock if it still belongs to this holder.
    ///
    /// Returns `false` when the lock had already expired or changed hands.
    pub async fn unlock(&self) -> LockResult<bool> {
        let released = self
            .kv
            .eval(
                KvScript::ReleaseLock,
                std::slice::from_ref(&self.key),
                std::slice::from_ref(&self.holder),
            )
            .await?;
        if released == 0 {
            tracing::debug!(key = %self.key, "Lock no longer held at release");
        }
        Ok(released == 1)
    }
}
