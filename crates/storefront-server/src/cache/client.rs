//! Read-through cache facade with three miss strategies.
//!
//! | Strategy | Miss | Stale | Guarantees |
//! |----------|------|-------|------------|
//! | pass-through | load, cache value or null marker | physical TTL | no repeated source hits for unknown ids |
//! | mutex | one caller rebuilds under `lock_prefix + id`, others retry | physical TTL | at most one rebuild in flight per key |
//! | logical expiry | returns `None` (entries are pre-warmed) | served while one background rebuild runs | callers never wait on the source |

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Serialize, de::DeserializeOwned};
use storefront_core::now_utc;
use storefront_kv::DynKvStore;

use super::entry::{Cached, LogicalEntry, NULL_MARKER};
use super::error::{BoxError, CacheError, CacheResult};
use super::rebuild::RebuildPool;
use crate::config::CacheConfig;
use crate::lock::LockClient;
use crate::metrics;

#[derive(Clone)]
pub struct CacheClient {
    kv: DynKvStore,
    locks: LockClient,
    pool: Arc<RebuildPool>,
    config: Arc<CacheConfig>,
}

impl CacheClient {
    pub fn new(
        kv: DynKvStore,
        locks: LockClient,
        pool: Arc<RebuildPool>,
        config: CacheConfig,
    ) -> Self {
        Self {
            kv,
            locks,
            pool,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Stores `value` as JSON with a physical TTL.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> CacheResult<()> {
        let payload = serde_json::to_string(value)?;
        self.kv.set(key, &payload, Some(ttl)).await?;
        tracing::debug!(key = %key, ttl_secs = ttl.as_secs(), "cache set");
        Ok(())
    }

    /// Stores `value` wrapped with a logical expiry `ttl` from now, without a
    /// physical TTL.
    pub async fn set_with_logical_expire<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> CacheResult<()> {
        let entry = LogicalEntry::new(value, now_utc(), ttl);
        let payload = serde_json::to_string(&entry)?;
        self.kv.set(key, &payload, None).await?;
        tracing::debug!(key = %key, expire_time = %entry.expire_time, "cache set (logical expiry)");
        Ok(())
    }

    /// Plain read of a value written by [`CacheClient::set`]. Null markers
    /// read as `None`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> CacheResult<Option<T>> {
        match self.lookup(key).await? {
            Cached::Hit(value) => Ok(Some(value)),
            Cached::Null | Cached::Miss => Ok(None),
        }
    }

    /// Deletes a cached entry.
    pub async fn invalidate(&self, key: &str) -> CacheResult<bool> {
        let removed = self.kv.del(key).await?;
        tracing::debug!(key = %key, removed, "cache invalidate");
        Ok(removed)
    }

    /// Pass-through read: a miss loads from the source and caches either the
    /// value (`ttl`) or a null marker (`null_ttl`).
    pub async fn query_with_pass_through<T, F, Fut, E>(
        &self,
        key_prefix: &str,
        id: i64,
        loader: F,
        ttl: Duration,
    ) -> CacheResult<Option<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(i64) -> Fut,
        Fut: Future<Output = Result<Option<T>, E>>,
        E: Into<BoxError>,
    {
        let key = format!("{key_prefix}{id}");
        match self.lookup(&key).await? {
            Cached::Hit(value) => Ok(Some(value)),
            Cached::Null => Ok(None),
            Cached::Miss => self.load_and_fill(&key, id, loader, ttl).await,
        }
    }

    /// Mutex read: on a miss only the caller holding `lock_prefix + id` loads;
    /// everybody else sleeps `mutex_retry_delay` and looks again, up to
    /// `mutex_max_retries` lookups.
    pub async fn query_with_mutex<T, F, Fut, E>(
        &self,
        key_prefix: &str,
        id: i64,
        loader: F,
        ttl: Duration,
        lock_prefix: &str,
    ) -> CacheResult<Option<T>>
    where
        T: Serialize + DeserializeOwned,
        F: Fn(i64) -> Fut,
        Fut: Future<Output = Result<Option<T>, E>>,
        E: Into<BoxError>,
    {
        let key = format!("{key_prefix}{id}");
        let attempts = self.config.mutex_max_retries;

        for attempt in 0..attempts {
            match self.lookup(&key).await? {
                Cached::Hit(value) => return Ok(Some(value)),
                Cached::Null => return Ok(None),
                Cached::Miss => {}
            }

            let lock = self.locks.lock(format!("{lock_prefix}{id}"));
            if !lock.try_lock(self.config.lock_ttl()).await? {
                tracing::debug!(key = %key, attempt, "Rebuild lock busy, retrying");
                tokio::time::sleep(self.config.mutex_retry_delay()).await;
                continue;
            }

            // The previous holder may have filled the entry already
            let result = match Cached::<T>::decode(self.kv.get(&key).await?) {
                Ok(Cached::Hit(value)) => Ok(Some(value)),
                Ok(Cached::Null) => Ok(None),
                Ok(Cached::Miss) => self.load_and_fill(&key, id, &loader, ttl).await,
                Err(e) => Err(e),
            };

            if let Err(e) = lock.unlock().await {
                tracing::warn!(key = %lock.key(), error = %e, "Failed to release rebuild lock");
            }
            return result;
        }

        tracing::warn!(key = %key, attempts, "Gave up waiting for cache rebuild");
        Err(CacheError::RebuildContended { key, attempts })
    }

    /// Logical-expiry read: a hit is always returned as-is. When it is stale,
    /// the caller that wins `lock_prefix + id` schedules a rebuild on the pool.
    ///
    /// A miss returns `None` without touching the source.
    pub async fn query_with_logical_expire<T, F, Fut, E>(
        &self,
        key_prefix: &str,
        id: i64,
        loader: F,
        ttl: Duration,
        lock_prefix: &str,
    ) -> CacheResult<Option<T>>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
        F: FnOnce(i64) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Option<T>, E>> + Send + 'static,
        E: Into<BoxError> + Send + 'static,
    {
        let key = format!("{key_prefix}{id}");
        let entry = match self.lookup::<LogicalEntry<T>>(&key).await? {
            Cached::Hit(entry) => entry,
            Cached::Null | Cached::Miss => return Ok(None),
        };

        if !entry.is_expired_at(now_utc()) {
            return Ok(Some(entry.data));
        }

        let lock = Arc::new(self.locks.lock(format!("{lock_prefix}{id}")));
        if !lock.try_lock(self.config.lock_ttl()).await? {
            tracing::trace!(key = %key, "Rebuild already in flight");
            return Ok(Some(entry.data));
        }

        let cache = self.clone();
        let job_key = key.clone();
        let job_lock = lock.clone();
        let submitted = self.pool.submit(async move {
            let outcome = match loader(id).await {
                Ok(Some(fresh)) => cache
                    .set_with_logical_expire(&job_key, &fresh, ttl)
                    .await
                    .map(|()| "rebuilt"),
                // Keep serving the stale entry; it is only ever overwritten
                Ok(None) => {
                    tracing::warn!(key = %job_key, "Source no longer has entry, keeping stale value");
                    Ok("absent")
                }
                Err(e) => Err(CacheError::source_error(e)),
            };
            match outcome {
                Ok(outcome) => metrics::record_cache_rebuild(outcome),
                Err(e) => {
                    tracing::error!(key = %job_key, error = %e, "Cache rebuild failed");
                    metrics::record_cache_rebuild("failed");
                }
            }
            if let Err(e) = job_lock.unlock().await {
                tracing::warn!(key = %job_lock.key(), error = %e, "Failed to release rebuild lock");
            }
        });

        if !submitted {
            tracing::warn!(key = %key, "Rebuild pool is shut down, serving stale entry");
            lock.unlock().await?;
        }

        Ok(Some(entry.data))
    }

    async fn lookup<T: DeserializeOwned>(&self, key: &str) -> CacheResult<Cached<T>> {
        let cached = Cached::decode(self.kv.get(key).await?)?;
        match cached {
            Cached::Miss => {
                tracing::debug!(key = %key, "cache miss");
                metrics::record_cache_miss(key);
            }
            _ => {
                tracing::debug!(key = %key, "cache hit");
                metrics::record_cache_hit(key);
            }
        }
        Ok(cached)
    }

    async fn load_and_fill<T, F, Fut, E>(
        &self,
        key: &str,
        id: i64,
        loader: F,
        ttl: Duration,
    ) -> CacheResult<Option<T>>
    where
        T: Serialize,
        F: FnOnce(i64) -> Fut,
        Fut: Future<Output = Result<Option<T>, E>>,
        E: Into<BoxError>,
    {
        match loader(id).await.map_err(CacheError::source_error)? {
            Some(value) => {
                self.set(key, &value, ttl).await?;
                metrics::record_cache_rebuild("rebuilt");
                Ok(Some(value))
            }
            None => {
                self.kv
                    .set(key, NULL_MARKER, Some(self.config.null_ttl()))
                    .await?;
                tracing::debug!(key = %key, "cached null marker");
                metrics::record_cache_rebuild("absent");
                Ok(None)
            }
        }
    }
}
