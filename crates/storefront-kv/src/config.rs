//! Redis connection settings and backend selection.

use std::sync::Arc;
use std::time::Duration;

use deadpool_redis::{Pool, Runtime};
use serde::{Deserialize, Serialize};

use crate::error::{KvError, KvResult};
use crate::memory::MemoryKvStore;
use crate::redis_store::RedisKvStore;
use crate::DynKvStore;

/// Redis configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Use Redis. When disabled an in-process store is used instead, which
    /// only works for a single instance.
    /// Default: true
    #[serde(default = "default_redis_enabled")]
    pub enabled: bool,

    /// Redis connection URL (e.g., "redis://localhost:6379")
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Connection pool size
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: usize,

    /// Connection timeout in milliseconds
    #[serde(default = "default_redis_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_redis_enabled() -> bool {
    true
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_redis_pool_size() -> usize {
    16
}

fn default_redis_timeout_ms() -> u64 {
    5000
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            enabled: default_redis_enabled(),
            url: default_redis_url(),
            pool_size: default_redis_pool_size(),
            timeout_ms: default_redis_timeout_ms(),
        }
    }
}

impl RedisConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !self.enabled {
            return Ok(());
        }
        if !(self.url.starts_with("redis://") || self.url.starts_with("rediss://")) {
            return Err(format!("redis.url must be a redis:// URL, got '{}'", self.url));
        }
        if self.pool_size == 0 {
            return Err("redis.pool_size must be > 0".into());
        }
        Ok(())
    }
}

/// Builds a connection pool without connecting.
pub fn create_pool(config: &RedisConfig) -> KvResult<Pool> {
    let timeout = Duration::from_millis(config.timeout_ms);

    let mut redis_config = deadpool_redis::Config::from_url(&config.url);
    let pool_config = redis_config
        .pool
        .get_or_insert_with(|| deadpool_redis::PoolConfig::new(config.pool_size));
    pool_config.max_size = config.pool_size;
    pool_config.timeouts.wait = Some(timeout);
    pool_config.timeouts.create = Some(timeout);
    pool_config.timeouts.recycle = Some(timeout);

    redis_config
        .create_pool(Some(Runtime::Tokio1))
        .map_err(KvError::pool)
}

/// Selects and connects the key-value backend.
///
/// Redis disabled gives a [`MemoryKvStore`]. Redis enabled but unreachable is
/// an error, never a fallback to the in-process store.
pub async fn create_kv_store(config: &RedisConfig) -> KvResult<DynKvStore> {
    if !config.enabled {
        tracing::info!("Redis disabled, using in-process key-value store");
        return Ok(Arc::new(MemoryKvStore::new()));
    }

    tracing::info!(url = %config.url, "Connecting to Redis");
    let pool = create_pool(config)?;

    // Probe once so a bad URL fails at startup instead of on first request
    let conn = pool.get().await.map_err(|e| {
        tracing::error!(error = %e, "Failed to connect to Redis");
        KvError::pool(e)
    })?;
    drop(conn);

    tracing::info!("Connected to Redis");
    Ok(Arc::new(RedisKvStore::new(pool)))
}
