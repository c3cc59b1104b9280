use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use storefront_db_postgres::PostgresConfig;
pub use storefront_kv::RedisConfig;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Redis configuration
    #[serde(default)]
    pub redis: RedisConfig,
    /// PostgreSQL configuration; absent means the in-memory durable store
    #[serde(default)]
    pub postgres: Option<PostgresConfig>,
    /// Cache facade configuration
    #[serde(default)]
    pub cache: CacheConfig,
    /// Flash-sale admission and order worker configuration
    #[serde(default)]
    pub seckill: SeckillConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.redis.validate()?;
        if let Some(ref pg) = self.postgres {
            pg.validate()?;
        }
        // Cache validations
        if self.cache.lock_ttl_secs == 0 {
            return Err("cache.lock_ttl_secs must be > 0".into());
        }
        if self.cache.rebuild_workers == 0 {
            return Err("cache.rebuild_workers must be > 0".into());
        }
        if self.cache.mutex_max_retries == 0 {
            return Err("cache.mutex_max_retries must be > 0".into());
        }
        // Seckill validations
        if self.seckill.stream_key.is_empty() || self.seckill.group.is_empty() {
            return Err("seckill.stream_key and seckill.group must not be empty".into());
        }
        if self.seckill.consumer.is_empty() {
            return Err("seckill.consumer must not be empty".into());
        }
        if self.seckill.queue_capacity == 0 {
            return Err("seckill.queue_capacity must be > 0".into());
        }
        if self.seckill.order_lock_ttl_secs == 0 {
            return Err("seckill.order_lock_ttl_secs must be > 0".into());
        }
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        Ok(())
    }
}

/// Cache facade configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// TTL of the null marker written for ids the source does not know
    #[serde(default = "default_null_ttl_secs")]
    pub null_ttl_secs: u64,

    /// TTL of cached shops (physical TTL, or logical TTL for hot shops)
    #[serde(default = "default_shop_ttl_secs")]
    pub shop_ttl_secs: u64,

    /// TTL of the rebuild lock
    #[serde(default = "default_lock_ttl_secs")]
    pub lock_ttl_secs: u64,

    /// Sleep between lookups while another caller holds the rebuild lock
    #[serde(default = "default_mutex_retry_delay_ms")]
    pub mutex_retry_delay_ms: u64,

    /// Lookups before a contended mutex read gives up
    #[serde(default = "default_mutex_max_retries")]
    pub mutex_max_retries: u32,

    /// Size of the logical-expiry rebuild pool
    #[serde(default = "default_rebuild_workers")]
    pub rebuild_workers: usize,
}

fn default_null_ttl_secs() -> u64 {
    120
}

fn default_shop_ttl_secs() -> u64 {
    1800 // 30 minutes
}

fn default_lock_ttl_secs() -> u64 {
    10
}

fn default_mutex_retry_delay_ms() -> u64 {
    50
}

fn default_mutex_max_retries() -> u32 {
    100
}

fn default_rebuild_workers() -> usize {
    10
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            null_ttl_secs: default_null_ttl_secs(),
            shop_ttl_secs: default_shop_ttl_secs(),
            lock_ttl_secs: default_lock_ttl_secs(),
            mutex_retry_delay_ms: default_mutex_retry_delay_ms(),
            mutex_max_retries: default_mutex_max_retries(),
            rebuild_workers: default_rebuild_workers(),
        }
    }
}

impl CacheConfig {
    pub fn null_ttl(&self) -> Duration {
        Duration::from_secs(self.null_ttl_secs)
    }

    pub fn shop_ttl(&self) -> Duration {
        Duration::from_secs(self.shop_ttl_secs)
    }

    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl_secs)
    }

    pub fn mutex_retry_delay(&self) -> Duration {
        Duration::from_millis(self.mutex_retry_delay_ms)
    }
}

/// How admitted intents reach the order worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IntentTransport {
    /// Durable KV stream with a consumer group; survives restarts.
    #[default]
    Stream,
    /// In-process bounded queue; pending intents are lost on crash.
    Queue,
}

/// Flash-sale configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeckillConfig {
    #[serde(default)]
    pub transport: IntentTransport,

    /// Capacity of the in-process queue (queue transport only)
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    #[serde(default = "default_stream_key")]
    pub stream_key: String,

    #[serde(default = "default_group")]
    pub group: String,

    #[serde(default = "default_consumer")]
    pub consumer: String,

    /// How long one stream read blocks waiting for new intents
    #[serde(default = "default_block_ms")]
    pub block_ms: u64,

    /// Sleep between pending-list passes that hit an error
    #[serde(default = "default_pending_backoff_ms")]
    pub pending_backoff_ms: u64,

    /// TTL of the per-user order lock
    #[serde(default = "default_order_lock_ttl_secs")]
    pub order_lock_ttl_secs: u64,
}

fn default_queue_capacity() -> usize {
    1024 * 1024
}

fn default_stream_key() -> String {
    "stream.orders".to_string()
}

fn default_group() -> String {
    "g1".to_string()
}

fn default_consumer() -> String {
    "c1".to_string()
}

fn default_block_ms() -> u64 {
    2000
}

fn default_pending_backoff_ms() -> u64 {
    20
}

fn default_order_lock_ttl_secs() -> u64 {
    10
}

impl Default for SeckillConfig {
    fn default() -> Self {
        Self {
            transport: IntentTransport::default(),
            queue_capacity: default_queue_capacity(),
            stream_key: default_stream_key(),
            group: default_group(),
            consumer: default_consumer(),
            block_ms: default_block_ms(),
            pending_backoff_ms: default_pending_backoff_ms(),
            order_lock_ttl_secs: default_order_lock_ttl_secs(),
        }
    }
}

impl SeckillConfig {
    pub fn block(&self) -> Duration {
        Duration::from_millis(self.block_ms)
    }

    pub fn pending_backoff(&self) -> Duration {
        Duration::from_millis(self.pending_backoff_ms)
    }

    pub fn order_lock_ttl(&self) -> Duration {
        Duration::from_secs(self.order_lock_ttl_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    /// Default config file looked up in the working directory.
    pub const DEFAULT_CONFIG_FILE: &str = "storefront.toml";

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_FILE));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // Environment variable overrides, e.g., STOREFRONT__REDIS__URL=redis://cache:6379
        builder = builder.add_source(
            Environment::with_prefix("STOREFRONT")
                .prefix_separator("__")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}
