//! Storefront services over a shared KV store and a durable store.
//!
//! - [`cache`]: read-through cache facade (pass-through, mutex, logical expiry)
//! - [`lock`]: distributed lock with ownership-checked release
//! - [`id_worker`]: time-ordered 64-bit ids
//! - [`seckill`]: atomic flash-sale admission and the order worker
//! - [`shop`], [`voucher`]: services built on the above
//! - [`bootstrap`]: construction and lifecycle of all of it

pub mod bootstrap;
pub mod cache;
pub mod config;
pub mod error;
pub mod id_worker;
pub mod keys;
pub mod lock;
pub mod metrics;
pub mod observability;
pub mod seckill;
pub mod shop;
pub mod voucher;

pub use bootstrap::Storefront;
pub use cache::{CacheClient, CacheError, RebuildPool};
pub use config::{AppConfig, CacheConfig, IntentTransport, RedisConfig, SeckillConfig};
pub use error::{ServiceError, ServiceResult};
pub use id_worker::{IdError, IdWorker};
pub use lock::{DistributedLock, LockClient, LockError};
pub use observability::{init_tracing, shutdown_tracing};
pub use seckill::{Admission, AdmissionController, PersistOutcome, Rejection, SeckillError};
pub use shop::ShopService;
pub use voucher::VoucherService;
