//! Key-value store client for storefront.
//!
//! ## Capabilities
//!
//! The [`KvStore`] trait is the only surface the cache facade, the lock, the ID
//! generator and the admission controller see:
//!
//! - plain strings with optional TTL (`GET`, `SET [PX]`, `SET NX PX`, `DEL`, `INCR`, `PTTL`)
//! - atomic scripts from a closed set ([`KvScript`])
//! - an append-only stream with consumer groups (`XADD`, `XREADGROUP`, `XACK`)
//!
//! ## Backends
//!
//! - **Redis** ([`RedisKvStore`]): shared across instances, required for any
//!   multi-instance deployment.
//! - **Memory** ([`MemoryKvStore`]): single-process, same semantics, used for
//!   tests and single-instance runs when Redis is disabled.

pub mod config;
pub mod error;
pub mod memory;
pub mod redis_store;
pub mod script;
pub mod traits;

pub use config::{RedisConfig, create_kv_store, create_pool};
pub use error::{KvError, KvResult};
pub use memory::MemoryKvStore;
pub use redis_store::RedisKvStore;
pub use script::{AdmitStatus, KvScript};
pub use traits::{KvStore, StreamCursor, StreamEntry};

/// Type alias for a shareable key-value store.
pub type DynKvStore = std::sync::Arc<dyn KvStore>;
