//! Cache facade over the shared KV store.
//!
//! ```text
//! read → KV entry ─ hit ───────────→ value
//!                 ├ null marker ───→ None (no source lookup)
//!                 └ miss → strategy → source → KV entry
//! ```
//!
//! Values are stored as JSON. Null markers are blank strings with a short TTL.
//! Logically expiring entries wrap the value as `{"data": .., "expireTime": ..}`
//! and carry no physical TTL.

pub mod client;
pub mod entry;
pub mod error;
pub mod rebuild;

pub use client::CacheClient;
pub use entry::{Cached, LogicalEntry, NULL_MARKER};
pub use error::{BoxError, CacheError, CacheResult};
pub use rebuild::RebuildPool;
