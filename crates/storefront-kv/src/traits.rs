//! The key-value capability surface.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::KvResult;
use crate::script::KvScript;

/// Where a consumer-group read starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamCursor {
    /// Entries never delivered to the group (`>`), optionally blocking up to
    /// `block` for new ones to arrive.
    New { block: Option<Duration> },
    /// Entries delivered to this consumer but not yet acknowledged (`0`).
    Pending,
}

/// A single stream entry as delivered to a consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEntry {
    pub id: String,
    pub fields: HashMap<String, String>,
}

impl StreamEntry {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Capabilities the storefront core needs from a remote key-value store.
///
/// Implementations must be thread-safe and every method must be atomic with
/// respect to concurrent callers on other instances. Multi-step read-modify-write
/// sequences are only allowed through [`KvStore::eval`].
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Returns the string stored at `key`, or `None` if absent or expired.
    async fn get(&self, key: &str) -> KvResult<Option<String>>;

    /// Stores `value` at `key`. `None` stores without expiry.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> KvResult<()>;

    /// Stores `value` at `key` only if the key does not exist.
    ///
    /// Returns `true` iff this call created the entry.
    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> KvResult<bool>;

    /// Deletes `key`. Returns `true` if something was removed.
    async fn del(&self, key: &str) -> KvResult<bool>;

    /// Atomically increments the integer at `key` (absent counts as 0).
    async fn incr(&self, key: &str) -> KvResult<i64>;

    /// Remaining time to live of `key`.
    ///
    /// `None` when the key is absent or has no expiry.
    async fn ttl(&self, key: &str) -> KvResult<Option<Duration>>;

    /// Runs one of the known atomic scripts and returns its integer status.
    async fn eval(&self, script: KvScript, keys: &[String], args: &[String]) -> KvResult<i64>;

    /// Creates consumer group `group` on `stream`, creating the stream if needed.
    ///
    /// Succeeds if the group already exists.
    async fn ensure_group(&self, stream: &str, group: &str) -> KvResult<()>;

    /// Appends an entry and returns its id.
    async fn xadd(&self, stream: &str, fields: &[(String, String)]) -> KvResult<String>;

    /// Reads up to `count` entries for `consumer` in `group`.
    async fn read_group(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        cursor: StreamCursor,
        count: usize,
    ) -> KvResult<Vec<StreamEntry>>;

    /// Acknowledges entry `id` so it leaves the pending list.
    async fn ack(&self, stream: &str, group: &str, id: &str) -> KvResult<()>;

    /// Short backend identifier for logs and health output.
    fn backend_name(&self) -> &'static str;
}
