//! Redis implementation of [`KvStore`] over a `deadpool-redis` pool.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::redis::streams::StreamReadReply;
use deadpool_redis::redis::{self, AsyncCommands, Script, Value};
use deadpool_redis::{Connection, Pool};

use crate::error::{KvError, KvResult};
use crate::script::KvScript;
use crate::traits::{KvStore, StreamCursor, StreamEntry};

/// Script handles, loaded once and reused for every call.
///
/// `redis::Script` sends `EVALSHA` and falls back to `SCRIPT LOAD` on a
/// `NOSCRIPT` reply, so a Redis restart is handled transparently.
struct Scripts {
    release_lock: Script,
    admit: Script,
    cancel_admit: Script,
}

impl Scripts {
    fn new() -> Self {
        Self {
            release_lock: Script::new(KvScript::ReleaseLock.lua()),
            admit: Script::new(KvScript::Admit.lua()),
            cancel_admit: Script::new(KvScript::CancelAdmit.lua()),
        }
    }

    fn get(&self, script: KvScript) -> &Script {
        match script {
            KvScript::ReleaseLock => &self.release_lock,
            KvScript::Admit => &self.admit,
            KvScript::CancelAdmit => &self.cancel_admit,
        }
    }
}

/// Redis-backed key-value store.
#[derive(Clone)]
pub struct RedisKvStore {
    pool: Pool,
    scripts: Arc<Scripts>,
}

impl RedisKvStore {
    /// Create a store over an existing connection pool.
    pub fn new(pool: Pool) -> Self {
        Self {
            pool,
            scripts: Arc::new(Scripts::new()),
        }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Check if Redis is reachable (for health checks).
    pub async fn is_available(&self) -> bool {
        match self.conn().await {
            Ok(mut conn) => redis::cmd("PING")
                .query_async::<String>(&mut conn)
                .await
                .is_ok(),
            Err(_) => false,
        }
    }

    async fn conn(&self) -> KvResult<Connection> {
        self.pool.get().await.map_err(KvError::pool)
    }
}

fn millis(ttl: Duration) -> u64 {
    // PX 0 is rejected by Redis
    (ttl.as_millis() as u64).max(1)
}

fn entry_from_reply(id: String, map: HashMap<String, Value>) -> KvResult<StreamEntry> {
    let mut fields = HashMap::with_capacity(map.len());
    for (name, value) in map {
        let value: String = redis::from_redis_value(&value)?;
        fields.insert(name, value);
    }
    Ok(StreamEntry { id, fields })
}

#[async_trait]
impl KvStore for RedisKvStore {
    async fn get(&self, key: &str) -> KvResult<Option<String>> {
        let mut conn = self.conn().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> KvResult<()> {
        let mut conn = self.conn().await?;
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("PX").arg(millis(ttl));
        }
        let _: () = cmd.query_async(&mut conn).await?;
        tracing::debug!(key = %key, ttl_ms = ?ttl.map(|t| t.as_millis()), "kv set");
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> KvResult<bool> {
        let mut conn = self.conn().await?;
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(millis(ttl))
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn del(&self, key: &str) -> KvResult<bool> {
        let mut conn = self.conn().await?;
        let removed: i64 = conn.del(key).await?;
        Ok(removed > 0)
    }

    async fn incr(&self, key: &str) -> KvResult<i64> {
        let mut conn = self.conn().await?;
        let value: i64 = conn.incr(key, 1).await?;
        Ok(value)
    }

    async fn ttl(&self, key: &str) -> KvResult<Option<Duration>> {
        let mut conn = self.conn().await?;
        let ms: i64 = redis::cmd("PTTL").arg(key).query_async(&mut conn).await?;
        // -2: no such key, -1: no expiry
        Ok((ms >= 0).then(|| Duration::from_millis(ms as u64)))
    }

    async fn eval(&self, script: KvScript, keys: &[String], args: &[String]) -> KvResult<i64> {
        let mut conn = self.conn().await?;
        let mut invocation = self.scripts.get(script).prepare_invoke();
        for key in keys {
            invocation.key(key);
        }
        for arg in args {
            invocation.arg(arg);
        }
        let status: i64 = invocation.invoke_async(&mut conn).await?;
        tracing::debug!(script = script.name(), status, "kv script executed");
        Ok(status)
    }

    async fn ensure_group(&self, stream: &str, group: &str) -> KvResult<()> {
        let mut conn = self.conn().await?;
        let result: redis::RedisResult<()> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(stream)
            .arg(group)
            .arg("0")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;
        match result {
            Ok(()) => {
                tracing::info!(stream = %stream, group = %group, "created consumer group");
                Ok(())
            }
            Err(e) if e.code() == Some("BUSYGROUP") => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn xadd(&self, stream: &str, fields: &[(String, String)]) -> KvResult<String> {
        let mut conn = self.conn().await?;
        let id: String = conn.xadd(stream, "*", fields).await?;
        Ok(id)
    }

    async fn read_group(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        cursor: StreamCursor,
        count: usize,
    ) -> KvResult<Vec<StreamEntry>> {
        let mut conn = self.conn().await?;
        let mut cmd = redis::cmd("XREADGROUP");
        cmd.arg("GROUP").arg(group).arg(consumer).arg("COUNT").arg(count);
        let start = match cursor {
            StreamCursor::New { block } => {
                if let Some(block) = block {
                    cmd.arg("BLOCK").arg(millis(block));
                }
                ">"
            }
            StreamCursor::Pending => "0",
        };
        cmd.arg("STREAMS").arg(stream).arg(start);

        // Nil reply means the block timed out
        let reply: Option<StreamReadReply> = cmd.query_async(&mut conn).await?;
        let Some(reply) = reply else {
            return Ok(Vec::new());
        };

        let mut entries = Vec::new();
        for key in reply.keys {
            for stream_id in key.ids {
                entries.push(entry_from_reply(stream_id.id, stream_id.map)?);
            }
        }
        Ok(entries)
    }

    async fn ack(&self, stream: &str, group: &str, id: &str) -> KvResult<()> {
        let mut conn = self.conn().await?;
        let _: i64 = conn.xack(stream, group, &[id]).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
