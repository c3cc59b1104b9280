//! In-process implementation of [`KvStore`].
//!
//! One mutex guards the whole keyspace, so every trait method and every
//! script runs atomically with respect to the others, matching the
//! single-threaded execution model of a Redis server. Expired keys are
//! dropped lazily on access.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::error::{KvError, KvResult};
use crate::script::{AdmitStatus, KvScript};
use crate::traits::{KvStore, StreamCursor, StreamEntry};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
struct StreamId {
    ms: u64,
    seq: u64,
}

impl StreamId {
    fn parse(raw: &str) -> Option<Self> {
        let (ms, seq) = raw.split_once('-')?;
        Some(Self {
            ms: ms.parse().ok()?,
            seq: seq.parse().ok()?,
        })
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.ms, self.seq)
    }
}

#[derive(Debug, Default)]
struct ConsumerGroup {
    last_delivered: StreamId,
    /// Delivered but unacknowledged entries, with the consumer that owns them.
    pending: BTreeMap<StreamId, String>,
}

#[derive(Debug, Default)]
struct Stream {
    entries: BTreeMap<StreamId, HashMap<String, String>>,
    last_id: StreamId,
    groups: HashMap<String, ConsumerGroup>,
}

impl Stream {
    fn next_id(&mut self) -> StreamId {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        let id = if now_ms > self.last_id.ms {
            StreamId { ms: now_ms, seq: 0 }
        } else {
            StreamId {
                ms: self.last_id.ms,
                seq: self.last_id.seq + 1,
            }
        };
        self.last_id = id;
        id
    }

    fn append(&mut self, fields: &[(String, String)]) -> StreamId {
        let id = self.next_id();
        self.entries.insert(id, fields.iter().cloned().collect());
        id
    }
}

#[derive(Debug)]
enum Value {
    Str(String),
    Set(HashSet<String>),
    Stream(Stream),
}

#[derive(Debug)]
struct Slot {
    value: Value,
    expires_at: Option<Instant>,
}

impl Slot {
    fn new(value: Value, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[derive(Debug, Default)]
struct Keyspace {
    slots: HashMap<String, Slot>,
}

impl Keyspace {
    fn live(&mut self, key: &str) -> Option<&mut Slot> {
        let now = Instant::now();
        if self.slots.get(key).is_some_and(|slot| slot.is_expired(now)) {
            self.slots.remove(key);
        }
        self.slots.get_mut(key)
    }

    fn string(&mut self, key: &str) -> KvResult<Option<&mut String>> {
        match self.live(key) {
            None => Ok(None),
            Some(Slot {
                value: Value::Str(s),
                ..
            }) => Ok(Some(s)),
            Some(_) => Err(KvError::wrong_type(key)),
        }
    }

    fn set_mut(&mut self, key: &str) -> KvResult<&mut HashSet<String>> {
        if self.live(key).is_none() {
            self.slots
                .insert(key.to_string(), Slot::new(Value::Set(HashSet::new()), None));
        }
        match self.slots.get_mut(key) {
            Some(Slot {
                value: Value::Set(set),
                ..
            }) => Ok(set),
            _ => Err(KvError::wrong_type(key)),
        }
    }

    fn stream_mut(&mut self, key: &str, create: bool) -> KvResult<Option<&mut Stream>> {
        if create && self.live(key).is_none() {
            self.slots.insert(
                key.to_string(),
                Slot::new(Value::Stream(Stream::default()), None),
            );
        }
        match self.live(key) {
            None => Ok(None),
            Some(Slot {
                value: Value::Stream(stream),
                ..
            }) => Ok(Some(stream)),
            Some(_) => Err(KvError::wrong_type(key)),
        }
    }

    fn group_mut<'a>(
        &'a mut self,
        stream: &str,
        group: &str,
    ) -> KvResult<(&'a mut BTreeMap<StreamId, HashMap<String, String>>, &'a mut ConsumerGroup)>
    {
        let nogroup = || {
            KvError::unexpected_reply(
                "XREADGROUP",
                format!("NOGROUP no consumer group '{group}' for key '{stream}'"),
            )
        };
        let s = self.stream_mut(stream, false)?.ok_or_else(nogroup)?;
        let g = s.groups.get_mut(group).ok_or_else(nogroup)?;
        Ok((&mut s.entries, g))
    }

    fn admit(&mut self, keys: &[String], args: &[String]) -> KvResult<i64> {
        let (Some(stock_key), Some(admitted_key), Some(user_id)) =
            (keys.first(), keys.get(1), args.first())
        else {
            return Err(KvError::unexpected_reply(
                "EVAL admit",
                "expected at least 2 keys and 1 argument",
            ));
        };

        let duplicate = match self.live(admitted_key) {
            None => false,
            Some(Slot {
                value: Value::Set(set),
                ..
            }) => set.contains(user_id),
            Some(_) => return Err(KvError::wrong_type(admitted_key.as_str())),
        };
        if duplicate {
            return Ok(AdmitStatus::DUPLICATE);
        }

        // Non-numeric stock reads as nil, same as Lua `tonumber`
        let stock = match self.string(stock_key)? {
            Some(raw) => raw.parse::<i64>().ok(),
            None => None,
        };
        let stock = match stock {
            Some(stock) if stock > 0 => stock,
            _ => return Ok(AdmitStatus::SOLD_OUT),
        };

        if let Some(raw) = self.string(stock_key)? {
            *raw = (stock - 1).to_string();
        }
        self.set_mut(admitted_key)?.insert(user_id.clone());

        if let Some(stream_key) = keys.get(2) {
            let fields: Vec<(String, String)> = args[1..]
                .chunks(2)
                .filter_map(|pair| match pair {
                    [field, value] => Some((field.clone(), value.clone())),
                    _ => None,
                })
                .collect();
            if let Some(stream) = self.stream_mut(stream_key, true)? {
                stream.append(&fields);
            }
        }

        Ok(AdmitStatus::RESERVED)
    }

    fn cancel_admit(&mut self, keys: &[String], args: &[String]) -> KvResult<i64> {
        let (Some(stock_key), Some(admitted_key), Some(user_id)) =
            (keys.first(), keys.get(1), args.first())
        else {
            return Err(KvError::unexpected_reply(
                "EVAL cancel_admit",
                "expected 2 keys and 1 argument",
            ));
        };

        let removed = match self.live(admitted_key) {
            None => false,
            Some(Slot {
                value: Value::Set(set),
                ..
            }) => set.remove(user_id),
            Some(_) => return Err(KvError::wrong_type(admitted_key.as_str())),
        };
        if !removed {
            return Ok(0);
        }

        match self.string(stock_key)? {
            Some(raw) => {
                let stock = raw
                    .parse::<i64>()
                    .map_err(|_| KvError::not_an_integer(stock_key.as_str()))?;
                *raw = (stock + 1).to_string();
            }
            None => {
                self.slots
                    .insert(stock_key.clone(), Slot::new(Value::Str("1".into()), None));
            }
        }
        Ok(1)
    }

    fn release_lock(&mut self, keys: &[String], args: &[String]) -> KvResult<i64> {
        let (Some(key), Some(holder)) = (keys.first(), args.first()) else {
            return Err(KvError::unexpected_reply(
                "EVAL release_lock",
                "expected 1 key and 1 argument",
            ));
        };
        let owned = matches!(
            self.live(key),
            Some(Slot { value: Value::Str(current), .. }) if current.as_str() == holder.as_str()
        );
        if owned {
            self.slots.remove(key);
            Ok(1)
        } else {
            Ok(0)
        }
    }
}

struct Inner {
    keyspace: Mutex<Keyspace>,
    appended: Notify,
}

/// Single-process key-value store with the same semantics as [`crate::RedisKvStore`].
///
/// Clones share the same keyspace.
#[derive(Clone)]
pub struct MemoryKvStore {
    inner: Arc<Inner>,
}

impl Default for MemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                keyspace: Mutex::new(Keyspace::default()),
                appended: Notify::new(),
            }),
        }
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.inner
            .keyspace
            .lock()
            .slots
            .values()
            .filter(|slot| !slot.is_expired(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read_new(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
    ) -> KvResult<Vec<StreamEntry>> {
        let mut keyspace = self.inner.keyspace.lock();
        let (entries, group) = keyspace.group_mut(stream, group)?;

        let mut delivered = Vec::new();
        let start = group.last_delivered;
        for (id, fields) in entries
            .range(start..)
            .filter(|(id, _)| **id > start)
            .take(count)
        {
            group.last_delivered = *id;
            group.pending.insert(*id, consumer.to_string());
            delivered.push(StreamEntry {
                id: id.to_string(),
                fields: fields.clone(),
            });
        }
        Ok(delivered)
    }

    fn read_pending(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
    ) -> KvResult<Vec<StreamEntry>> {
        let mut keyspace = self.inner.keyspace.lock();
        let (entries, group) = keyspace.group_mut(stream, group)?;

        Ok(group
            .pending
            .iter()
            .filter(|(_, owner)| owner.as_str() == consumer)
            .filter_map(|(id, _)| {
                entries.get(id).map(|fields| StreamEntry {
                    id: id.to_string(),
                    fields: fields.clone(),
                })
            })
            .take(count)
            .collect())
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> KvResult<Option<String>> {
        let mut keyspace = self.inner.keyspace.lock();
        Ok(keyspace.string(key)?.cloned())
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> KvResult<()> {
        let mut keyspace = self.inner.keyspace.lock();
        keyspace
            .slots
            .insert(key.to_string(), Slot::new(Value::Str(value.to_string()), ttl));
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> KvResult<bool> {
        let mut keyspace = self.inner.keyspace.lock();
        if keyspace.live(key).is_some() {
            return Ok(false);
        }
        keyspace.slots.insert(
            key.to_string(),
            Slot::new(Value::Str(value.to_string()), Some(ttl)),
        );
        Ok(true)
    }

    async fn del(&self, key: &str) -> KvResult<bool> {
        let mut keyspace = self.inner.keyspace.lock();
        let existed = keyspace.live(key).is_some();
        keyspace.slots.remove(key);
        Ok(existed)
    }

    async fn incr(&self, key: &str) -> KvResult<i64> {
        let mut keyspace = self.inner.keyspace.lock();
        match keyspace.string(key)? {
            Some(raw) => {
                let next = raw
                    .parse::<i64>()
                    .ok()
                    .and_then(|n| n.checked_add(1))
                    .ok_or_else(|| KvError::not_an_integer(key))?;
                *raw = next.to_string();
                Ok(next)
            }
            None => {
                keyspace
                    .slots
                    .insert(key.to_string(), Slot::new(Value::Str("1".into()), None));
                Ok(1)
            }
        }
    }

    async fn ttl(&self, key: &str) -> KvResult<Option<Duration>> {
        let mut keyspace = self.inner.keyspace.lock();
        let now = Instant::now();
        Ok(keyspace
            .live(key)
            .and_then(|slot| slot.expires_at)
            .map(|at| at.saturating_duration_since(now)))
    }

    async fn eval(&self, script: KvScript, keys: &[String], args: &[String]) -> KvResult<i64> {
        let status = {
            let mut keyspace = self.inner.keyspace.lock();
            match script {
                KvScript::ReleaseLock => keyspace.release_lock(keys, args)?,
                KvScript::Admit => keyspace.admit(keys, args)?,
                KvScript::CancelAdmit => keyspace.cancel_admit(keys, args)?,
            }
        };
        if script == KvScript::Admit && status == AdmitStatus::RESERVED && keys.len() > 2 {
            self.inner.appended.notify_waiters();
        }
        tracing::trace!(script = script.name(), status, "memory script executed");
        Ok(status)
    }

    async fn ensure_group(&self, stream: &str, group: &str) -> KvResult<()> {
        let mut keyspace = self.inner.keyspace.lock();
        if let Some(s) = keyspace.stream_mut(stream, true)? {
            s.groups.entry(group.to_string()).or_default();
        }
        Ok(())
    }

    async fn xadd(&self, stream: &str, fields: &[(String, String)]) -> KvResult<String> {
        let id = {
            let mut keyspace = self.inner.keyspace.lock();
            let s = keyspace
                .stream_mut(stream, true)?
                .ok_or_else(|| KvError::unexpected_reply("XADD", "stream not created"))?;
            s.append(fields)
        };
        self.inner.appended.notify_waiters();
        Ok(id.to_string())
    }

    async fn read_group(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        cursor: StreamCursor,
        count: usize,
    ) -> KvResult<Vec<StreamEntry>> {
        let block = match cursor {
            StreamCursor::Pending => return self.read_pending(stream, group, consumer, count),
            StreamCursor::New { block } => block,
        };

        let Some(block) = block else {
            return self.read_new(stream, group, consumer, count);
        };

        let deadline = Instant::now() + block;
        loop {
            // Register interest before reading so an append in between is not missed
            let notified = self.inner.appended.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let entries = self.read_new(stream, group, consumer, count)?;
            if !entries.is_empty() {
                return Ok(entries);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() || tokio::time::timeout(remaining, notified).await.is_err() {
                return Ok(Vec::new());
            }
        }
    }

    async fn ack(&self, stream: &str, group: &str, id: &str) -> KvResult<()> {
        let Some(id) = StreamId::parse(id) else {
            return Err(KvError::unexpected_reply(
                "XACK",
                format!("invalid stream id '{id}'"),
            ));
        };
        let mut keyspace = self.inner.keyspace.lock();
        let (_, group) = keyspace.group_mut(stream, group)?;
        group.pending.remove(&id);
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
