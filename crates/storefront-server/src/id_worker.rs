//! Time-ordered 64-bit id generation.
//!
//! Layout: bit 63 is always 0, bits 62..32 hold seconds since [`EPOCH_SECONDS`],
//! bits 31..0 hold a per-business, per-day sequence from `INCR` on
//! `icr:{business}:{yyyy:MM:dd}`.

use storefront_core::{CoreError, format_day, now_utc};
use storefront_kv::{DynKvStore, KvError};
use thiserror::Error;
use time::OffsetDateTime;

use crate::keys::ID_COUNTER_KEY;

/// 2022-01-01T00:00:00Z
pub const EPOCH_SECONDS: i64 = 1_640_995_200;

const SEQUENCE_BITS: u32 = 32;
const MAX_TIMESTAMP: i64 = (1 << 31) - 1;

#[derive(Debug, Error)]
pub enum IdError {
    #[error("Id counter error: {0}")]
    Kv(#[from] KvError),

    #[error("Clock is before the id epoch ({0}s)")]
    ClockBeforeEpoch(i64),

    #[error("Clock is past the end of the 31-bit timestamp range ({0}s)")]
    TimestampOverflow(i64),

    #[error("Sequence exhausted for {key}")]
    SequenceExhausted { key: String },

    #[error("Failed to format counter date: {0}")]
    Date(#[from] CoreError),
}

pub type IdResult<T> = Result<T, IdError>;

#[derive(Clone)]
pub struct IdWorker {
    kv: DynKvStore,
}

impl IdWorker {
    pub fn new(kv: DynKvStore) -> Self {
        Self { kv }
    }

    /// Next id for `business` (e.g. `"order"`).
    pub async fn next_id(&self, business: &str) -> IdResult<i64> {
        self.next_id_at(business, now_utc()).await
    }

    pub(crate) async fn next_id_at(&self, business: &str, now: OffsetDateTime) -> IdResult<i64> {
        let timestamp = now.unix_timestamp() - EPOCH_SECONDS;
        if timestamp < 0 {
            return Err(IdError::ClockBeforeEpoch(timestamp));
        }
        if timestamp > MAX_TIMESTAMP {
            return Err(IdError::TimestampOverflow(timestamp));
        }

        let key = format!("{ID_COUNTER_KEY}{business}:{}", format_day(now)?);
        let sequence = self.kv.incr(&key).await?;
        if !(0..=i64::from(u32::MAX)).contains(&sequence) {
            return Err(IdError::SequenceExhausted { key });
        }

        Ok((timestamp << SEQUENCE_BITS) | sequence)
    }
}

/// Splits an id into `(seconds since epoch, sequence)`.
pub fn decompose(id: i64) -> (i64, u32) {
    (id >> SEQUENCE_BITS, (id & i64::from(u32::MAX)) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use storefront_kv::{KvStore, MemoryKvStore};
    use time::macros::datetime;

    fn worker() -> (IdWorker, Arc<MemoryKvStore>) {
        let kv = Arc::new(MemoryKvStore::new());
        (IdWorker::new(kv.clone()), kv)
    }

    #[tokio::test]
    async fn test_layout() {
        let (ids, kv) = worker();
        let at = datetime!(2024-03-07 10:00 UTC);
        let id = ids.next_id_at("order", at).await.unwrap();

        assert!(id > 0);
        let (ts, seq) = decompose(id);
        assert_eq!(ts, at.unix_timestamp() - EPOCH_SECONDS);
        assert_eq!(seq, 1);
        assert_eq!(kv.get("icr:order:2024:03:07").await.unwrap().as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_sequence_is_per_day_and_business() {
        let (ids, _) = worker();
        let day1 = datetime!(2024-03-07 23:59:59 UTC);
        let day2 = datetime!(2024-03-08 00:00:00 UTC);

        ids.next_id_at("order", day1).await.unwrap();
        let second = ids.next_id_at("order", day1).await.unwrap();
        assert_eq!(decompose(second).1, 2);

        let next_day = ids.next_id_at("order", day2).await.unwrap();
        assert_eq!(decompose(next_day).1, 1);
        assert!(next_day > second);

        let other = ids.next_id_at("voucher", day1).await.unwrap();
        assert_eq!(decompose(other).1, 1);
    }

    #[tokio::test]
    async fn test_clock_before_epoch() {
        let (ids, _) = worker();
        let err = ids
            .next_id_at("order", datetime!(2021-12-31 23:59:59 UTC))
            .await
            .unwrap_err();
        assert!(matches!(err, IdError::ClockBeforeEpoch(-1)));
    }

    #[tokio::test]
    async fn test_timestamp_overflow() {
        let (ids, _) = worker();
        let at = OffsetDateTime::from_unix_timestamp(EPOCH_SECONDS + MAX_TIMESTAMP + 1).unwrap();
        let err = ids.next_id_at("order", at).await.unwrap_err();
        assert!(matches!(err, IdError::TimestampOverflow(t) if t == MAX_TIMESTAMP + 1));
    }

    #[tokio::test]
    async fn test_sequence_exhausted() {
        let (ids, kv) = worker();
        let at = datetime!(2024-03-07 10:00 UTC);
        kv.set("icr:order:2024:03:07", &u32::MAX.to_string(), None)
            .await
            .unwrap();
        let err = ids.next_id_at("order", at).await.unwrap_err();
        assert!(matches!(err, IdError::SequenceExhausted { .. }));
    }
}
