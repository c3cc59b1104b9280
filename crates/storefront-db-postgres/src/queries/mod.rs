//! SQL query modules for the PostgreSQL storage backend.
//!
//! Pool-level functions take `&PgPool`; functions suffixed `_with_tx` run
//! inside an open transaction.

pub mod order;
pub mod shop;
pub mod voucher;

use chrono::{DateTime, Utc};
use time::OffsetDateTime;

/// Converts chrono DateTime to time OffsetDateTime.
pub(crate) fn chrono_to_time(dt: DateTime<Utc>) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(dt.timestamp()).unwrap_or(OffsetDateTime::UNIX_EPOCH)
        + time::Duration::nanoseconds(dt.timestamp_subsec_nanos() as i64)
}

/// Converts time OffsetDateTime to chrono DateTime.
pub(crate) fn time_to_chrono(at: OffsetDateTime) -> DateTime<Utc> {
    DateTime::from_timestamp(at.unix_timestamp(), at.nanosecond()).unwrap_or_default()
}
