//! Stored shapes of cached values.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::time::Duration;
use time::OffsetDateTime;

use super::error::CacheResult;

/// Stored for ids the source confirmed absent.
pub const NULL_MARKER: &str = "";

/// A value wrapped with its application-level expiry.
///
/// Stored without a physical TTL; staleness is only ever judged by comparing
/// `expire_time` with the current time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogicalEntry<T> {
    pub data: T,
    #[serde(with = "time::serde::rfc3339")]
    pub expire_time: OffsetDateTime,
}

impl<T> LogicalEntry<T> {
    pub fn new(data: T, now: OffsetDateTime, ttl: Duration) -> Self {
        Self {
            data,
            expire_time: now + ttl,
        }
    }

    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expire_time <= now
    }
}

/// What a raw lookup found.
#[derive(Debug, Clone, PartialEq)]
pub enum Cached<T> {
    Hit(T),
    /// Confirmed absent in the source.
    Null,
    Miss,
}

impl<T: DeserializeOwned> Cached<T> {
    /// Blank strings are null markers.
    pub fn decode(raw: Option<String>) -> CacheResult<Self> {
        match raw {
            None => Ok(Self::Miss),
            Some(raw) if raw.trim().is_empty() => Ok(Self::Null),
            Some(raw) => Ok(Self::Hit(serde_json::from_str(&raw)?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_decode() {
        assert_eq!(Cached::<i64>::decode(None).unwrap(), Cached::Miss);
        assert_eq!(Cached::<i64>::decode(Some(NULL_MARKER.into())).unwrap(), Cached::Null);
        assert_eq!(Cached::<i64>::decode(Some("  ".into())).unwrap(), Cached::Null);
        assert_eq!(Cached::<i64>::decode(Some("42".into())).unwrap(), Cached::Hit(42));
        assert!(Cached::<i64>::decode(Some("{oops".into())).is_err());
    }

    #[test]
    fn test_logical_entry_expiry() {
        let now = datetime!(2024-01-01 10:00 UTC);
        let entry = LogicalEntry::new("shop", now, Duration::from_secs(30));
        assert!(!entry.is_expired_at(now));
        assert!(entry.is_expired_at(datetime!(2024-01-01 10:00:30 UTC)));

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["data"], "shop");
        assert_eq!(json["expireTime"], "2024-01-01T10:00:30Z");
    }
}
