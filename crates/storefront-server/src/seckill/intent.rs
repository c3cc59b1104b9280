//! Stream encoding of [`OrderIntent`].
//!
//! Entries carry `userId`, `voucherId`, `id` and `createdAt` (RFC 3339).
//! `createdAt` is optional on read so entries written by older producers
//! still decode.

use storefront_core::{OrderIntent, now_utc};
use storefront_kv::StreamEntry;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use super::error::{SeckillError, SeckillResult};

pub const FIELD_USER_ID: &str = "userId";
pub const FIELD_VOUCHER_ID: &str = "voucherId";
pub const FIELD_ORDER_ID: &str = "id";
pub const FIELD_CREATED_AT: &str = "createdAt";

pub fn to_fields(intent: &OrderIntent) -> SeckillResult<Vec<(String, String)>> {
    let created_at = intent
        .created_at
        .format(&Rfc3339)
        .map_err(|e| SeckillError::malformed("-", e.to_string()))?;
    Ok(vec![
        (FIELD_USER_ID.to_string(), intent.user_id.to_string()),
        (FIELD_VOUCHER_ID.to_string(), intent.voucher_id.to_string()),
        (FIELD_ORDER_ID.to_string(), intent.order_id.to_string()),
        (FIELD_CREATED_AT.to_string(), created_at),
    ])
}

pub fn from_entry(entry: &StreamEntry) -> SeckillResult<OrderIntent> {
    let created_at = match entry.field(FIELD_CREATED_AT) {
        Some(raw) => OffsetDateTime::parse(raw, &Rfc3339)
            .map_err(|e| SeckillError::malformed(&entry.id, format!("{FIELD_CREATED_AT}: {e}")))?,
        None => now_utc(),
    };
    Ok(OrderIntent {
        order_id: int_field(entry, FIELD_ORDER_ID)?,
        user_id: int_field(entry, FIELD_USER_ID)?,
        voucher_id: int_field(entry, FIELD_VOUCHER_ID)?,
        created_at,
    })
}

fn int_field(entry: &StreamEntry, name: &str) -> SeckillResult<i64> {
    let raw = entry
        .field(name)
        .ok_or_else(|| SeckillError::malformed(&entry.id, format!("missing {name}")))?;
    raw.parse()
        .map_err(|_| SeckillError::malformed(&entry.id, format!("{name} is not an integer: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use time::macros::datetime;

    fn entry(fields: &[(&str, &str)]) -> StreamEntry {
        StreamEntry {
            id: "1-0".to_string(),
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
        }
    }

    #[test]
    fn test_encode_decode() {
        let intent = OrderIntent {
            order_id: 99,
            user_id: 5,
            voucher_id: 7,
            created_at: datetime!(2024-01-01 10:30 UTC),
        };
        let fields = to_fields(&intent).unwrap();
        let decoded = from_entry(&StreamEntry {
            id: "1-0".into(),
            fields: fields.into_iter().collect(),
        })
        .unwrap();
        assert_eq!(decoded, intent);
    }

    #[test]
    fn test_created_at_is_optional() {
        let decoded = from_entry(&entry(&[("userId", "5"), ("voucherId", "7"), ("id", "99")])).unwrap();
        assert_eq!(decoded.order_id, 99);
        assert_eq!(decoded.user_id, 5);
        assert_eq!(decoded.voucher_id, 7);
    }

    #[test]
    fn test_malformed_entries() {
        let err = from_entry(&entry(&[("userId", "5"), ("id", "99")])).unwrap_err();
        assert!(matches!(err, SeckillError::MalformedIntent { ref reason, .. } if reason.contains("voucherId")));

        let err = from_entry(&entry(&[("userId", "x"), ("voucherId", "7"), ("id", "99")])).unwrap_err();
        assert!(matches!(err, SeckillError::MalformedIntent { .. }));
    }
}
