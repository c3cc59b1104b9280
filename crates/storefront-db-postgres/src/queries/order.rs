//! Voucher order queries.

use chrono::{DateTime, Utc};
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_core::query_scalar::query_scalar;
use sqlx_postgres::{PgPool, PgTransaction};
use storefront_core::VoucherOrder;
use storefront_storage::StorageError;

use super::{chrono_to_time, time_to_chrono};
use crate::error::query_error;

fn pair(user_id: i64, voucher_id: i64) -> String {
    format!("user {user_id} / voucher {voucher_id}")
}

pub async fn get(pool: &PgPool, order_id: i64) -> Result<Option<VoucherOrder>, StorageError> {
    let row: Option<(i64, i64, i64, DateTime<Utc>)> = query_as(
        "SELECT id, user_id, voucher_id, create_time FROM tb_voucher_order WHERE id = $1",
    )
    .bind(order_id)
    .fetch_optional(pool)
    .await
    .map_err(query_error("voucher_order", order_id, "read"))?;

    Ok(row.map(|(id, user_id, voucher_id, created)| VoucherOrder {
        id,
        user_id,
        voucher_id,
        created_at: chrono_to_time(created),
    }))
}

pub async fn count(pool: &PgPool, user_id: i64, voucher_id: i64) -> Result<i64, StorageError> {
    query_scalar("SELECT COUNT(*) FROM tb_voucher_order WHERE user_id = $1 AND voucher_id = $2")
        .bind(user_id)
        .bind(voucher_id)
        .fetch_one(pool)
        .await
        .map_err(query_error("voucher_order", pair(user_id, voucher_id), "count"))
}

pub async fn exists_with_tx(
    tx: &mut PgTransaction<'static>,
    user_id: i64,
    voucher_id: i64,
) -> Result<bool, StorageError> {
    query_scalar(
        r#"SELECT EXISTS(
               SELECT 1 FROM tb_voucher_order WHERE user_id = $1 AND voucher_id = $2
           )"#,
    )
    .bind(user_id)
    .bind(voucher_id)
    .fetch_one(&mut **tx)
    .await
    .map_err(query_error("voucher_order", pair(user_id, voucher_id), "check"))
}

/// Inserts an order.
///
/// A `(user_id, voucher_id)` or id collision maps to `StorageError::AlreadyExists`.
pub async fn insert_with_tx(
    tx: &mut PgTransaction<'static>,
    order: &VoucherOrder,
) -> Result<(), StorageError> {
    query(
        r#"INSERT INTO tb_voucher_order (id, user_id, voucher_id, create_time)
           VALUES ($1, $2, $3, $4)"#,
    )
    .bind(order.id)
    .bind(order.user_id)
    .bind(order.voucher_id)
    .bind(time_to_chrono(order.created_at))
    .execute(&mut **tx)
    .await
    .map_err(query_error(
        "voucher_order",
        pair(order.user_id, order.voucher_id),
        "insert",
    ))?;
    Ok(())
}
