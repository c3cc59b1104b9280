//! Flash-sale voucher queries.

use chrono::{DateTime, Utc};
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_postgres::{PgPool, PgTransaction};
use storefront_core::SeckillVoucher;
use storefront_storage::StorageError;

use super::{chrono_to_time, time_to_chrono};
use crate::error::query_error;

pub async fn get(pool: &PgPool, voucher_id: i64) -> Result<Option<SeckillVoucher>, StorageError> {
    let row: Option<(i64, i32, DateTime<Utc>, DateTime<Utc>)> = query_as(
        r#"SELECT voucher_id, stock, begin_time, end_time
           FROM tb_seckill_voucher
           WHERE voucher_id = $1"#,
    )
    .bind(voucher_id)
    .fetch_optional(pool)
    .await
    .map_err(query_error("voucher", voucher_id, "read"))?;

    Ok(row.map(|(voucher_id, stock, begin, end)| SeckillVoucher {
        voucher_id,
        stock,
        begin_time: chrono_to_time(begin),
        end_time: chrono_to_time(end),
    }))
}

pub async fn create(pool: &PgPool, voucher: &SeckillVoucher) -> Result<(), StorageError> {
    query(
        r#"INSERT INTO tb_seckill_voucher (voucher_id, stock, begin_time, end_time)
           VALUES ($1, $2, $3, $4)"#,
    )
    .bind(voucher.voucher_id)
    .bind(voucher.stock)
    .bind(time_to_chrono(voucher.begin_time))
    .bind(time_to_chrono(voucher.end_time))
    .execute(pool)
    .await
    .map_err(query_error("voucher", voucher.voucher_id, "create"))?;
    Ok(())
}

/// `stock = stock - 1` guarded by `stock > 0`.
///
/// Returns `true` iff a row was updated.
pub async fn decrement_stock_with_tx(
    tx: &mut PgTransaction<'static>,
    voucher_id: i64,
) -> Result<bool, StorageError> {
    let result = query(
        r#"UPDATE tb_seckill_voucher
           SET stock = stock - 1, updated_at = now()
           WHERE voucher_id = $1 AND stock > 0"#,
    )
    .bind(voucher_id)
    .execute(&mut **tx)
    .await
    .map_err(query_error("voucher", voucher_id, "decrement stock of"))?;

    Ok(result.rows_affected() == 1)
}
