//! Shop and shop type queries.

use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_postgres::PgPool;
use storefront_core::{Shop, ShopType};
use storefront_storage::StorageError;

use crate::error::query_error;

type ShopRow = (
    i64,
    String,
    i64,
    String,
    Option<String>,
    String,
    f64,
    f64,
    Option<i64>,
    i32,
    i32,
    i32,
    Option<String>,
);

fn shop_from_row(row: ShopRow) -> Shop {
    let (id, name, type_id, images, area, address, x, y, avg_price, sold, comments, score, open_hours) =
        row;
    Shop {
        id,
        name,
        type_id,
        images,
        area,
        address,
        x,
        y,
        avg_price,
        sold,
        comments,
        score,
        open_hours,
    }
}

/// Reads a shop by id. Returns `None` if it doesn't exist.
pub async fn get(pool: &PgPool, id: i64) -> Result<Option<Shop>, StorageError> {
    let row: Option<ShopRow> = query_as(
        r#"SELECT id, name, type_id, images, area, address, x, y,
                  avg_price, sold, comments, score, open_hours
           FROM tb_shop
           WHERE id = $1"#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(query_error("shop", id, "read"))?;

    Ok(row.map(shop_from_row))
}

/// Inserts a shop with an explicit id.
pub async fn insert(pool: &PgPool, shop: &Shop) -> Result<(), StorageError> {
    query(
        r#"INSERT INTO tb_shop (id, name, type_id, images, area, address, x, y,
                               avg_price, sold, comments, score, open_hours)
           VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)"#,
    )
    .bind(shop.id)
    .bind(&shop.name)
    .bind(shop.type_id)
    .bind(&shop.images)
    .bind(&shop.area)
    .bind(&shop.address)
    .bind(shop.x)
    .bind(shop.y)
    .bind(shop.avg_price)
    .bind(shop.sold)
    .bind(shop.comments)
    .bind(shop.score)
    .bind(&shop.open_hours)
    .execute(pool)
    .await
    .map_err(query_error("shop", shop.id, "insert"))?;

    Ok(())
}

/// Overwrites every column of an existing shop.
pub async fn update(pool: &PgPool, shop: &Shop) -> Result<(), StorageError> {
    let result = query(
        r#"UPDATE tb_shop
           SET name = $2, type_id = $3, images = $4, area = $5, address = $6,
               x = $7, y = $8, avg_price = $9, sold = $10, comments = $11,
               score = $12, open_hours = $13, updated_at = now()
           WHERE id = $1"#,
    )
    .bind(shop.id)
    .bind(&shop.name)
    .bind(shop.type_id)
    .bind(&shop.images)
    .bind(&shop.area)
    .bind(&shop.address)
    .bind(shop.x)
    .bind(shop.y)
    .bind(shop.avg_price)
    .bind(shop.sold)
    .bind(shop.comments)
    .bind(shop.score)
    .bind(&shop.open_hours)
    .execute(pool)
    .await
    .map_err(query_error("shop", shop.id, "update"))?;

    if result.rows_affected() == 0 {
        return Err(StorageError::not_found("shop", shop.id));
    }
    Ok(())
}

/// Lists shop types ordered by `sort`.
pub async fn list_types(pool: &PgPool) -> Result<Vec<ShopType>, StorageError> {
    let rows: Vec<(i64, String, String, i32)> =
        query_as("SELECT id, name, icon, sort FROM tb_shop_type ORDER BY sort ASC, id ASC")
            .fetch_all(pool)
            .await
            .map_err(query_error("shop_type", "*", "list"))?;

    Ok(rows
        .into_iter()
        .map(|(id, name, icon, sort)| ShopType {
            id,
            name,
            icon,
            sort,
        })
        .collect())
}

/// Inserts a shop type with an explicit id.
pub async fn insert_type(pool: &PgPool, shop_type: &ShopType) -> Result<(), StorageError> {
    query("INSERT INTO tb_shop_type (id, name, icon, sort) VALUES ($1, $2, $3, $4)")
        .bind(shop_type.id)
        .bind(&shop_type.name)
        .bind(&shop_type.icon)
        .bind(shop_type.sort)
        .execute(pool)
        .await
        .map_err(query_error("shop_type", shop_type.id, "insert"))?;
    Ok(())
}
