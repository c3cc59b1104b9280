//! Domain entities shared by the cache, admission and persistence layers.
//!
//! Field names serialize in camelCase so cached payloads stay readable by
//! other services sharing the same KV namespace.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A shop listing. Read-mostly, served through the cache facade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shop {
    pub id: i64,
    pub name: String,
    pub type_id: i64,
    #[serde(default)]
    pub images: String,
    #[serde(default)]
    pub area: Option<String>,
    pub address: String,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub avg_price: Option<i64>,
    #[serde(default)]
    pub sold: i32,
    #[serde(default)]
    pub comments: i32,
    #[serde(default)]
    pub score: i32,
    #[serde(default)]
    pub open_hours: Option<String>,
}

/// A shop category, listed in `sort` order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopType {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub icon: String,
    pub sort: i32,
}

/// Half-open purchase window `[begin, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleWindow {
    #[serde(with = "time::serde::rfc3339")]
    pub begin: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end: OffsetDateTime,
}

/// Where an instant falls relative to a [`SaleWindow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowStatus {
    NotStarted,
    Open,
    Ended,
}

impl SaleWindow {
    pub fn new(begin: OffsetDateTime, end: OffsetDateTime) -> Self {
        Self { begin, end }
    }

    pub fn status_at(&self, now: OffsetDateTime) -> WindowStatus {
        if now < self.begin {
            WindowStatus::NotStarted
        } else if now >= self.end {
            WindowStatus::Ended
        } else {
            WindowStatus::Open
        }
    }
}

/// A flash-sale voucher with limited stock.
///
/// `stock` is never negative; the durable row is only decremented while
/// `stock > 0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeckillVoucher {
    pub voucher_id: i64,
    pub stock: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub begin_time: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end_time: OffsetDateTime,
}

impl SeckillVoucher {
    pub fn window(&self) -> SaleWindow {
        SaleWindow::new(self.begin_time, self.end_time)
    }
}

/// A durable order row. At most one exists per `(user_id, voucher_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoucherOrder {
    pub id: i64,
    pub user_id: i64,
    pub voucher_id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// An admitted purchase waiting to be persisted.
///
/// The order id is assigned at admission time so the caller gets it back
/// before the row is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderIntent {
    pub order_id: i64,
    pub user_id: i64,
    pub voucher_id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl OrderIntent {
    pub fn into_order(self) -> VoucherOrder {
        VoucherOrder {
            id: self.order_id,
            user_id: self.user_id,
            voucher_id: self.voucher_id,
            created_at: self.created_at,
        }
    }
}
