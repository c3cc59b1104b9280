//! Core storage traits for the durable store.

use async_trait::async_trait;
use storefront_core::{SeckillVoucher, Shop, ShopType, VoucherOrder};

use crate::error::StorageError;

/// The durable relational store behind the cache.
///
/// Reads here are the fallback for every cache strategy; writes are limited
/// to shop updates, voucher registration and the order worker's transaction.
#[async_trait]
pub trait StorefrontStorage: Send + Sync {
    /// Point lookup of a shop.
    async fn get_shop(&self, id: i64) -> Result<Option<Shop>, StorageError>;

    /// Overwrites an existing shop row.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if no shop with this id exists.
    async fn update_shop(&self, shop: &Shop) -> Result<(), StorageError>;

    /// All shop types ordered by `sort` ascending.
    async fn list_shop_types(&self) -> Result<Vec<ShopType>, StorageError>;

    async fn get_voucher(&self, voucher_id: i64) -> Result<Option<SeckillVoucher>, StorageError>;

    /// Inserts a flash-sale voucher.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::AlreadyExists` if the voucher id is taken.
    async fn create_voucher(&self, voucher: &SeckillVoucher) -> Result<(), StorageError>;

    async fn get_order(&self, order_id: i64) -> Result<Option<VoucherOrder>, StorageError>;

    /// Number of orders a user holds for a voucher (0 or 1 while the unique
    /// index is in place).
    async fn count_orders(&self, user_id: i64, voucher_id: i64) -> Result<i64, StorageError>;

    /// Opens the transaction used to persist one order.
    async fn begin_transaction(&self) -> Result<Box<dyn OrderTransaction>, StorageError>;
}

/// A scoped transaction around "check, decrement stock, insert order".
///
/// Dropping a transaction without calling [`OrderTransaction::commit`] rolls
/// it back.
///
/// ```ignore
/// let mut tx = storage.begin_transaction().await?;
/// if tx.order_exists(user_id, voucher_id).await? {
///     tx.rollback().await?;
///     return Ok(PersistOutcome::Duplicate);
/// }
/// if !tx.decrement_stock(voucher_id).await? {
///     tx.rollback().await?;
///     return Ok(PersistOutcome::SoldOut);
/// }
/// tx.insert_order(&order).await?;
/// tx.commit().await?;
/// ```
#[async_trait]
pub trait OrderTransaction: Send {
    /// Whether an order for `(user_id, voucher_id)` exists, including rows
    /// written earlier in this transaction.
    async fn order_exists(&mut self, user_id: i64, voucher_id: i64) -> Result<bool, StorageError>;

    /// Decrements durable stock by one if it is positive.
    ///
    /// Returns `false` when stock was already zero or the voucher is missing.
    async fn decrement_stock(&mut self, voucher_id: i64) -> Result<bool, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::AlreadyExists` on a `(user_id, voucher_id)`
    /// uniqueness violation.
    async fn insert_order(&mut self, order: &VoucherOrder) -> Result<(), StorageError>;

    /// Commits all operations in this transaction.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::TransactionError` if the commit fails.
    async fn commit(self: Box<Self>) -> Result<(), StorageError>;

    /// Rolls back all operations in this transaction.
    async fn rollback(self: Box<Self>) -> Result<(), StorageError>;
}
