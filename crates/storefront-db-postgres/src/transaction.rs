//! PostgreSQL implementation of [`OrderTransaction`].

use async_trait::async_trait;
use sqlx_postgres::PgTransaction;
use storefront_core::VoucherOrder;
use storefront_storage::{OrderTransaction, StorageError};

use crate::queries;

/// PostgreSQL transaction wrapper.
///
/// The sqlx transaction is kept in an `Option` so commit and rollback can
/// take ownership. If the wrapper is dropped while the transaction is still
/// open, sqlx issues the ROLLBACK.
pub struct PostgresTransaction {
    tx: Option<PgTransaction<'static>>,
}

impl PostgresTransaction {
    pub fn new(tx: PgTransaction<'static>) -> Self {
        Self { tx: Some(tx) }
    }

    fn open(&mut self) -> Result<&mut PgTransaction<'static>, StorageError> {
        self.tx.as_mut().ok_or_else(|| {
            StorageError::transaction_error(
                "Transaction already completed (committed or rolled back)",
            )
        })
    }
}

#[async_trait]
impl OrderTransaction for PostgresTransaction {
    async fn order_exists(&mut self, user_id: i64, voucher_id: i64) -> Result<bool, StorageError> {
        queries::order::exists_with_tx(self.open()?, user_id, voucher_id).await
    }

    async fn decrement_stock(&mut self, voucher_id: i64) -> Result<bool, StorageError> {
        queries::voucher::decrement_stock_with_tx(self.open()?, voucher_id).await
    }

    async fn insert_order(&mut self, order: &VoucherOrder) -> Result<(), StorageError> {
        queries::order::insert_with_tx(self.open()?, order).await
    }

    async fn commit(mut self: Box<Self>) -> Result<(), StorageError> {
        if let Some(tx) = self.tx.take() {
            tx.commit().await.map_err(|e| {
                StorageError::transaction_error(format!("Failed to commit transaction: {e}"))
            })?;
            tracing::debug!("Transaction committed successfully");
        }
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> Result<(), StorageError> {
        if let Some(tx) = self.tx.take() {
            tx.rollback().await.map_err(|e| {
                StorageError::transaction_error(format!("Failed to rollback transaction: {e}"))
            })?;
            tracing::debug!("Transaction rolled back successfully");
        }
        Ok(())
    }
}

impl Drop for PostgresTransaction {
    fn drop(&mut self) {
        if self.tx.is_some() {
            tracing::warn!(
                "PostgresTransaction dropped without explicit commit/rollback - will auto-rollback"
            );
        }
    }
}
