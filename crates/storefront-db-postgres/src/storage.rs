//! PostgreSQL implementation of the StorefrontStorage trait.

use async_trait::async_trait;
use sqlx_postgres::PgPool;
use storefront_core::{SeckillVoucher, Shop, ShopType, VoucherOrder};
use storefront_storage::{OrderTransaction, StorageError, StorefrontStorage};

use crate::config::PostgresConfig;
use crate::migrations;
use crate::pool;
use crate::queries;
use crate::transaction::PostgresTransaction;

/// PostgreSQL durable store.
#[derive(Debug, Clone)]
pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    /// Creates a new `PostgresStorage` with the given configuration.
    ///
    /// This will:
    /// 1. Create a connection pool
    /// 2. Run migrations (if configured)
    ///
    /// # Errors
    ///
    /// Returns an error if the connection pool cannot be created
    /// or if migrations fail.
    pub async fn new(config: PostgresConfig) -> Result<Self, StorageError> {
        let pool = pool::create_pool(&config).await?;

        if config.run_migrations {
            migrations::run(&pool).await?;
        }

        Ok(Self { pool })
    }

    /// Creates a new `PostgresStorage` from an existing connection pool.
    ///
    /// Migrations are not run automatically when using this constructor.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Inserts a shop row (seeding and tests).
    pub async fn insert_shop(&self, shop: &Shop) -> Result<(), StorageError> {
        queries::shop::insert(&self.pool, shop).await
    }

    /// Inserts a shop type row (seeding and tests).
    pub async fn insert_shop_type(&self, shop_type: &ShopType) -> Result<(), StorageError> {
        queries::shop::insert_type(&self.pool, shop_type).await
    }
}

#[async_trait]
impl StorefrontStorage for PostgresStorage {
    async fn get_shop(&self, id: i64) -> Result<Option<Shop>, StorageError> {
        queries::shop::get(&self.pool, id).await
    }

    async fn update_shop(&self, shop: &Shop) -> Result<(), StorageError> {
        queries::shop::update(&self.pool, shop).await
    }

    async fn list_shop_types(&self) -> Result<Vec<ShopType>, StorageError> {
        queries::shop::list_types(&self.pool).await
    }

    async fn get_voucher(&self, voucher_id: i64) -> Result<Option<SeckillVoucher>, StorageError> {
        queries::voucher::get(&self.pool, voucher_id).await
    }

    async fn create_voucher(&self, voucher: &SeckillVoucher) -> Result<(), StorageError> {
        queries::voucher::create(&self.pool, voucher).await
    }

    async fn get_order(&self, order_id: i64) -> Result<Option<VoucherOrder>, StorageError> {
        queries::order::get(&self.pool, order_id).await
    }

    async fn count_orders(&self, user_id: i64, voucher_id: i64) -> Result<i64, StorageError> {
        queries::order::count(&self.pool, user_id, voucher_id).await
    }

    async fn begin_transaction(&self) -> Result<Box<dyn OrderTransaction>, StorageError> {
        let tx = self.pool.begin().await.map_err(|e| {
            StorageError::transaction_error(format!("Failed to begin transaction: {e}"))
        })?;
        Ok(Box::new(PostgresTransaction::new(tx)))
    }
}
