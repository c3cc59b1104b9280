use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use storefront_core::{SeckillVoucher, Shop, ShopType, VoucherOrder};
use storefront_storage::{OrderTransaction, StorageError, StorefrontStorage};
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, Default)]
struct Tables {
    shops: BTreeMap<i64, Shop>,
    shop_types: Vec<ShopType>,
    vouchers: HashMap<i64, SeckillVoucher>,
    orders: BTreeMap<i64, VoucherOrder>,
}

impl Tables {
    fn order_exists(&self, user_id: i64, voucher_id: i64) -> bool {
        self.orders
            .values()
            .any(|o| o.user_id == user_id && o.voucher_id == voucher_id)
    }
}

/// In-memory durable store.
///
/// All tables sit behind one async mutex. A transaction holds that mutex
/// from `begin_transaction` until commit, rollback or drop.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStorage {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryStorage {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a shop row.
    pub async fn insert_shop(&self, shop: Shop) {
        self.tables.lock().await.shops.insert(shop.id, shop);
    }

    /// Inserts or replaces a shop type row.
    pub async fn insert_shop_type(&self, shop_type: ShopType) {
        let mut tables = self.tables.lock().await;
        tables.shop_types.retain(|t| t.id != shop_type.id);
        tables.shop_types.push(shop_type);
    }

    /// Number of persisted orders.
    pub async fn order_count(&self) -> usize {
        self.tables.lock().await.orders.len()
    }
}

#[async_trait]
impl StorefrontStorage for InMemoryStorage {
    async fn get_shop(&self, id: i64) -> Result<Option<Shop>, StorageError> {
        Ok(self.tables.lock().await.shops.get(&id).cloned())
    }

    async fn update_shop(&self, shop: &Shop) -> Result<(), StorageError> {
        let mut tables = self.tables.lock().await;
        match tables.shops.get_mut(&shop.id) {
            Some(row) => {
                *row = shop.clone();
                Ok(())
            }
            None => Err(StorageError::not_found("shop", shop.id)),
        }
    }

    async fn list_shop_types(&self) -> Result<Vec<ShopType>, StorageError> {
        let mut types = self.tables.lock().await.shop_types.clone();
        types.sort_by_key(|t| (t.sort, t.id));
        Ok(types)
    }

    async fn get_voucher(&self, voucher_id: i64) -> Result<Option<SeckillVoucher>, StorageError> {
        Ok(self.tables.lock().await.vouchers.get(&voucher_id).cloned())
    }

    async fn create_voucher(&self, voucher: &SeckillVoucher) -> Result<(), StorageError> {
        if voucher.stock < 0 {
            return Err(StorageError::invalid_entity("voucher stock must not be negative"));
        }
        let mut tables = self.tables.lock().await;
        if tables.vouchers.contains_key(&voucher.voucher_id) {
            return Err(StorageError::already_exists("voucher", voucher.voucher_id));
        }
        tables.vouchers.insert(voucher.voucher_id, voucher.clone());
        Ok(())
    }

    async fn get_order(&self, order_id: i64) -> Result<Option<VoucherOrder>, StorageError> {
        Ok(self.tables.lock().await.orders.get(&order_id).cloned())
    }

    async fn count_orders(&self, user_id: i64, voucher_id: i64) -> Result<i64, StorageError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .orders
            .values()
            .filter(|o| o.user_id == user_id && o.voucher_id == voucher_id)
            .count() as i64)
    }

    async fn begin_transaction(&self) -> Result<Box<dyn OrderTransaction>, StorageError> {
        let guard = Arc::clone(&self.tables).lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryTransaction { guard, working }))
    }
}

/// Transaction over [`InMemoryStorage`].
///
/// Changes go to `working` and are copied back on commit.
pub struct InMemoryTransaction {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

#[async_trait]
impl OrderTransaction for InMemoryTransaction {
    async fn order_exists(&mut self, user_id: i64, voucher_id: i64) -> Result<bool, StorageError> {
        Ok(self.working.order_exists(user_id, voucher_id))
    }

    async fn decrement_stock(&mut self, voucher_id: i64) -> Result<bool, StorageError> {
        match self.working.vouchers.get_mut(&voucher_id) {
            Some(voucher) if voucher.stock > 0 => {
                voucher.stock -= 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_order(&mut self, order: &VoucherOrder) -> Result<(), StorageError> {
        if self.working.order_exists(order.user_id, order.voucher_id) {
            return Err(StorageError::already_exists(
                "voucher_order",
                format!("user {} / voucher {}", order.user_id, order.voucher_id),
            ));
        }
        if self.working.orders.contains_key(&order.id) {
            return Err(StorageError::already_exists("voucher_order", order.id));
        }
        self.working.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StorageError> {
        let InMemoryTransaction { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StorageError> {
        tracing::debug!("in-memory transaction rolled back");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn voucher(id: i64, stock: i32) -> SeckillVoucher {
        SeckillVoucher {
            voucher_id: id,
            stock,
            begin_time: datetime!(2024-01-01 00:00 UTC),
            end_time: datetime!(2030-01-01 00:00 UTC),
        }
    }

    fn order(id: i64, user_id: i64, voucher_id: i64) -> VoucherOrder {
        VoucherOrder {
            id,
            user_id,
            voucher_id,
            created_at: datetime!(2024-06-01 12:00 UTC),
        }
    }

    fn shop(id: i64, name: &str) -> Shop {
        Shop {
            id,
            name: name.to_string(),
            type_id: 1,
            images: String::new(),
            area: None,
            address: "somewhere".into(),
            x: 0.0,
            y: 0.0,
            avg_price: None,
            sold: 0,
            comments: 0,
            score: 0,
            open_hours: None,
        }
    }

    #[tokio::test]
    async fn test_commit_persists_order_and_stock() {
        let storage = InMemoryStorage::new();
        storage.create_voucher(&voucher(1, 2)).await.unwrap();

        let mut tx = storage.begin_transaction().await.unwrap();
        assert!(!tx.order_exists(10, 1).await.unwrap());
        assert!(tx.decrement_stock(1).await.unwrap());
        tx.insert_order(&order(100, 10, 1)).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(storage.get_voucher(1).await.unwrap().unwrap().stock, 1);
        assert_eq!(storage.count_orders(10, 1).await.unwrap(), 1);
        assert!(storage.get_order(100).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_rollback_and_drop_discard_changes() {
        let storage = InMemoryStorage::new();
        storage.create_voucher(&voucher(1, 1)).await.unwrap();

        let mut tx = storage.begin_transaction().await.unwrap();
        tx.decrement_stock(1).await.unwrap();
        tx.insert_order(&order(100, 10, 1)).await.unwrap();
        tx.rollback().await.unwrap();

        {
            let mut tx = storage.begin_transaction().await.unwrap();
            tx.decrement_stock(1).await.unwrap();
        }

        assert_eq!(storage.get_voucher(1).await.unwrap().unwrap().stock, 1);
        assert_eq!(storage.order_count().await, 0);
    }

    #[tokio::test]
    async fn test_stock_never_goes_negative() {
        let storage = InMemoryStorage::new();
        storage.create_voucher(&voucher(1, 0)).await.unwrap();

        let mut tx = storage.begin_transaction().await.unwrap();
        assert!(!tx.decrement_stock(1).await.unwrap());
        assert!(!tx.decrement_stock(99).await.unwrap());
        tx.commit().await.unwrap();
        assert_eq!(storage.get_voucher(1).await.unwrap().unwrap().stock, 0);
    }

    #[tokio::test]
    async fn test_duplicate_user_voucher_rejected() {
        let storage = InMemoryStorage::new();
        let mut tx = storage.begin_transaction().await.unwrap();
        tx.insert_order(&order(1, 10, 1)).await.unwrap();
        let err = tx.insert_order(&order(2, 10, 1)).await.unwrap_err();
        assert!(err.is_already_exists());
        // Same user, other voucher is fine
        tx.insert_order(&order(3, 10, 2)).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(storage.order_count().await, 2);
    }

    #[tokio::test]
    async fn test_update_shop_requires_existing_row() {
        let storage = InMemoryStorage::new();
        let err = storage.update_shop(&shop(1, "x")).await.unwrap_err();
        assert!(err.is_not_found());

        storage.insert_shop(shop(1, "old")).await;
        storage.update_shop(&shop(1, "new")).await.unwrap();
        assert_eq!(storage.get_shop(1).await.unwrap().unwrap().name, "new");
    }

    #[tokio::test]
    async fn test_shop_types_sorted() {
        let storage = InMemoryStorage::new();
        for (id, sort) in [(1, 3), (2, 1), (3, 2)] {
            storage
                .insert_shop_type(ShopType {
                    id,
                    name: format!("t{id}"),
                    icon: String::new(),
                    sort,
                })
                .await;
        }
        let ids: Vec<i64> = storage
            .list_shop_types()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[tokio::test]
    async fn test_create_voucher_twice_conflicts() {
        let storage = InMemoryStorage::new();
        storage.create_voucher(&voucher(5, 1)).await.unwrap();
        assert!(
            storage
                .create_voucher(&voucher(5, 1))
                .await
                .unwrap_err()
                .is_already_exists()
        );
    }
}
