//! Shop reads through the cache facade.

use std::time::Duration;

use storefront_core::{Shop, ShopType};
use storefront_storage::{DynStorage, StorageError};

use crate::cache::{CacheClient, CacheResult, LogicalEntry};
use crate::error::{ServiceError, ServiceResult};
use crate::keys::{CACHE_HOT_SHOP_KEY, CACHE_SHOP_KEY, CACHE_SHOP_TYPE_LIST_KEY, LOCK_SHOP_KEY, shop_key};

#[derive(Clone)]
pub struct ShopService {
    storage: DynStorage,
    cache: CacheClient,
    ttl: Duration,
}

impl ShopService {
    pub fn new(storage: DynStorage, cache: CacheClient, ttl: Duration) -> Self {
        Self {
            storage,
            cache,
            ttl,
        }
    }

    /// Shop by id; unknown ids are remembered with a null marker.
    pub async fn query_by_id(&self, id: i64) -> CacheResult<Option<Shop>> {
        let storage = self.storage.clone();
        self.cache
            .query_with_pass_through(
                CACHE_SHOP_KEY,
                id,
                |id| async move { storage.get_shop(id).await },
                self.ttl,
            )
            .await
    }

    /// Same entry as [`ShopService::query_by_id`], rebuilt by a single caller
    /// at a time.
    pub async fn query_by_id_locked(&self, id: i64) -> CacheResult<Option<Shop>> {
        let storage = self.storage.clone();
        self.cache
            .query_with_mutex(
                CACHE_SHOP_KEY,
                id,
                |id| {
                    let storage = storage.clone();
                    async move { storage.get_shop(id).await }
                },
                self.ttl,
                LOCK_SHOP_KEY,
            )
            .await
    }

    /// Hot shop from a pre-warmed, logically expiring entry. Never blocks on
    /// the durable store; returns `None` until [`ShopService::warm_up`] ran.
    pub async fn query_hot(&self, id: i64) -> CacheResult<Option<Shop>> {
        let storage = self.storage.clone();
        self.cache
            .query_with_logical_expire(
                CACHE_HOT_SHOP_KEY,
                id,
                move |id| async move { storage.get_shop(id).await },
                self.ttl,
                LOCK_SHOP_KEY,
            )
            .await
    }

    /// Loads a shop into the hot cache with a logical expiry of `ttl`.
    pub async fn warm_up(&self, id: i64, ttl: Duration) -> ServiceResult<()> {
        let shop = self
            .storage
            .get_shop(id)
            .await?
            .ok_or_else(|| StorageError::not_found("Shop", id))?;
        self.cache
            .set_with_logical_expire(&format!("{CACHE_HOT_SHOP_KEY}{id}"), &shop, ttl)
            .await?;
        tracing::info!(shop_id = id, ttl_secs = ttl.as_secs(), "Warmed hot shop entry");
        Ok(())
    }

    /// Writes the durable row, then drops the cached copy.
    ///
    /// A hot entry, if present, is rewritten instead since logically
    /// expiring entries are never deleted.
    pub async fn update(&self, shop: &Shop) -> ServiceResult<()> {
        if shop.id <= 0 {
            return Err(ServiceError::invalid_input("shop id must be positive"));
        }

        self.storage.update_shop(shop).await?;
        self.cache.invalidate(&shop_key(shop.id)).await?;

        let hot_key = format!("{CACHE_HOT_SHOP_KEY}{}", shop.id);
        let hot: Option<LogicalEntry<Shop>> = self.cache.get(&hot_key).await?;
        if let Some(entry) = hot {
            let remaining = entry.expire_time - storefront_core::now_utc();
            let ttl = Duration::try_from(remaining).unwrap_or(Duration::ZERO);
            self.cache.set_with_logical_expire(&hot_key, shop, ttl).await?;
        }

        tracing::debug!(shop_id = shop.id, "Shop updated");
        Ok(())
    }

    /// All shop types by `sort`, cached as one list.
    ///
    /// An empty list is `NotFound` and is not cached.
    pub async fn type_list(&self) -> ServiceResult<Vec<ShopType>> {
        if let Some(types) = self.cache.get::<Vec<ShopType>>(CACHE_SHOP_TYPE_LIST_KEY).await? {
            return Ok(types);
        }

        let types = self.storage.list_shop_types().await?;
        if types.is_empty() {
            return Err(StorageError::not_found("ShopType", "*").into());
        }
        self.cache
            .set(CACHE_SHOP_TYPE_LIST_KEY, &types, self.ttl)
            .await?;
        Ok(types)
    }
}
