//! Flash-sale voucher registration and lookup.

use std::time::Duration;

use storefront_core::SeckillVoucher;
use storefront_kv::DynKvStore;
use storefront_storage::DynStorage;

use crate::cache::{CacheClient, CacheResult};
use crate::error::{ServiceError, ServiceResult};
use crate::keys::{CACHE_VOUCHER_KEY, stock_key};

#[derive(Clone)]
pub struct VoucherService {
    storage: DynStorage,
    kv: DynKvStore,
    cache: CacheClient,
    ttl: Duration,
}

impl VoucherService {
    pub fn new(storage: DynStorage, kv: DynKvStore, cache: CacheClient, ttl: Duration) -> Self {
        Self {
            storage,
            kv,
            cache,
            ttl,
        }
    }

    /// Persists the voucher and mirrors its stock to `seckill:stock:{id}` so
    /// admission never has to read the durable store.
    pub async fn add_seckill_voucher(&self, voucher: &SeckillVoucher) -> ServiceResult<()> {
        if voucher.stock < 0 {
            return Err(ServiceError::invalid_input("stock must not be negative"));
        }
        if voucher.begin_time >= voucher.end_time {
            return Err(ServiceError::invalid_input("beginTime must be before endTime"));
        }

        self.storage.create_voucher(voucher).await?;
        self.kv
            .set(&stock_key(voucher.voucher_id), &voucher.stock.to_string(), None)
            .await?;
        // Drop a null marker cached by a lookup that raced the registration
        self.cache
            .invalidate(&format!("{CACHE_VOUCHER_KEY}{}", voucher.voucher_id))
            .await?;

        tracing::info!(
            voucher_id = voucher.voucher_id,
            stock = voucher.stock,
            "Registered seckill voucher"
        );
        Ok(())
    }

    /// Voucher metadata through the pass-through cache.
    ///
    /// The cached `stock` is a snapshot; the live count is the KV mirror.
    pub async fn find(&self, voucher_id: i64) -> CacheResult<Option<SeckillVoucher>> {
        let storage = self.storage.clone();
        self.cache
            .query_with_pass_through(
                CACHE_VOUCHER_KEY,
                voucher_id,
                |id| async move { storage.get_voucher(id).await },
                self.ttl,
            )
            .await
    }
}
