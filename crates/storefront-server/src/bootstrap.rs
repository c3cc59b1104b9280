//! Wiring of the storefront components and their lifecycle.
//!
//! Everything is constructed once in [`Storefront::build`] and shared by
//! `Arc`/`Clone`. [`Storefront::start`] spawns the order worker;
//! [`Storefront::shutdown`] stops it, then drains the cache rebuild pool.

use std::sync::Arc;

use parking_lot::Mutex;
use storefront_kv::{DynKvStore, create_kv_store};
use storefront_storage::DynStorage;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::cache::{CacheClient, RebuildPool};
use crate::config::AppConfig;
use crate::error::ServiceResult;
use crate::id_worker::IdWorker;
use crate::lock::LockClient;
use crate::seckill::{AdmissionController, OrderPersister, OrderWorker, intent_channel};
use crate::shop::ShopService;
use crate::voucher::VoucherService;

pub struct Storefront {
    config: AppConfig,
    kv: DynKvStore,
    storage: DynStorage,
    locks: LockClient,
    ids: IdWorker,
    cache: CacheClient,
    shops: ShopService,
    vouchers: VoucherService,
    admission: AdmissionController,
    rebuild_pool: Arc<RebuildPool>,
    worker: Mutex<Option<OrderWorker>>,
    worker_handle: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
}

impl Storefront {
    /// Connects the configured backends and builds every component.
    ///
    /// # Errors
    ///
    /// Fails if Redis is enabled but unreachable, or PostgreSQL is configured
    /// and cannot be connected or migrated.
    pub async fn build(config: &AppConfig) -> ServiceResult<Self> {
        let kv = create_kv_store(&config.redis).await?;
        let storage: DynStorage = match config.postgres.clone() {
            Some(pg) => {
                let storage: DynStorage = storefront_db_postgres::create_storage(pg).await?;
                storage
            }
            None => {
                tracing::info!("No PostgreSQL configured, using in-memory durable store");
                storefront_db_memory::create_storage()
            }
        };
        Ok(Self::from_parts(config.clone(), kv, storage))
    }

    /// Builds every component over already connected backends.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn from_parts(config: AppConfig, kv: DynKvStore, storage: DynStorage) -> Self {
        let locks = LockClient::new(kv.clone());
        let ids = IdWorker::new(kv.clone());
        let rebuild_pool = Arc::new(RebuildPool::new(config.cache.rebuild_workers));
        let cache = CacheClient::new(
            kv.clone(),
            locks.clone(),
            rebuild_pool.clone(),
            config.cache.clone(),
        );

        let shop_ttl = config.cache.shop_ttl();
        let shops = ShopService::new(storage.clone(), cache.clone(), shop_ttl);
        let vouchers = VoucherService::new(storage.clone(), kv.clone(), cache.clone(), shop_ttl);

        let (sink, feed) = intent_channel(&config.seckill);
        let admission = AdmissionController::new(kv.clone(), vouchers.clone(), ids.clone(), sink);
        let persister = OrderPersister::new(
            storage.clone(),
            locks.clone(),
            config.seckill.order_lock_ttl(),
        );
        let worker = OrderWorker::new(
            kv.clone(),
            persister,
            feed,
            config.seckill.pending_backoff(),
        );

        tracing::info!(
            kv = kv.backend_name(),
            transport = ?config.seckill.transport,
            rebuild_workers = rebuild_pool.size(),
            "Storefront components built"
        );

        Self {
            config,
            kv,
            storage,
            locks,
            ids,
            cache,
            shops,
            vouchers,
            admission,
            rebuild_pool,
            worker: Mutex::new(Some(worker)),
            worker_handle: Mutex::new(None),
            cancel: CancellationToken::new(),
        }
    }

    /// Spawns the order worker. Calling it again is a no-op.
    pub fn start(&self) {
        let Some(worker) = self.worker.lock().take() else {
            tracing::debug!("Order worker already started");
            return;
        };
        let handle = tokio::spawn(worker.run(self.cancel.child_token()));
        *self.worker_handle.lock() = Some(handle);
    }

    /// Stops the worker, waits for it, then drains pending cache rebuilds.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let handle = self.worker_handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Order worker task failed");
            }
        }
        self.rebuild_pool.shutdown().await;
        tracing::info!("Storefront shut down");
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn kv(&self) -> &DynKvStore {
        &self.kv
    }

    pub fn storage(&self) -> &DynStorage {
        &self.storage
    }

    pub fn locks(&self) -> &LockClient {
        &self.locks
    }

    pub fn ids(&self) -> &IdWorker {
        &self.ids
    }

    pub fn cache(&self) -> &CacheClient {
        &self.cache
    }

    pub fn shops(&self) -> &ShopService {
        &self.shops
    }

    pub fn vouchers(&self) -> &VoucherService {
        &self.vouchers
    }

    pub fn admission(&self) -> &AdmissionController {
        &self.admission
    }
}
