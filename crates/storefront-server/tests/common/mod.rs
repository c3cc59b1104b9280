#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use storefront_core::{SeckillVoucher, Shop, now_utc};
use storefront_db_memory::InMemoryStorage;
use storefront_kv::MemoryKvStore;
use storefront_server::{AppConfig, IntentTransport, Storefront};
use storefront_storage::StorefrontStorage;

pub struct Harness {
    pub storefront: Storefront,
    pub kv: Arc<MemoryKvStore>,
    pub storage: Arc<InMemoryStorage>,
}

pub fn config(transport: IntentTransport) -> AppConfig {
    let mut config = AppConfig::default();
    config.redis.enabled = false;
    config.seckill.transport = transport;
    config.seckill.block_ms = 50;
    config.seckill.queue_capacity = 1024;
    config.cache.mutex_retry_delay_ms = 5;
    config
}

pub fn harness(transport: IntentTransport) -> Harness {
    harness_with(config(transport))
}

pub fn harness_with(config: AppConfig) -> Harness {
    let kv = Arc::new(MemoryKvStore::new());
    let storage = Arc::new(InMemoryStorage::new());
    let storefront = Storefront::from_parts(config, kv.clone(), storage.clone());
    Harness {
        storefront,
        kv,
        storage,
    }
}

/// A voucher whose sale window is open for the next hour.
pub fn open_voucher(voucher_id: i64, stock: i32) -> SeckillVoucher {
    let now = now_utc();
    SeckillVoucher {
        voucher_id,
        stock,
        begin_time: now - Duration::from_secs(60),
        end_time: now + Duration::from_secs(3600),
    }
}

pub fn shop(id: i64, name: &str) -> Shop {
    Shop {
        id,
        name: name.to_string(),
        type_id: 1,
        images: String::new(),
        area: Some("Riverside".to_string()),
        address: format!("{id} Market Street"),
        x: 120.15,
        y: 30.28,
        avg_price: Some(60),
        sold: 100,
        comments: 20,
        score: 45,
        open_hours: Some("10:00-22:00".to_string()),
    }
}

/// Polls until the durable store holds `count` orders or two seconds pass.
pub async fn wait_for_orders(storage: &InMemoryStorage, count: usize) -> bool {
    for _ in 0..200 {
        if storage.order_count().await >= count {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

pub async fn durable_stock(storage: &InMemoryStorage, voucher_id: i64) -> i32 {
    storage
        .get_voucher(voucher_id)
        .await
        .unwrap()
        .expect("voucher exists")
        .stock
}
