//! Key namespace shared with every other service reading the same KV store.

/// Cached shop payloads, `cache:shop:{id}`.
pub const CACHE_SHOP_KEY: &str = "cache:shop:";
/// Pre-warmed shops with a logical expiry, `cache:shop:hot:{id}`.
pub const CACHE_HOT_SHOP_KEY: &str = "cache:shop:hot:";
/// The whole shop type list.
pub const CACHE_SHOP_TYPE_LIST_KEY: &str = "cache:shopList";
/// Cached voucher metadata, `cache:voucher:{id}`.
pub const CACHE_VOUCHER_KEY: &str = "cache:voucher:";

/// Rebuild lock for a shop entry.
pub const LOCK_SHOP_KEY: &str = "lock:shop:";
/// Per-user lock held by the order worker.
pub const LOCK_ORDER_KEY: &str = "lock:order:";

/// Stock mirror read by the admission script.
pub const SECKILL_STOCK_KEY: &str = "seckill:stock:";
/// Set of user ids admitted for a voucher.
pub const SECKILL_ORDER_KEY: &str = "seckill:order:";

/// Day-scoped ID counters, `icr:{business}:{yyyy:MM:dd}`.
pub const ID_COUNTER_KEY: &str = "icr:";
/// Business key of order ids.
pub const ORDER_ID_PREFIX: &str = "order";

pub fn shop_key(id: i64) -> String {
    format!("{CACHE_SHOP_KEY}{id}")
}

pub fn stock_key(voucher_id: i64) -> String {
    format!("{SECKILL_STOCK_KEY}{voucher_id}")
}

pub fn admitted_key(voucher_id: i64) -> String {
    format!("{SECKILL_ORDER_KEY}{voucher_id}")
}

pub fn order_lock_key(user_id: i64) -> String {
    format!("{LOCK_ORDER_KEY}{user_id}")
}
