//! Prometheus metrics for the storefront services.
//!
//! This module provides:
//! - Cache metrics (hits, misses, rebuild outcomes)
//! - Flash-sale metrics (admission outcomes, persisted order outcomes)
//!
//! Recording is always safe: without an installed recorder the `metrics`
//! macros are no-ops, so unit tests never need to call [`init_metrics`].

use metrics::counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

/// Global Prometheus handle for rendering metrics.
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metric names as constants for consistency.
pub mod names {
    // Cache metrics
    pub const CACHE_HITS_TOTAL: &str = "cache_hits_total";
    pub const CACHE_MISSES_TOTAL: &str = "cache_misses_total";
    pub const CACHE_REBUILDS_TOTAL: &str = "cache_rebuilds_total";

    // Flash-sale metrics
    pub const SECKILL_ADMISSIONS_TOTAL: &str = "seckill_admissions_total";
    pub const SECKILL_ORDERS_TOTAL: &str = "seckill_orders_total";
}

/// Initialize the Prometheus metrics exporter.
///
/// This should be called once at startup.
/// Returns `true` if initialization succeeded, `false` if already initialized.
pub fn init_metrics() -> bool {
    if PROMETHEUS_HANDLE.get().is_some() {
        tracing::debug!("Prometheus metrics already initialized");
        return false;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if PROMETHEUS_HANDLE.set(handle).is_err() {
                tracing::warn!("Failed to store Prometheus handle (already set)");
                return false;
            }

            tracing::info!("Prometheus metrics initialized");
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to install Prometheus recorder");
            false
        }
    }
}

/// Render all metrics in Prometheus text format.
///
/// Returns `None` if metrics were not initialized.
pub fn render_metrics() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(|handle| handle.render())
}

// =============================================================================
// Cache Metrics
// =============================================================================

/// Extracts the namespace of a cache key (`cache:shop:1` -> `cache:shop`).
fn key_namespace(key: &str) -> &str {
    match key.rfind(':') {
        Some(idx) if idx > 0 => &key[..idx],
        _ => key,
    }
}

/// Record a cache hit (null markers count as hits).
pub fn record_cache_hit(key: &str) {
    counter!(names::CACHE_HITS_TOTAL, "namespace" => key_namespace(key).to_string()).increment(1);
}

/// Record a cache miss.
pub fn record_cache_miss(key: &str) {
    counter!(names::CACHE_MISSES_TOTAL, "namespace" => key_namespace(key).to_string()).increment(1);
}

/// Record the outcome of a cache rebuild (`rebuilt`, `absent`, `failed`).
pub fn record_cache_rebuild(outcome: &'static str) {
    counter!(names::CACHE_REBUILDS_TOTAL, "outcome" => outcome).increment(1);
}

// =============================================================================
// Flash-sale Metrics
// =============================================================================

/// Record an admission decision (`accepted` or a rejection reason).
pub fn record_admission(outcome: &'static str) {
    counter!(names::SECKILL_ADMISSIONS_TOTAL, "outcome" => outcome).increment(1);
}

/// Record what the order worker did with one intent.
pub fn record_order(outcome: &'static str) {
    counter!(names::SECKILL_ORDERS_TOTAL, "outcome" => outcome).increment(1);
}

/// Record an intent the order worker could not persist.
pub fn record_order_failure(category: &'static str) {
    counter!(
        names::SECKILL_ORDERS_TOTAL,
        "outcome" => "failed",
        "category" => category
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_namespace() {
        assert_eq!(key_namespace("cache:shop:1"), "cache:shop");
        assert_eq!(key_namespace("cache:shopList"), "cache");
        assert_eq!(key_namespace("plain"), "plain");
    }

    #[test]
    fn test_record_without_recorder_is_noop() {
        record_cache_hit("cache:shop:1");
        record_cache_miss("cache:shop:2");
        record_cache_rebuild("rebuilt");
        record_admission("accepted");
        record_order("created");
    }
}
