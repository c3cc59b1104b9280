//! Integration tests for the Redis key-value backend.
//!
//! Tests use testcontainers to spin up a real Redis instance and are ignored
//! by default; run with `cargo test -- --ignored` when Docker is available.

use std::time::Duration;

use storefront_kv::{
    AdmitStatus, KvScript, KvStore, RedisConfig, RedisKvStore, StreamCursor, create_kv_store,
    create_pool,
};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::redis::Redis;
use tokio::sync::OnceCell;

// Shared Redis container for all tests
static SHARED_REDIS: OnceCell<(ContainerAsync<Redis>, String)> = OnceCell::const_new();

async fn get_redis_url() -> String {
    let (_, url) = SHARED_REDIS
        .get_or_init(|| async {
            let container = Redis::default()
                .start()
                .await
                .expect("start redis container");

            let host_port = container.get_host_port_ipv4(6379).await.expect("get port");
            let url = format!("redis://127.0.0.1:{}", host_port);

            (container, url)
        })
        .await;

    url.clone()
}

async fn store() -> RedisKvStore {
    let config = RedisConfig {
        url: get_redis_url().await,
        ..Default::default()
    };
    RedisKvStore::new(create_pool(&config).expect("create pool"))
}

fn unique(prefix: &str) -> String {
    format!("{prefix}:{}", nanos())
}

fn nanos() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos()
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_create_kv_store_selects_redis() {
    let config = RedisConfig {
        url: get_redis_url().await,
        ..Default::default()
    };
    let kv = create_kv_store(&config).await.unwrap();
    assert_eq!(kv.backend_name(), "redis");
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_strings_ttl_and_set_nx() {
    let kv = store().await;
    let key = unique("test:str");

    kv.set(&key, "v", Some(Duration::from_secs(30))).await.unwrap();
    assert_eq!(kv.get(&key).await.unwrap().as_deref(), Some("v"));
    let ttl = kv.ttl(&key).await.unwrap().unwrap();
    assert!(ttl <= Duration::from_secs(30));

    assert!(!kv.set_nx(&key, "other", Duration::from_secs(5)).await.unwrap());
    assert!(kv.del(&key).await.unwrap());
    assert!(kv.set_nx(&key, "other", Duration::from_secs(5)).await.unwrap());

    let plain = unique("test:plain");
    kv.set(&plain, "v", None).await.unwrap();
    assert_eq!(kv.ttl(&plain).await.unwrap(), None);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_incr_counts_from_one() {
    let kv = store().await;
    let key = unique("icr:test");
    assert_eq!(kv.incr(&key).await.unwrap(), 1);
    assert_eq!(kv.incr(&key).await.unwrap(), 2);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_release_lock_script() {
    let kv = store().await;
    let key = unique("lock:test");
    kv.set_nx(&key, "me", Duration::from_secs(10)).await.unwrap();

    let keys = vec![key.clone()];
    assert_eq!(
        kv.eval(KvScript::ReleaseLock, &keys, &strings(&["you"])).await.unwrap(),
        0
    );
    assert_eq!(
        kv.eval(KvScript::ReleaseLock, &keys, &strings(&["me"])).await.unwrap(),
        1
    );
    assert_eq!(kv.get(&key).await.unwrap(), None);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_admit_script_with_stream() {
    let kv = store().await;
    let stock = unique("seckill:stock");
    let admitted = unique("seckill:order");
    let stream = unique("stream.orders");
    kv.ensure_group(&stream, "g1").await.unwrap();
    kv.set(&stock, "1", None).await.unwrap();

    let keys = vec![stock.clone(), admitted.clone(), stream.clone()];
    let args = strings(&["5", "userId", "5", "voucherId", "1", "id", "99"]);
    let status = kv.eval(KvScript::Admit, &keys, &args).await.unwrap();
    assert_eq!(AdmitStatus::from_code(status), Some(AdmitStatus::Reserved));

    let status = kv.eval(KvScript::Admit, &keys, &args).await.unwrap();
    assert_eq!(AdmitStatus::from_code(status), Some(AdmitStatus::Duplicate));

    let args = strings(&["6", "userId", "6", "voucherId", "1", "id", "100"]);
    let status = kv.eval(KvScript::Admit, &keys, &args).await.unwrap();
    assert_eq!(AdmitStatus::from_code(status), Some(AdmitStatus::SoldOut));

    let entries = kv
        .read_group(
            &stream,
            "g1",
            "c1",
            StreamCursor::New {
                block: Some(Duration::from_millis(100)),
            },
            10,
        )
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].field("id"), Some("99"));

    let pending = kv
        .read_group(&stream, "g1", "c1", StreamCursor::Pending, 10)
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);

    kv.ack(&stream, "g1", &pending[0].id).await.unwrap();
    let pending = kv
        .read_group(&stream, "g1", "c1", StreamCursor::Pending, 10)
        .await
        .unwrap();
    assert!(pending.is_empty());
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_cancel_admit_script() {
    let kv = store().await;
    let stock = unique("seckill:stock");
    let admitted = unique("seckill:order");
    kv.set(&stock, "1", None).await.unwrap();

    let keys = vec![stock.clone(), admitted.clone()];
    let status = kv.eval(KvScript::Admit, &keys, &strings(&["5"])).await.unwrap();
    assert_eq!(AdmitStatus::from_code(status), Some(AdmitStatus::Reserved));

    assert_eq!(kv.eval(KvScript::CancelAdmit, &keys, &strings(&["5"])).await.unwrap(), 1);
    assert_eq!(kv.eval(KvScript::CancelAdmit, &keys, &strings(&["5"])).await.unwrap(), 0);
    assert_eq!(kv.get(&stock).await.unwrap().as_deref(), Some("1"));
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_ensure_group_is_idempotent() {
    let kv = store().await;
    let stream = unique("stream.idem");
    kv.ensure_group(&stream, "g1").await.unwrap();
    kv.ensure_group(&stream, "g1").await.unwrap();

    let empty = kv
        .read_group(
            &stream,
            "g1",
            "c1",
            StreamCursor::New {
                block: Some(Duration::from_millis(50)),
            },
            1,
        )
        .await
        .unwrap();
    assert!(empty.is_empty());
}
