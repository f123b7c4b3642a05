//! # 缓存后端测试
//!
//! Redis 测试需要本地 Redis 实例，默认忽略：
//! `cargo test --test cache_backend_test -- --ignored`

use bytes::Bytes;
use cache_gateway::cache::{CacheBackend, CacheEntry, CacheStore, KeyDeriver, RedisBackend};
use cache_gateway::config::{AppConfig, CacheType, RedisConfig};
use cache_gateway::server::connect_backend;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

const NO_PARAMS: [(&str, &str); 0] = [];

fn entry(body: &'static str) -> CacheEntry {
    CacheEntry {
        status: 200,
        headers: vec![("content-type".to_string(), "application/json".to_string())],
        body: Bytes::from_static(body.as_bytes()),
        cached_at: Utc::now(),
    }
}

#[tokio::test]
async fn memory_backend_is_selected_by_config() {
    let mut config = AppConfig::default();
    config.cache.backend = CacheType::Memory;

    let backend = connect_backend(&config).await.unwrap();
    assert_eq!(backend.name(), "memory");
    assert!(backend.ping().await.is_ok());
}

#[tokio::test]
async fn unreachable_redis_fails_at_startup() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let mut config = AppConfig::default();
    config.cache.backend = CacheType::Redis;
    config.cache.redis = RedisConfig {
        host: "127.0.0.1".to_string(),
        port,
        connection_timeout: 1,
        ..RedisConfig::default()
    };

    assert!(connect_backend(&config).await.is_err());
}

#[tokio::test]
#[ignore = "需要本地 Redis 实例"]
async fn redis_round_trip_and_pattern_delete() {
    let backend = RedisBackend::connect(RedisConfig::default()).await.unwrap();
    let store = CacheStore::new(Arc::new(backend), Duration::from_secs(2));
    let deriver = KeyDeriver::new("gateway_cache_test");

    let keys: Vec<_> = (0..3)
        .map(|i| deriver.derive_key("GET", &format!("http://upstream-a/{i}"), NO_PARAMS, None))
        .collect();
    for key in &keys {
        assert!(store.set(key, &entry(r#"{"ok":true}"#), Duration::from_secs(30)).await);
    }
    assert_eq!(store.get(&keys[0]).await.map(|e| e.body), Some(Bytes::from_static(br#"{"ok":true}"#)));

    assert_eq!(store.delete_by_pattern(&deriver.all_entries_pattern()).await, 3);
    assert!(store.get(&keys[0]).await.is_none());
    assert!(store.ping().await);
}

#[tokio::test]
#[ignore = "需要本地 Redis 实例"]
async fn redis_entry_expires() {
    let backend = RedisBackend::connect(RedisConfig::default()).await.unwrap();
    let store = CacheStore::new(Arc::new(backend), Duration::from_secs(2));
    let key = KeyDeriver::new("gateway_cache_test").derive_key("GET", "http://u/ttl", NO_PARAMS, None);

    assert!(store.set(&key, &entry("{}"), Duration::from_millis(300)).await);
    assert!(store.get(&key).await.is_some());
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(store.get(&key).await.is_none());
}
