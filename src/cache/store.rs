//! # 缓存存储
//!
//! 在 [`CacheBackend`] 之上提供带超时的响应缓存读写。
//!
//! 存储层对调用方永不失败：超时、连接错误和损坏的缓存数据都会被记录日志，
//! 然后分别降级为未命中、写入失败或删除数量为 0。

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::abstract_cache::CacheBackend;
use super::keys::CacheKey;
use crate::error::{CacheError, CacheResult};
use crate::{ldebug, lwarn, logging::{LogComponent, LogStage}};

/// 缓存中保存的上游响应
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// 上游状态码
    pub status: u16,
    /// 上游响应头（不含传输层头部和 Set-Cookie）
    pub headers: Vec<(String, String)>,
    /// 原始响应体，序列化为 base64
    #[serde(with = "base64_body")]
    pub body: Bytes,
    /// 写入缓存的时间
    pub cached_at: DateTime<Utc>,
}

mod base64_body {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    pub fn serialize<S: Serializer>(body: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(body))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map(Bytes::from)
            .map_err(D::Error::custom)
    }
}

/// 响应缓存存储
#[derive(Clone)]
pub struct CacheStore {
    backend: Arc<dyn CacheBackend>,
    operation_timeout: Duration,
}

impl CacheStore {
    /// 创建缓存存储，所有后端调用都受 `operation_timeout` 约束
    pub fn new(backend: Arc<dyn CacheBackend>, operation_timeout: Duration) -> Self {
        Self {
            backend,
            operation_timeout,
        }
    }

    /// 后端名称
    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    async fn bounded<T, F>(&self, operation: F) -> CacheResult<T>
    where
        F: Future<Output = CacheResult<T>>,
    {
        tokio::time::timeout(self.operation_timeout, operation)
            .await
            .map_err(|_| CacheError::Timeout(self.operation_timeout))?
    }

    /// 读取缓存条目，任何失败都视为未命中
    pub async fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        let raw = match self.bounded(self.backend.get(key.as_str())).await {
            Ok(raw) => raw?,
            Err(e) => {
                lwarn!(
                    "system",
                    LogStage::Cache,
                    LogComponent::Cache,
                    "cache_get_failed",
                    &format!("读取缓存失败，按未命中处理: {e}"),
                    key = key
                );
                return None;
            }
        };

        match serde_json::from_str::<CacheEntry>(&raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                lwarn!(
                    "system",
                    LogStage::Cache,
                    LogComponent::Cache,
                    "cache_entry_corrupted",
                    &format!("缓存数据无法解析，按未命中处理: {e}"),
                    key = key
                );
                None
            }
        }
    }

    /// 写入缓存条目，返回是否成功
    pub async fn set(&self, key: &CacheKey, entry: &CacheEntry, ttl: Duration) -> bool {
        let result = match serde_json::to_string(entry) {
            Ok(payload) => {
                self.bounded(self.backend.set_ex(key.as_str(), &payload, ttl))
                    .await
            }
            Err(e) => Err(CacheError::from(e)),
        };

        match result {
            Ok(()) => {
                ldebug!(
                    "system",
                    LogStage::Cache,
                    LogComponent::Cache,
                    "cache_set",
                    "缓存写入成功",
                    key = key,
                    ttl_seconds = ttl.as_secs()
                );
                true
            }
            Err(e) => {
                lwarn!(
                    "system",
                    LogStage::Cache,
                    LogComponent::Cache,
                    "cache_set_failed",
                    &format!("写入缓存失败: {e}"),
                    key = key
                );
                false
            }
        }
    }

    /// 删除匹配模式的所有条目，失败时返回 0
    pub async fn delete_by_pattern(&self, pattern: &str) -> u64 {
        match self.bounded(self.backend.delete_pattern(pattern)).await {
            Ok(deleted) => {
                ldebug!(
                    "system",
                    LogStage::Cache,
                    LogComponent::Cache,
                    "cache_invalidate",
                    "按模式清理缓存完成",
                    pattern = pattern,
                    deleted = deleted
                );
                deleted
            }
            Err(e) => {
                lwarn!(
                    "system",
                    LogStage::Cache,
                    LogComponent::Cache,
                    "cache_invalidate_failed",
                    &format!("按模式清理缓存失败: {e}"),
                    pattern = pattern
                );
                0
            }
        }
    }

    /// 后端健康检查
    pub async fn ping(&self) -> bool {
        match self.bounded(self.backend.ping()).await {
            Ok(()) => true,
            Err(e) => {
                lwarn!(
                    "system",
                    LogStage::HealthCheck,
                    LogComponent::Cache,
                    "cache_ping_failed",
                    &format!("缓存后端不可用: {e}"),
                    backend = self.backend.name()
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{KeyDeriver, MemoryBackend};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    const NO_PARAMS: [(&str, &str); 0] = [];

    fn sample_entry() -> CacheEntry {
        CacheEntry {
            status: 200,
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: Bytes::from_static(br#"{"id":42}"#),
            cached_at: Utc::now(),
        }
    }

    fn key(path: &str) -> CacheKey {
        KeyDeriver::default().derive_key("GET", &format!("http://upstream-a{path}"), NO_PARAMS, None)
    }

    fn memory_store() -> CacheStore {
        CacheStore::new(Arc::new(MemoryBackend::new(100)), Duration::from_millis(200))
    }

    /// 所有操作都失败的后端
    struct BrokenBackend;

    #[async_trait]
    impl CacheBackend for BrokenBackend {
        fn name(&self) -> &'static str {
            "broken"
        }
        async fn get(&self, _key: &str) -> CacheResult<Option<String>> {
            Err(CacheError::operation("connection refused"))
        }
        async fn set_ex(&self, _key: &str, _value: &str, _ttl: Duration) -> CacheResult<()> {
            Err(CacheError::operation("connection refused"))
        }
        async fn delete_pattern(&self, _pattern: &str) -> CacheResult<u64> {
            Err(CacheError::operation("connection refused"))
        }
        async fn ping(&self) -> CacheResult<()> {
            Err(CacheError::operation("connection refused"))
        }
    }

    /// 每次调用都挂起的后端
    struct StalledBackend;

    #[async_trait]
    impl CacheBackend for StalledBackend {
        fn name(&self) -> &'static str {
            "stalled"
        }
        async fn get(&self, _key: &str) -> CacheResult<Option<String>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(None)
        }
        async fn set_ex(&self, _key: &str, _value: &str, _ttl: Duration) -> CacheResult<()> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        }
        async fn delete_pattern(&self, _pattern: &str) -> CacheResult<u64> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(1)
        }
        async fn ping(&self) -> CacheResult<()> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        }
    }

    #[test]
    fn test_entry_body_is_base64_in_json() {
        let entry = sample_entry();
        let json: serde_json::Value = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["body"], "eyJpZCI6NDJ9");
        assert_eq!(json["status"], 200);
    }

    #[tokio::test]
    async fn test_round_trip() {
        let store = memory_store();
        let entry = sample_entry();
        assert!(store.set(&key("/42"), &entry, Duration::from_secs(60)).await);
        assert_eq!(store.get(&key("/42")).await, Some(entry));
        assert_eq!(store.get(&key("/43")).await, None);
        assert!(store.ping().await);
        assert_eq!(store.backend_name(), "memory");
    }

    #[tokio::test]
    async fn test_entry_expires() {
        let store = memory_store();
        assert!(
            store
                .set(&key("/42"), &sample_entry(), Duration::from_millis(50))
                .await
        );
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(store.get(&key("/42")).await, None);
    }

    #[tokio::test]
    async fn test_delete_by_pattern() {
        let store = memory_store();
        let ttl = Duration::from_secs(60);
        for path in ["/1", "/2", "/3"] {
            assert!(store.set(&key(path), &sample_entry(), ttl).await);
        }

        assert_eq!(store.delete_by_pattern("gateway_cache:*").await, 3);
        for path in ["/1", "/2", "/3"] {
            assert_eq!(store.get(&key(path)).await, None);
        }
        assert_eq!(store.delete_by_pattern("gateway_cache:*").await, 0);
    }

    #[tokio::test]
    async fn test_broken_backend_is_absorbed() {
        let store = CacheStore::new(Arc::new(BrokenBackend), Duration::from_millis(200));
        assert_eq!(store.get(&key("/42")).await, None);
        assert!(!store.set(&key("/42"), &sample_entry(), Duration::from_secs(60)).await);
        assert_eq!(store.delete_by_pattern("gateway_cache:*").await, 0);
        assert!(!store.ping().await);
    }

    #[tokio::test]
    async fn test_stalled_backend_times_out() {
        let store = CacheStore::new(Arc::new(StalledBackend), Duration::from_millis(50));
        let started = std::time::Instant::now();
        assert_eq!(store.get(&key("/42")).await, None);
        assert!(!store.set(&key("/42"), &sample_entry(), Duration::from_secs(60)).await);
        assert_eq!(store.delete_by_pattern("gateway_cache:*").await, 0);
        assert!(!store.ping().await);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_corrupted_payload_is_a_miss() {
        let backend = Arc::new(MemoryBackend::new(10));
        backend
            .set_ex(key("/42").as_str(), "not json", Duration::from_secs(60))
            .await
            .unwrap();
        let store = CacheStore::new(backend, Duration::from_millis(200));
        assert_eq!(store.get(&key("/42")).await, None);
    }
}
