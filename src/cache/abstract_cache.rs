//! # 缓存抽象层
//!
//! 提供统一的缓存后端接口，支持 Redis 缓存和内存缓存。
//! 后端只负责存取不透明的字符串负载，序列化和故障降级由 [`super::CacheStore`] 处理。

use async_trait::async_trait;
use dashmap::DashMap;
use regex::Regex;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::error::{CacheError, CacheResult};

/// 缓存后端 trait
///
/// 实现必须支持并发调用，网关不会在请求级别加锁。
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// 后端名称，用于日志和健康检查
    fn name(&self) -> &'static str;

    /// 获取未过期的值
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// 写入值并设置过期时间
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()>;

    /// 删除匹配 glob 模式的所有键，返回删除数量
    async fn delete_pattern(&self, pattern: &str) -> CacheResult<u64>;

    /// 连通性检测
    async fn ping(&self) -> CacheResult<()>;
}

/// 缓存项
#[derive(Debug, Clone)]
struct MemoryEntry {
    value: String,
    expires_at: Instant,
}

impl MemoryEntry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// 内存缓存实现
///
/// 适用于单实例部署和测试。过期在读取时惰性清理；
/// 条目数达到上限时只清理过期项，仍然没有空间则拒绝写入。
/// 写入互相串行，条目数在并发写入下也不会超过上限。
pub struct MemoryBackend {
    data: DashMap<String, MemoryEntry>,
    max_entries: usize,
    /// 容量检查与插入必须在同一临界区内完成
    write_gate: Mutex<()>,
}

impl MemoryBackend {
    /// 创建内存缓存
    #[must_use]
    pub fn new(max_entries: usize) -> Self {
        Self {
            data: DashMap::new(),
            max_entries: max_entries.max(1),
            write_gate: Mutex::new(()),
        }
    }

    /// 当前条目数（包含尚未清理的过期项）
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// 是否为空
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// 为新键腾出空间，只清理已过期的条目
    fn has_room_for(&self, incoming_key: &str) -> bool {
        if self.data.contains_key(incoming_key) || self.data.len() < self.max_entries {
            return true;
        }
        self.data.retain(|_, entry| !entry.is_expired());
        self.data.len() < self.max_entries
    }

    fn insert_bounded(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let _gate = self
            .write_gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !self.has_room_for(key) {
            return Err(CacheError::operation(format!(
                "内存缓存已满: {} 条",
                self.max_entries
            )));
        }
        self.data.insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new(10000)
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let value = self.data.get(key).map(|entry| {
            if entry.is_expired() {
                None
            } else {
                Some(entry.value.clone())
            }
        });

        match value {
            Some(Some(value)) => Ok(Some(value)),
            Some(None) => {
                self.data.remove_if(key, |_, entry| entry.is_expired());
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        self.insert_bounded(key, value, ttl)
    }

    async fn delete_pattern(&self, pattern: &str) -> CacheResult<u64> {
        let matcher = glob_to_regex(pattern)?;
        let matching: Vec<String> = self
            .data
            .iter()
            .filter(|entry| matcher.is_match(entry.key()))
            .map(|entry| entry.key().clone())
            .collect();

        let mut deleted = 0u64;
        for key in matching {
            if let Some((_, entry)) = self.data.remove(&key) {
                // 已过期的条目对调用方不可见，不计入删除数量
                if !entry.is_expired() {
                    deleted += 1;
                }
            }
        }
        Ok(deleted)
    }

    async fn ping(&self) -> CacheResult<()> {
        Ok(())
    }
}

/// 把 Redis 风格的 glob 模式转换为锚定的正则表达式
///
/// 支持 `*`、`?`、`[abc]`、`[^a]`、`[a-z]` 以及反斜杠转义。
pub fn glob_to_regex(pattern: &str) -> CacheResult<Regex> {
    let mut out = String::with_capacity(pattern.len() * 2 + 8);
    out.push_str("(?s)^");

    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '\\' => match chars.next() {
                Some(escaped) => out.push_str(&regex::escape(escaped.encode_utf8(&mut [0; 4]))),
                None => out.push_str(r"\\"),
            },
            // 没有闭合的 `[` 按字面量处理，与 Redis 一致
            '[' if !chars.clone().any(|next| next == ']') => out.push_str(r"\["),
            '[' => {
                out.push('[');
                if chars.peek() == Some(&'^') {
                    chars.next();
                    out.push('^');
                }
                for inner in chars.by_ref() {
                    match inner {
                        ']' => break,
                        '[' | '&' | '~' | '^' => {
                            out.push('\\');
                            out.push(inner);
                        }
                        _ => out.push(inner),
                    }
                }
                out.push(']');
            }
            other => out.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }

    out.push('$');
    Ok(Regex::new(&out)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_star_and_question() {
        let re = glob_to_regex("gateway_cache:*").unwrap();
        assert!(re.is_match("gateway_cache:abc"));
        assert!(re.is_match("gateway_cache:"));
        assert!(!re.is_match("other:abc"));
        assert!(!re.is_match("xgateway_cache:abc"));

        let re = glob_to_regex("h?llo").unwrap();
        assert!(re.is_match("hello"));
        assert!(re.is_match("hallo"));
        assert!(!re.is_match("hllo"));
    }

    #[test]
    fn test_glob_character_classes() {
        let re = glob_to_regex("h[ae]llo").unwrap();
        assert!(re.is_match("hello"));
        assert!(re.is_match("hallo"));
        assert!(!re.is_match("hillo"));

        let re = glob_to_regex("h[^e]llo").unwrap();
        assert!(re.is_match("hallo"));
        assert!(!re.is_match("hello"));

        let re = glob_to_regex("h[a-b]llo").unwrap();
        assert!(re.is_match("hbllo"));
        assert!(!re.is_match("hcllo"));
    }

    #[test]
    fn test_glob_literals_are_escaped() {
        let re = glob_to_regex("a.b").unwrap();
        assert!(re.is_match("a.b"));
        assert!(!re.is_match("axb"));

        let re = glob_to_regex(r"a\*b").unwrap();
        assert!(re.is_match("a*b"));
        assert!(!re.is_match("aXb"));

        let re = glob_to_regex("abc[").unwrap();
        assert!(re.is_match("abc["));
        assert!(!re.is_match("abc"));

        let re = glob_to_regex("key[^x*").unwrap();
        assert!(re.is_match("key[^x-anything"));
        assert!(!re.is_match("keyx"));
    }

    #[tokio::test]
    async fn test_memory_delete_pattern_with_unclosed_bracket() {
        let backend = MemoryBackend::new(10);
        let ttl = Duration::from_secs(60);
        backend.set_ex("gateway_cache:[", "1", ttl).await.unwrap();
        backend.set_ex("gateway_cache:a", "2", ttl).await.unwrap();

        assert_eq!(backend.delete_pattern("gateway_cache:[").await.unwrap(), 1);
        assert_eq!(backend.get("gateway_cache:a").await.unwrap().as_deref(), Some("2"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_memory_capacity_holds_under_concurrent_writes() {
        let backend = std::sync::Arc::new(MemoryBackend::new(8));
        let handles: Vec<_> = (0..64)
            .map(|i| {
                let backend = backend.clone();
                tokio::spawn(async move {
                    backend
                        .set_ex(&format!("k{i}"), "v", Duration::from_secs(60))
                        .await
                        .is_ok()
                })
            })
            .collect();

        let mut accepted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 8);
        assert_eq!(backend.len(), 8);
    }

    #[tokio::test]
    async fn test_memory_round_trip_and_expiry() {
        let backend = MemoryBackend::new(10);
        backend
            .set_ex("k", "v", Duration::from_millis(50))
            .await
            .unwrap();
        assert_eq!(backend.get("k").await.unwrap().as_deref(), Some("v"));

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(backend.get("k").await.unwrap(), None);
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn test_memory_delete_pattern_counts_live_entries() {
        let backend = MemoryBackend::new(10);
        let ttl = Duration::from_secs(60);
        backend.set_ex("gateway_cache:a", "1", ttl).await.unwrap();
        backend.set_ex("gateway_cache:b", "2", ttl).await.unwrap();
        backend.set_ex("other:c", "3", ttl).await.unwrap();
        backend
            .set_ex("gateway_cache:stale", "4", Duration::from_millis(1))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let deleted = backend.delete_pattern("gateway_cache:*").await.unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(backend.get("gateway_cache:a").await.unwrap(), None);
        assert_eq!(backend.get("other:c").await.unwrap().as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn test_memory_full_rejects_writes_until_entries_expire() {
        let backend = MemoryBackend::new(2);
        backend
            .set_ex("short", "1", Duration::from_millis(30))
            .await
            .unwrap();
        backend
            .set_ex("long", "2", Duration::from_secs(100))
            .await
            .unwrap();

        assert!(
            backend
                .set_ex("new", "3", Duration::from_secs(50))
                .await
                .is_err()
        );
        assert_eq!(backend.get("long").await.unwrap().as_deref(), Some("2"));

        tokio::time::sleep(Duration::from_millis(60)).await;
        backend
            .set_ex("new", "3", Duration::from_secs(50))
            .await
            .unwrap();
        assert_eq!(backend.len(), 2);
        assert_eq!(backend.get("new").await.unwrap().as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn test_memory_overwrite_when_full() {
        let backend = MemoryBackend::new(1);
        let ttl = Duration::from_secs(10);
        backend.set_ex("k", "1", ttl).await.unwrap();
        backend.set_ex("k", "2", ttl).await.unwrap();
        assert_eq!(backend.get("k").await.unwrap().as_deref(), Some("2"));
    }
}
