//! # Redis 缓存客户端
//!
//! 提供 Redis 连接管理和基础操作

use async_trait::async_trait;
use redis::{AsyncCommands, Client, aio::ConnectionManager};
use std::time::Duration;

use super::abstract_cache::CacheBackend;
use crate::config::RedisConfig;
use crate::error::{CacheError, CacheResult, ProxyError, Result};
use crate::{ldebug, linfo, logging::{LogComponent, LogStage}};

/// Redis 缓存后端
///
/// 内部持有多路复用的连接管理器，克隆代价很低，可以在并发请求之间共享。
pub struct RedisBackend {
    /// Redis 连接管理器
    connection_manager: ConnectionManager,
    /// 配置信息
    config: RedisConfig,
}

impl RedisBackend {
    /// 连接 Redis 并校验连通性
    ///
    /// 连接建立受 `connection_timeout` 约束，超时或 PING 失败都会返回错误。
    pub async fn connect(config: RedisConfig) -> Result<Self> {
        linfo!(
            "system",
            LogStage::Startup,
            LogComponent::Redis,
            "connect_to_redis",
            &format!("正在连接 Redis 服务器: {}:{}", config.host, config.port)
        );

        let client = Client::open(config.build_url())
            .map_err(|e| ProxyError::cache_with_source("创建 Redis 客户端失败", e))?;

        let connection_manager =
            tokio::time::timeout(config.connect_timeout(), ConnectionManager::new(client))
                .await
                .map_err(|_| {
                    ProxyError::cache(format!(
                        "连接 Redis 超时: {}s",
                        config.connection_timeout
                    ))
                })?
                .map_err(|e| ProxyError::cache_with_source("建立 Redis 连接失败", e))?;

        let backend = Self {
            connection_manager,
            config,
        };
        backend
            .ping()
            .await
            .map_err(|e| ProxyError::cache_with_source("Redis 连通性检测失败", e))?;

        linfo!(
            "system",
            LogStage::Startup,
            LogComponent::Redis,
            "redis_connected",
            "Redis 连接建立成功",
            database = backend.config.database
        );

        Ok(backend)
    }

    /// 连接配置
    #[must_use]
    pub const fn config(&self) -> &RedisConfig {
        &self.config
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.connection_manager.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        // 毫秒精度写入，避免亚秒级 TTL 被截断为 0
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
        let mut conn = self.connection_manager.clone();
        conn.pset_ex::<_, _, ()>(key, value, ttl_ms).await?;
        Ok(())
    }

    async fn delete_pattern(&self, pattern: &str) -> CacheResult<u64> {
        let mut conn = self.connection_manager.clone();

        let keys: Vec<String> = conn.keys(pattern).await?;
        if keys.is_empty() {
            return Ok(0);
        }

        ldebug!(
            "system",
            LogStage::Cache,
            LogComponent::Redis,
            "delete_pattern",
            &format!("按模式删除缓存: pattern={pattern}, matched={}", keys.len())
        );

        let deleted: u64 = conn.del(&keys).await?;
        Ok(deleted)
    }

    async fn ping(&self) -> CacheResult<()> {
        let mut conn = self.connection_manager.clone();
        let response: String = redis::cmd("PING").query_async(&mut conn).await?;
        if response == "PONG" {
            Ok(())
        } else {
            Err(CacheError::operation(format!("PING 返回异常响应: {response}")))
        }
    }
}
