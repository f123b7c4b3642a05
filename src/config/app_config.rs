//! # 应用配置结构定义

use crate::error::ConfigError;
use crate::proxy::ServiceRoute;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// 应用主配置结构
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP 服务器配置
    pub server: ServerConfig,
    /// 缓存配置
    pub cache: CacheConfig,
    /// 上游调用配置
    pub upstream: UpstreamConfig,
    /// 逻辑服务名到上游基础地址的映射
    pub services: BTreeMap<String, String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            cache: CacheConfig::default(),
            upstream: UpstreamConfig::default(),
            services: default_services(),
        }
    }
}

fn default_services() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("users".to_string(), "http://localhost:3001".to_string()),
        ("products".to_string(), "http://localhost:3002".to_string()),
    ])
}

/// HTTP 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 监听地址
    pub host: String,
    /// 监听端口
    pub port: u16,
    /// 是否启用CORS
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            enable_cors: true,
        }
    }
}

/// 缓存类型
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheType {
    /// Redis缓存
    #[default]
    Redis,
    /// 内存缓存
    Memory,
}

/// 缓存配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// 缓存后端类型
    pub backend: CacheType,
    /// 默认过期时间（秒）
    pub default_ttl: u64,
    /// 缓存键命名空间前缀
    pub key_prefix: String,
    /// 单次缓存操作超时（毫秒）
    pub operation_timeout_ms: u64,
    /// 内存缓存最大条目数
    pub memory_max_entries: usize,
    /// Redis 缓存配置
    pub redis: RedisConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheType::Redis,
            default_ttl: 300,
            key_prefix: "gateway_cache".to_string(),
            operation_timeout_ms: 5000,
            memory_max_entries: 10000,
            redis: RedisConfig::default(),
        }
    }
}

impl CacheConfig {
    /// 默认 TTL
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl)
    }

    /// 单次缓存操作超时
    #[must_use]
    pub const fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }
}

/// Redis配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    /// 服务器地址
    pub host: String,
    /// 服务器端口
    pub port: u16,
    /// 数据库编号
    pub database: u8,
    /// 连接密码（可选）
    pub password: Option<String>,
    /// 连接超时时间（秒）
    pub connection_timeout: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            database: 0,
            password: None,
            connection_timeout: 5,
        }
    }
}

impl RedisConfig {
    /// 构建 Redis 连接 URL
    #[must_use]
    pub fn build_url(&self) -> String {
        if let Some(password) = &self.password {
            format!(
                "redis://:{}@{}:{}/{}",
                password, self.host, self.port, self.database
            )
        } else {
            format!("redis://{}:{}/{}", self.host, self.port, self.database)
        }
    }

    /// 连接超时
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout)
    }
}

/// 上游调用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// 单次上游请求的总超时（秒）
    pub timeout_seconds: u64,
    /// 建立连接的超时（秒）
    pub connect_timeout_seconds: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            connect_timeout_seconds: 10,
        }
    }
}

impl UpstreamConfig {
    /// 请求超时
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// 连接超时
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}

impl AppConfig {
    /// 验证配置的有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::invalid_value("server.port", "端口不能为0"));
        }

        if self.cache.default_ttl == 0 {
            return Err(ConfigError::invalid_value(
                "cache.default_ttl",
                "缓存 TTL 必须大于0",
            ));
        }
        if self.cache.key_prefix.trim().is_empty() {
            return Err(ConfigError::invalid_value(
                "cache.key_prefix",
                "缓存键前缀不能为空",
            ));
        }
        if self.cache.operation_timeout_ms == 0 {
            return Err(ConfigError::invalid_value(
                "cache.operation_timeout_ms",
                "缓存操作超时必须大于0",
            ));
        }
        if self.cache.backend == CacheType::Memory && self.cache.memory_max_entries == 0 {
            return Err(ConfigError::invalid_value(
                "cache.memory_max_entries",
                "内存缓存最大条目数必须大于0",
            ));
        }
        if self.cache.backend == CacheType::Redis && self.cache.redis.host.is_empty() {
            return Err(ConfigError::invalid_value("cache.redis.host", "Redis 地址不能为空"));
        }

        if self.upstream.timeout_seconds == 0 || self.upstream.connect_timeout_seconds == 0 {
            return Err(ConfigError::invalid_value(
                "upstream",
                "上游超时必须大于0",
            ));
        }

        if self.services.is_empty() {
            return Err(ConfigError::invalid_value("services", "必须配置至少一个服务"));
        }
        for (name, base_url) in &self.services {
            ServiceRoute::new(name.as_str(), base_url)?;
        }

        Ok(())
    }
}
