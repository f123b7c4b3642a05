//! # 配置管理器
//!
//! 统一的配置加载入口：配置文件、`.env` 文件以及环境变量覆盖。
//!
//! 覆盖优先级（从低到高）：默认值 → 配置文件 → 传统环境变量 → `GATEWAY_` 前缀环境变量。

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::AppConfig;
use crate::error::{ConfigError, ProxyError, Result};
use crate::{ldebug, linfo, logging::{LogComponent, LogStage}, lwarn};

/// 环境变量覆盖前缀
pub const ENV_PREFIX: &str = "GATEWAY_";

/// 指定配置文件路径的环境变量
pub const CONFIG_PATH_ENV: &str = "GATEWAY_CONFIG_PATH";

/// 网关早期版本直接读取的环境变量
const LEGACY_ENV_KEYS: [&str; 6] = [
    "REDIS_HOST",
    "REDIS_PORT",
    "CACHE_TTL",
    "API_PORT",
    "USER_SERVICE_URL",
    "PRODUCT_SERVICE_URL",
];

/// 配置管理器
///
/// 网关启动后配置不可变，路由表只在启动时加载一次。
#[derive(Debug, Clone)]
pub struct ConfigManager {
    /// 当前配置
    config: Arc<AppConfig>,
    /// 配置来源文件
    source: Option<PathBuf>,
}

impl ConfigManager {
    /// 从进程环境创建配置管理器
    ///
    /// `path` 为空时尝试 `GATEWAY_CONFIG_PATH`，两者都没有时使用默认配置。
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if dotenvy::dotenv().is_ok() {
            ldebug!("system", LogStage::Configuration, LogComponent::Config, "dotenv_loaded", "已加载 .env 文件");
        }

        let source = path
            .map(Path::to_path_buf)
            .or_else(|| env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from));

        let legacy: HashMap<String, String> = LEGACY_ENV_KEYS
            .iter()
            .filter_map(|key| env::var(key).ok().map(|value| ((*key).to_string(), value)))
            .collect();

        Self::build(source, &legacy, &Self::build_env_overrides())
    }

    /// 根据显式给定的环境变量快照构建配置
    pub fn build(
        source: Option<PathBuf>,
        legacy_env: &HashMap<String, String>,
        overrides: &HashMap<String, String>,
    ) -> Result<Self> {
        let mut config = match &source {
            Some(path) => Self::load_config_file(path)?,
            None => AppConfig::default(),
        };

        Self::apply_legacy_env(&mut config, legacy_env)?;
        Self::apply_env_overrides(&mut config, overrides)?;
        config.validate()?;

        linfo!(
            "system",
            LogStage::Configuration,
            LogComponent::Config,
            "config_loaded",
            "配置加载完成",
            source = source
                .as_ref()
                .map_or_else(|| "defaults".to_string(), |p| p.display().to_string()),
            services = config.services.len(),
            overrides = overrides.len()
        );

        Ok(Self {
            config: Arc::new(config),
            source,
        })
    }

    /// 获取当前配置
    #[must_use]
    pub fn config(&self) -> Arc<AppConfig> {
        Arc::clone(&self.config)
    }

    /// 配置来源文件
    #[must_use]
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// 加载配置文件
    fn load_config_file(path: &Path) -> Result<AppConfig> {
        if !path.exists() {
            return Err(ConfigError::Load(format!("配置文件不存在: {}", path.display())).into());
        }

        let config_content = std::fs::read_to_string(path).map_err(|e| {
            ProxyError::config_with_source(format!("读取配置文件失败: {}", path.display()), e)
        })?;

        toml::from_str(&config_content).map_err(|e| {
            ProxyError::config_with_source(
                format!("TOML解析失败 - 配置文件: {}, 详细错误: {e}", path.display()),
                e,
            )
        })
    }

    /// 构建环境变量覆盖映射
    fn build_env_overrides() -> HashMap<String, String> {
        let overrides: HashMap<String, String> = env::vars()
            .filter(|(key, _)| key != CONFIG_PATH_ENV)
            .filter_map(|(key, value)| {
                key.strip_prefix(ENV_PREFIX)
                    // 例如: GATEWAY_SERVER_PORT -> server.port
                    .map(|config_key| (config_key.to_lowercase().replace('_', "."), value))
            })
            .collect();

        ldebug!(
            "system",
            LogStage::Configuration,
            LogComponent::Config,
            "env_overrides_found",
            &format!("发现 {} 个环境变量覆盖", overrides.len())
        );
        overrides
    }

    /// 应用传统环境变量
    fn apply_legacy_env(config: &mut AppConfig, legacy: &HashMap<String, String>) -> Result<()> {
        for (key, value) in legacy {
            match key.as_str() {
                "REDIS_HOST" => config.cache.redis.host.clone_from(value),
                "REDIS_PORT" => config.cache.redis.port = parse_value(key, value)?,
                "CACHE_TTL" => config.cache.default_ttl = parse_value(key, value)?,
                "API_PORT" => config.server.port = parse_value(key, value)?,
                "USER_SERVICE_URL" => {
                    config.services.insert("users".to_string(), value.clone());
                }
                "PRODUCT_SERVICE_URL" => {
                    config.services.insert("products".to_string(), value.clone());
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// 应用环境变量覆盖
    fn apply_env_overrides(
        config: &mut AppConfig,
        overrides: &HashMap<String, String>,
    ) -> Result<()> {
        for (path, value) in overrides {
            ldebug!(
                "system",
                LogStage::Configuration,
                LogComponent::Config,
                "apply_env_override",
                &format!(
                    "应用环境变量覆盖: {} = {}",
                    path,
                    if path.contains("password") { "***" } else { value }
                )
            );

            Self::apply_override_to_config(config, path, value)?;
        }
        Ok(())
    }

    /// 将环境变量覆盖应用到配置对象
    fn apply_override_to_config(config: &mut AppConfig, path: &str, value: &str) -> Result<()> {
        let parts: Vec<&str> = path.split('.').collect();

        match parts.as_slice() {
            ["server", "host"] => config.server.host = value.to_string(),
            ["server", "port"] => config.server.port = parse_value(path, value)?,
            ["server", "enable", "cors"] => config.server.enable_cors = parse_value(path, value)?,
            ["cache", "backend"] => {
                config.cache.backend = match value.to_lowercase().as_str() {
                    "redis" => super::CacheType::Redis,
                    "memory" => super::CacheType::Memory,
                    other => {
                        return Err(ConfigError::invalid_value(path, format!("未知的缓存类型: {other}")).into());
                    }
                };
            }
            ["cache", "default", "ttl"] => config.cache.default_ttl = parse_value(path, value)?,
            ["cache", "key", "prefix"] => config.cache.key_prefix = value.to_string(),
            ["cache", "operation", "timeout", "ms"] => {
                config.cache.operation_timeout_ms = parse_value(path, value)?;
            }
            ["cache", "memory", "max", "entries"] => {
                config.cache.memory_max_entries = parse_value(path, value)?;
            }
            ["cache", "redis", "host"] => config.cache.redis.host = value.to_string(),
            ["cache", "redis", "port"] => config.cache.redis.port = parse_value(path, value)?,
            ["cache", "redis", "database"] => config.cache.redis.database = parse_value(path, value)?,
            ["cache", "redis", "password"] => config.cache.redis.password = Some(value.to_string()),
            ["cache", "redis", "connection", "timeout"] => {
                config.cache.redis.connection_timeout = parse_value(path, value)?;
            }
            ["upstream", "timeout", "seconds"] => {
                config.upstream.timeout_seconds = parse_value(path, value)?;
            }
            ["upstream", "connect", "timeout", "seconds"] => {
                config.upstream.connect_timeout_seconds = parse_value(path, value)?;
            }
            ["services", name @ ..] if !name.is_empty() => {
                config.services.insert(name.join("_"), value.to_string());
            }
            _ => {
                lwarn!(
                    "system",
                    LogStage::Configuration,
                    LogComponent::Config,
                    "unknown_override",
                    &format!("未知的配置路径，忽略环境变量覆盖: {path}")
                );
            }
        }

        Ok(())
    }
}

fn parse_value<T>(key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::invalid_value(key, format!("{value}: {e}")).into())
}
