//! # 配置管理模块
//!
//! 处理应用配置加载、验证和管理

mod app_config;
mod manager;

pub use app_config::{AppConfig, CacheConfig, CacheType, RedisConfig, ServerConfig, UpstreamConfig};
pub use manager::{CONFIG_PATH_ENV, ConfigManager, ENV_PREFIX};
