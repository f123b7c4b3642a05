//! # 应用上下文
//!
//! 启动阶段一次性装配缓存后端、上游 HTTP 客户端和转发引擎，之后在请求之间只读共享。

use reqwest::{Client, redirect};
use std::sync::Arc;

use crate::cache::{CacheBackend, CacheStore, KeyDeriver, MemoryBackend, RedisBackend};
use crate::config::{AppConfig, CacheType, UpstreamConfig};
use crate::error::{Context, Result};
use crate::proxy::{ForwardingEngine, ServiceRoutes};
use crate::{linfo, logging::{LogComponent, LogStage}};

/// 应用上下文，持有请求处理期间只读共享的组件
#[derive(Clone)]
pub struct AppContext {
    /// 启动时加载的配置
    pub config: Arc<AppConfig>,
    /// 转发引擎
    pub engine: ForwardingEngine,
}

impl AppContext {
    /// 使用已构建的组件创建上下文
    pub const fn new(config: Arc<AppConfig>, engine: ForwardingEngine) -> Self {
        Self { config, engine }
    }

    /// 根据配置装配全部组件
    ///
    /// Redis 后端在启动时必须可达，连接失败直接返回错误。
    pub async fn build(config: Arc<AppConfig>) -> Result<Self> {
        let backend = connect_backend(&config).await?;
        let store = CacheStore::new(backend, config.cache.operation_timeout());

        let routes = ServiceRoutes::from_config(&config.services)?;
        let http_client = build_http_client(&config.upstream)?;
        let engine = ForwardingEngine::new(
            routes,
            store,
            http_client,
            KeyDeriver::new(config.cache.key_prefix.clone()),
            config.cache.ttl(),
        );

        linfo!(
            "system",
            LogStage::Startup,
            LogComponent::ServerSetup,
            "context_ready",
            "应用上下文初始化完成",
            backend = engine.cache().backend_name(),
            services = engine.routes().service_names().join(","),
            ttl_seconds = config.cache.default_ttl
        );

        Ok(Self::new(config, engine))
    }
}

/// 按配置创建缓存后端
pub async fn connect_backend(config: &AppConfig) -> Result<Arc<dyn CacheBackend>> {
    match config.cache.backend {
        CacheType::Redis => {
            let backend = RedisBackend::connect(config.cache.redis.clone()).await?;
            Ok(Arc::new(backend))
        }
        CacheType::Memory => {
            linfo!(
                "system",
                LogStage::Startup,
                LogComponent::Cache,
                "memory_backend",
                "使用内存缓存后端",
                max_entries = config.cache.memory_max_entries
            );
            Ok(Arc::new(MemoryBackend::new(config.cache.memory_max_entries)))
        }
    }
}

/// 创建上游 HTTP 客户端
///
/// 不跟随重定向，3xx 响应原样返回给客户端。
pub fn build_http_client(config: &UpstreamConfig) -> Result<Client> {
    Client::builder()
        .timeout(config.timeout())
        .connect_timeout(config.connect_timeout())
        .redirect(redirect::Policy::none())
        .build()
        .context("创建上游 HTTP 客户端失败")
}
