//! # 错误类型定义

use axum::http::StatusCode;
use thiserror::Error;

/// 网关主要错误类型
///
/// 只有路由解析与上游访问相关的错误会穿过转发引擎的边界，
/// 缓存层的故障在 [`crate::cache::CacheStore`] 内部被吸收。
#[derive(Debug, Error)]
pub enum ProxyError {
    /// 配置相关错误
    #[error("配置错误: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 逻辑服务名没有对应的路由
    #[error("服务 '{service}' 未找到")]
    RouteNotFound { service: String },

    /// 无法连接上游服务或请求超时
    #[error("无法连接上游服务 {service}: {message}")]
    UpstreamUnreachable {
        service: String,
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 系统内部错误
    #[error("内部错误: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 缓存后端初始化错误
    #[error("缓存错误: {message}")]
    Cache {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// IO相关错误
    #[error("IO错误: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// 服务器启动错误
    #[error("服务器启动错误: {message}")]
    ServerStart {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },
}

impl ProxyError {
    /// 将错误转换为HTTP状态码和错误代码
    #[must_use]
    pub const fn to_http_response_parts(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Config { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR"),
            Self::RouteNotFound { .. } => (StatusCode::NOT_FOUND, "ROUTE_NOT_FOUND"),
            Self::UpstreamUnreachable { .. } => (StatusCode::BAD_GATEWAY, "UPSTREAM_UNREACHABLE"),
            Self::Internal { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            Self::Cache { .. } => (StatusCode::SERVICE_UNAVAILABLE, "CACHE_UNAVAILABLE"),
            Self::Io { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
            Self::ServerStart { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "SERVER_START_ERROR"),
        }
    }

    /// 创建配置错误
    pub fn config<T: Into<String>>(message: T) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的配置错误
    pub fn config_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建路由未找到错误
    pub fn route_not_found<T: Into<String>>(service: T) -> Self {
        Self::RouteNotFound {
            service: service.into(),
        }
    }

    /// 创建带来源的上游不可达错误
    pub fn upstream_unreachable<S: Into<String>, T: Into<String>, E: Into<anyhow::Error>>(
        service: S,
        message: T,
        source: E,
    ) -> Self {
        Self::UpstreamUnreachable {
            service: service.into(),
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建内部错误
    pub fn internal<T: Into<String>>(message: T) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的内部错误
    pub fn internal_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建缓存错误
    pub fn cache<T: Into<String>>(message: T) -> Self {
        Self::Cache {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的缓存错误
    pub fn cache_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Cache {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建带来源的服务器启动错误
    pub fn server_start_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::ServerStart {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 面向客户端的错误描述
    ///
    /// 上游错误只暴露服务名，不泄露底层网络细节。
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            Self::RouteNotFound { service } => format!("服务 '{service}' 未找到"),
            Self::UpstreamUnreachable { service, .. } => format!("无法连接到 {service}"),
            _ => "内部服务器错误".to_string(),
        }
    }

    /// 错误分类，用于日志与监控
    #[must_use]
    pub const fn category(&self) -> super::ErrorCategory {
        match self {
            Self::RouteNotFound { .. } => super::ErrorCategory::Client,
            _ => super::ErrorCategory::Server,
        }
    }
}

impl From<std::io::Error> for ProxyError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<super::config::ConfigError> for ProxyError {
    fn from(err: super::config::ConfigError) -> Self {
        Self::config_with_source(err.to_string(), err)
    }
}

impl From<super::cache::CacheError> for ProxyError {
    fn from(err: super::cache::CacheError) -> Self {
        Self::cache_with_source(err.to_string(), err)
    }
}
