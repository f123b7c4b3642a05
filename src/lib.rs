//! # Cache Gateway
//!
//! 带响应缓存的 HTTP 反向代理网关核心库。
//!
//! 请求 `/api/{service}/{path}` 按服务名路由到上游，成功的 GET 响应按请求形状缓存，
//! 缓存后端故障时网关退化为直通代理。

pub mod cache;
pub mod config;
pub mod error;
pub mod logging;
pub mod proxy;
pub mod server;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{ProxyError, Result};

/// 网关版本，写入每个代理响应的 `X-Gateway-Version` 头
pub const GATEWAY_VERSION: &str = env!("CARGO_PKG_VERSION");
