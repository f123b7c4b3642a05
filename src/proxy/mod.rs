//! # 代理模块
//!
//! 服务路由表、请求/响应信封以及带缓存的转发引擎

pub mod forwarding;
pub mod router;
pub mod types;

pub use forwarding::ForwardingEngine;
pub use router::{ServiceRoute, ServiceRoutes};
pub use types::{
    QueryParams, RequestEnvelope, ResponseEnvelope, TRANSPORT_HEADERS, is_cacheable_method,
    strip_transport_headers,
};
