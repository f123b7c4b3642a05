//! # HTTP 服务模块
//!
//! 路由层：把 HTTP 请求转换为请求信封交给转发引擎，并提供健康检查和缓存管理接口。

pub mod context;
pub mod gateway;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;

pub use context::{AppContext, build_http_client, connect_backend};
pub use gateway::{AppState, GatewayServer, create_router, run};
pub use middleware::{REQUEST_ID_HEADER, RequestId};
pub use response::{CACHE_STATUS_HEADER, ErrorResponse, GATEWAY_VERSION_HEADER};
