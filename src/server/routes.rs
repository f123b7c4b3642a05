//! # 路由配置

use axum::Router;
use axum::routing::{delete, get};

use super::gateway::AppState;
use super::handlers;

/// 创建所有路由
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root_handler))
        .route("/health", get(handlers::health_check))
        .route("/cache", delete(handlers::clear_cache))
        .route(
            "/api/{service}/{*path}",
            get(handlers::proxy_request)
                .post(handlers::proxy_request)
                .put(handlers::proxy_request)
                .delete(handlers::proxy_request)
                .patch(handlers::proxy_request),
        )
        .with_state(state)
}
