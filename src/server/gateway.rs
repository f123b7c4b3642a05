//! # 网关服务器
//!
//! Axum HTTP 服务器的装配、监听与优雅关闭

use axum::Router;
use axum::http::{Method, header};
use std::net::SocketAddr;
use std::ops::Deref;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::context::AppContext;
use super::middleware::request_id_middleware;
use crate::config::AppConfig;
use crate::error::{ProxyError, Result};
use crate::{lerror, linfo, logging::{LogComponent, LogStage}};

/// 应用状态
#[derive(Clone)]
pub struct AppState {
    context: Arc<AppContext>,
}

impl AppState {
    /// 包装应用上下文
    #[must_use]
    pub const fn new(context: Arc<AppContext>) -> Self {
        Self { context }
    }
}

impl Deref for AppState {
    type Target = AppContext;

    fn deref(&self) -> &Self::Target {
        &self.context
    }
}

/// 网关服务器
pub struct GatewayServer {
    config: Arc<AppConfig>,
    router: Router,
}

impl GatewayServer {
    /// 装配上下文并创建服务器
    pub async fn new(config: Arc<AppConfig>) -> Result<Self> {
        let context = AppContext::build(Arc::clone(&config)).await?;
        Ok(Self::from_context(context))
    }

    /// 使用已装配好的上下文创建服务器
    #[must_use]
    pub fn from_context(context: AppContext) -> Self {
        let config = Arc::clone(&context.config);
        let router = create_router(AppState::new(Arc::new(context)), config.server.enable_cors);
        Self { config, router }
    }

    /// 路由器
    #[must_use]
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// 监听地址
    pub fn bind_address(&self) -> Result<SocketAddr> {
        let host = &self.config.server.host;
        let ip = host.parse::<std::net::IpAddr>().map_err(|e| {
            ProxyError::config_with_source(format!("无效的监听地址 '{host}'"), e)
        })?;
        Ok(SocketAddr::new(ip, self.config.server.port))
    }

    /// 启动服务器，收到 Ctrl+C 后停止接收新连接并等待在途请求完成
    pub async fn serve(self) -> Result<()> {
        let addr = self.bind_address()?;
        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            ProxyError::server_start_with_source(format!("无法监听 {addr}"), e)
        })?;

        linfo!(
            "system",
            LogStage::Startup,
            LogComponent::ServerSetup,
            "server_start",
            &format!("网关监听于 {addr}")
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ProxyError::server_start_with_source("网关服务器异常退出", e))
    }
}

/// 创建带中间件的路由器
pub fn create_router(state: AppState, enable_cors: bool) -> Router {
    let app = super::routes::create_routes(state)
        .layer(axum::middleware::from_fn(request_id_middleware));

    let service_builder = ServiceBuilder::new().layer(TraceLayer::new_for_http());
    if enable_cors {
        let cors_layer = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::PATCH,
                Method::OPTIONS,
            ])
            .allow_headers([
                header::CONTENT_TYPE,
                header::AUTHORIZATION,
                header::ACCEPT,
                header::ORIGIN,
            ]);
        app.layer(service_builder.layer(cors_layer))
    } else {
        app.layer(service_builder)
    }
}

/// 等待 Ctrl+C 信号
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            linfo!(
                "system",
                LogStage::Shutdown,
                LogComponent::ServerSetup,
                "shutdown_signal",
                "收到 Ctrl+C，开始优雅关闭"
            );
        }
        Err(e) => {
            lerror!(
                "system",
                LogStage::Shutdown,
                LogComponent::ServerSetup,
                "ctrl_c_error",
                &format!("无法监听 Ctrl+C: {e:?}")
            );
            // 信号不可用时保持运行，由进程管理器终止
            std::future::pending::<()>().await;
        }
    }
}

/// 按配置启动网关，直到收到关闭信号
pub async fn run(config: AppConfig) -> Result<()> {
    let server = GatewayServer::new(Arc::new(config)).await?;
    server.serve().await
}
