//! # 请求处理器
//!
//! 网关根路径、健康检查、缓存清理以及 `/api/{service}/{*path}` 代理入口。

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::{HeaderMap, Method, Uri},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::gateway::AppState;
use super::middleware::RequestId;
use super::response::gateway_response;
use crate::GATEWAY_VERSION;
use crate::proxy::{QueryParams, RequestEnvelope};
use crate::{linfo, lwarn, logging::{LogComponent, LogStage}};

/// 根路径信息
#[derive(Debug, Serialize, Deserialize)]
pub struct RootInfo {
    /// 运行状态说明
    pub message: String,
    /// RFC 3339 时间戳
    pub timestamp: String,
    /// 网关版本
    pub version: String,
}

/// 健康检查响应
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    /// 网关自身状态，能响应即为 `healthy`
    pub gateway: String,
    /// RFC 3339 时间戳
    pub timestamp: String,
    /// `healthy` / `unhealthy`
    pub cache: String,
    /// 缓存后端名称
    pub cache_backend: String,
}

/// 缓存清理参数
#[derive(Debug, Deserialize)]
pub struct ClearCacheQuery {
    /// glob 模式，缺省时清理本网关命名空间
    pub pattern: Option<String>,
}

/// 缓存清理结果
#[derive(Debug, Serialize, Deserialize)]
pub struct ClearCacheResult {
    /// 结果说明
    pub message: String,
    /// 实际使用的模式
    pub pattern: String,
    /// 删除的条目数
    pub deleted: u64,
}

/// 网关信息
pub async fn root_handler() -> Json<RootInfo> {
    Json(RootInfo {
        message: "API 网关运行中".to_string(),
        timestamp: Utc::now().to_rfc3339(),
        version: GATEWAY_VERSION.to_string(),
    })
}

/// 健康检查
///
/// 网关自身存活即返回 200，缓存后端的状态单独报告。
pub async fn health_check(State(state): State<AppState>) -> Json<HealthStatus> {
    let cache = state.engine.cache();
    let healthy = cache.ping().await;

    Json(HealthStatus {
        gateway: "healthy".to_string(),
        timestamp: Utc::now().to_rfc3339(),
        cache: if healthy { "healthy" } else { "unhealthy" }.to_string(),
        cache_backend: cache.backend_name().to_string(),
    })
}

/// 按模式清理缓存，未指定模式时清理本网关命名空间下的全部条目
pub async fn clear_cache(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Query(query): Query<ClearCacheQuery>,
) -> Json<ClearCacheResult> {
    let pattern = query
        .pattern
        .filter(|pattern| !pattern.trim().is_empty())
        .unwrap_or_else(|| state.engine.key_deriver().all_entries_pattern());

    let deleted = state.engine.cache().delete_by_pattern(&pattern).await;

    linfo!(
        request_id.as_str(),
        LogStage::Cache,
        LogComponent::Management,
        "clear_cache",
        "缓存清理完成",
        pattern = pattern,
        deleted = deleted
    );

    Json(ClearCacheResult {
        message: format!("已删除 {deleted} 个缓存条目"),
        pattern,
        deleted,
    })
}

/// 代理入口
///
/// 路径段以原始（未解码）形式转发给上游。
pub async fn proxy_request(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path((service, _)): Path<(String, String)>,
    Query(params): Query<QueryParams>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = upstream_path(uri.path());
    let body = parse_json_body(request_id.as_str(), &method, &body);

    linfo!(
        request_id.as_str(),
        LogStage::RequestStart,
        LogComponent::Router,
        "proxy_request",
        "收到代理请求",
        method = method,
        service = service,
        path = path
    );

    let request = RequestEnvelope::new(service, path, method)
        .with_request_id(request_id.as_str())
        .with_params(params)
        .with_body(body)
        .with_headers(headers);

    match state.engine.forward(request).await {
        Ok(envelope) => gateway_response(envelope),
        Err(e) => {
            lwarn!(
                request_id.as_str(),
                LogStage::ResponseFailure,
                LogComponent::Router,
                "proxy_request_failed",
                &format!("代理请求失败: {e}"),
                category = format!("{:?}", e.category())
            );
            e.into_response()
        }
    }
}

/// 取出原始（未解码）的服务内路径
///
/// `/api/users/a/b` => `/a/b`
#[must_use]
pub fn upstream_path(raw_path: &str) -> String {
    raw_path
        .strip_prefix("/api/")
        .and_then(|rest| rest.split_once('/'))
        .map_or_else(|| "/".to_string(), |(_, path)| format!("/{path}"))
}

/// 只有 POST/PUT/PATCH 读取请求体；无法解析为 JSON 的请求体按无请求体处理
fn parse_json_body(request_id: &str, method: &Method, body: &Bytes) -> Option<Value> {
    if !matches!(*method, Method::POST | Method::PUT | Method::PATCH) || body.is_empty() {
        return None;
    }

    match serde_json::from_slice(body) {
        Ok(value) => Some(value),
        Err(e) => {
            lwarn!(
                request_id,
                LogStage::RequestStart,
                LogComponent::Router,
                "invalid_json_body",
                &format!("请求体不是有效的 JSON，按无请求体转发: {e}"),
                method = method,
                bytes = body.len()
            );
            None
        }
    }
}
