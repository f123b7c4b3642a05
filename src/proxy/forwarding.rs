//! # 请求转发处理模块
//!
//! 转发引擎负责单个请求的完整生命周期：
//! 解析路由 → 查询缓存 → 调用上游 → 按需写入缓存 → 返回响应信封。
//!
//! 缓存是纯粹的优化层：缓存后端不可用时，返回给客户端的内容与有缓存时一致，
//! 只是每次都会访问上游。

use axum::http::header;
use chrono::Utc;
use reqwest::Client;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::router::{ServiceRoute, ServiceRoutes};
use super::types::{RequestEnvelope, ResponseEnvelope, strip_transport_headers};
use crate::cache::{CacheKey, CacheStore, KeyDeriver};
use crate::error::{ProxyError, Result};
use crate::{ldebug, lerror, linfo, lwarn, logging::{LogComponent, LogStage}};

/// 转发引擎
///
/// 所有字段在启动后只读，克隆后可以在并发请求之间共享。
#[derive(Clone)]
pub struct ForwardingEngine {
    routes: Arc<ServiceRoutes>,
    cache: CacheStore,
    http_client: Client,
    key_deriver: KeyDeriver,
    cache_ttl: Duration,
}

impl ForwardingEngine {
    /// 创建转发引擎
    pub fn new(
        routes: ServiceRoutes,
        cache: CacheStore,
        http_client: Client,
        key_deriver: KeyDeriver,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            routes: Arc::new(routes),
            cache,
            http_client,
            key_deriver,
            cache_ttl,
        }
    }

    /// 响应缓存存储
    #[must_use]
    pub const fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// 缓存键派生器
    #[must_use]
    pub const fn key_deriver(&self) -> &KeyDeriver {
        &self.key_deriver
    }

    /// 服务路由表
    #[must_use]
    pub fn routes(&self) -> &ServiceRoutes {
        &self.routes
    }

    /// 缓存 TTL
    #[must_use]
    pub const fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    /// 计算请求对应的缓存键
    ///
    /// 服务未配置或方法不可缓存时返回 `None`。
    #[must_use]
    pub fn cache_key_for(&self, request: &RequestEnvelope) -> Option<CacheKey> {
        let route = self.routes.resolve(&request.service)?;
        self.derive_cache_key(&route.target_url(&request.path), request)
    }

    fn derive_cache_key(&self, target_url: &str, request: &RequestEnvelope) -> Option<CacheKey> {
        if !request.is_cacheable() {
            return None;
        }
        // GET 请求体不参与转发，也不参与缓存键
        Some(
            self.key_deriver
                .derive_key(request.method.as_str(), target_url, &request.params, None),
        )
    }

    /// 转发请求
    ///
    /// # Errors
    ///
    /// - [`ProxyError::RouteNotFound`]：服务名未配置
    /// - [`ProxyError::UpstreamUnreachable`]：连接失败、超时或传输中断
    /// - [`ProxyError::Internal`]：无法构建上游请求
    ///
    /// 上游返回的任何状态码（包括 4xx/5xx）都作为正常响应返回。
    pub async fn forward(&self, request: RequestEnvelope) -> Result<ResponseEnvelope> {
        let started = Instant::now();
        let request_id = request.request_id.as_str();

        let Some(route) = self.routes.resolve(&request.service) else {
            lwarn!(
                request_id,
                LogStage::RequestStart,
                LogComponent::Forwarding,
                "route_not_found",
                "服务未配置",
                service = request.service
            );
            return Err(ProxyError::route_not_found(&request.service));
        };

        let target_url = route.target_url(&request.path);
        let cache_key = self.derive_cache_key(&target_url, &request);

        if let Some(key) = &cache_key {
            if let Some(response) = self.lookup(request_id, key).await {
                linfo!(
                    request_id,
                    LogStage::Response,
                    LogComponent::Forwarding,
                    "cache_hit",
                    "缓存命中",
                    service = request.service,
                    url = target_url,
                    status = response.status.as_u16(),
                    duration_ms = started.elapsed().as_millis()
                );
                return Ok(response);
            }
        }

        let response = self.send_upstream(route, &target_url, &request).await?;

        if let Some(key) = &cache_key {
            if !response.status.is_success() {
                ldebug!(
                    request_id,
                    LogStage::Cache,
                    LogComponent::Forwarding,
                    "skip_cache",
                    "非 2xx 响应不写入缓存",
                    status = response.status.as_u16()
                );
            } else if let Some(encoding) = response.headers.get(header::CONTENT_ENCODING) {
                // 客户端无法解码的编码不进入共享缓存
                ldebug!(
                    request_id,
                    LogStage::Cache,
                    LogComponent::Forwarding,
                    "skip_cache",
                    "响应体仍带内容编码，不写入缓存",
                    encoding = encoding.to_str().unwrap_or("<non-ascii>")
                );
            } else {
                let entry = response.to_cache_entry(Utc::now());
                self.cache.set(key, &entry, self.cache_ttl).await;
            }
        }

        linfo!(
            request_id,
            LogStage::Response,
            LogComponent::Forwarding,
            "upstream_response",
            "上游响应已返回",
            method = request.method,
            service = request.service,
            url = target_url,
            status = response.status.as_u16(),
            cache = response.cache_status(),
            duration_ms = started.elapsed().as_millis()
        );

        Ok(response)
    }

    async fn lookup(&self, request_id: &str, key: &CacheKey) -> Option<ResponseEnvelope> {
        let entry = self.cache.get(key).await?;
        let response = ResponseEnvelope::from_cache_entry(entry);
        if response.is_none() {
            lwarn!(
                request_id,
                LogStage::Cache,
                LogComponent::Forwarding,
                "invalid_cache_entry",
                "缓存条目状态码无效，按未命中处理",
                key = key
            );
        }
        response
    }

    async fn send_upstream(
        &self,
        route: &ServiceRoute,
        target_url: &str,
        request: &RequestEnvelope,
    ) -> Result<ResponseEnvelope> {
        ldebug!(
            &request.request_id,
            LogStage::UpstreamRequest,
            LogComponent::Upstream,
            "send_upstream",
            "转发请求到上游",
            method = request.method,
            url = target_url,
            params = request.params.len()
        );

        let mut builder = self
            .http_client
            .request(request.method.clone(), target_url)
            .headers(request.headers.clone());
        if !request.params.is_empty() {
            builder = builder.query(&request.params);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let upstream = builder
            .send()
            .await
            .map_err(|e| classify_upstream_error(request, route, target_url, e))?;

        let status = upstream.status();
        let mut headers = upstream.headers().clone();
        strip_transport_headers(&mut headers);

        let body = upstream
            .bytes()
            .await
            .map_err(|e| classify_upstream_error(request, route, target_url, e))?;

        Ok(ResponseEnvelope {
            status,
            headers,
            body,
            served_from_cache: false,
            cached_at: None,
        })
    }
}

/// 把 reqwest 错误归类为网关错误
///
/// 构建阶段的错误（例如目标地址无法解析）属于网关内部错误，其余都视为上游不可达。
fn classify_upstream_error(
    request: &RequestEnvelope,
    route: &ServiceRoute,
    target_url: &str,
    error: reqwest::Error,
) -> ProxyError {
    if error.is_builder() {
        lerror!(
            &request.request_id,
            LogStage::Error,
            LogComponent::Upstream,
            "build_request_failed",
            &format!("构建上游请求失败: {error}"),
            url = target_url
        );
        return ProxyError::internal_with_source(format!("构建上游请求失败: {target_url}"), error);
    }

    let reason = if error.is_timeout() {
        "请求超时"
    } else if error.is_connect() {
        "连接失败"
    } else {
        "请求失败"
    };

    lerror!(
        &request.request_id,
        LogStage::ResponseFailure,
        LogComponent::Upstream,
        "upstream_unreachable",
        &format!("上游{reason}: {error}"),
        service = route.name(),
        url = target_url
    );

    ProxyError::upstream_unreachable(route.name(), format!("{reason}: {target_url}"), error)
}
