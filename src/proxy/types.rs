//! # 代理服务类型定义
//!
//! 路由层与转发引擎之间传递的请求、响应信封

use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::cache::CacheEntry;

/// 查询参数，按键排序；重复键保留最后一个值
pub type QueryParams = BTreeMap<String, String>;

/// 由 HTTP 客户端管理、不应在代理两侧透传的头部
///
/// `accept-encoding` 由上游客户端自行协商并在返回前解压，
/// 缓存中只保存解码后的响应体，与客户端是否支持压缩无关。
pub const TRANSPORT_HEADERS: &[&str] = &[
    "host",
    "accept-encoding",
    "content-length",
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "te",
    "trailer",
    "upgrade",
];

/// 移除传输层头部
pub fn strip_transport_headers(headers: &mut HeaderMap) {
    for name in TRANSPORT_HEADERS {
        headers.remove(*name);
    }
}

/// 只有 GET 请求参与缓存
#[must_use]
pub fn is_cacheable_method(method: &Method) -> bool {
    *method == Method::GET
}

/// 进入转发引擎的请求
#[derive(Debug, Clone)]
pub struct RequestEnvelope {
    /// 请求ID，贯穿整条日志链路
    pub request_id: String,
    /// 逻辑服务名
    pub service: String,
    /// 服务内路径，以 `/` 开头
    pub path: String,
    /// HTTP 方法
    pub method: Method,
    /// 查询参数
    pub params: QueryParams,
    /// 已解析的 JSON 请求体
    pub body: Option<Value>,
    /// 待转发的请求头（已去除传输层头部）
    pub headers: HeaderMap,
}

impl RequestEnvelope {
    /// 创建请求信封，自动生成请求ID
    pub fn new(service: impl Into<String>, path: impl Into<String>, method: Method) -> Self {
        let path = path.into();
        let path = if path.starts_with('/') {
            path
        } else {
            format!("/{path}")
        };

        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            service: service.into(),
            path,
            method,
            params: QueryParams::new(),
            body: None,
            headers: HeaderMap::new(),
        }
    }

    /// 沿用路由层分配的请求ID
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    /// 设置查询参数
    #[must_use]
    pub fn with_params(mut self, params: QueryParams) -> Self {
        self.params = params;
        self
    }

    /// 设置 JSON 请求体
    #[must_use]
    pub fn with_body(mut self, body: Option<Value>) -> Self {
        self.body = body;
        self
    }

    /// 设置请求头，传输层头部会被移除
    #[must_use]
    pub fn with_headers(mut self, mut headers: HeaderMap) -> Self {
        strip_transport_headers(&mut headers);
        self.headers = headers;
        self
    }

    /// 是否参与缓存
    #[must_use]
    pub fn is_cacheable(&self) -> bool {
        is_cacheable_method(&self.method)
    }
}

/// 转发引擎返回的响应
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEnvelope {
    /// 上游状态码
    pub status: StatusCode,
    /// 上游响应头（已去除传输层头部）
    pub headers: HeaderMap,
    /// 原始响应体，原样返回给客户端
    pub body: Bytes,
    /// 是否由缓存提供
    pub served_from_cache: bool,
    /// 缓存写入时间，仅缓存命中时存在
    pub cached_at: Option<DateTime<Utc>>,
}

impl ResponseEnvelope {
    /// 缓存状态标记：`HIT` 或 `MISS`
    #[must_use]
    pub const fn cache_status(&self) -> &'static str {
        if self.served_from_cache { "HIT" } else { "MISS" }
    }

    /// 把响应体解析为 JSON
    #[must_use]
    pub fn body_json(&self) -> Option<Value> {
        serde_json::from_slice(&self.body).ok()
    }

    /// 转换为缓存条目
    ///
    /// `Set-Cookie` 属于单个客户端的会话状态，不写入共享缓存；无法用 UTF-8 表示的头部值同样跳过。
    #[must_use]
    pub fn to_cache_entry(&self, cached_at: DateTime<Utc>) -> CacheEntry {
        let headers = self
            .headers
            .iter()
            .filter(|(name, _)| name.as_str() != "set-cookie")
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();

        CacheEntry {
            status: self.status.as_u16(),
            headers,
            body: self.body.clone(),
            cached_at,
        }
    }

    /// 从缓存条目恢复响应，状态码无效时返回 `None`
    #[must_use]
    pub fn from_cache_entry(entry: CacheEntry) -> Option<Self> {
        let status = StatusCode::from_u16(entry.status).ok()?;

        let mut headers = HeaderMap::with_capacity(entry.headers.len());
        for (name, value) in &entry.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                headers.append(name, value);
            }
        }

        Some(Self {
            status,
            headers,
            body: entry.body,
            served_from_cache: true,
            cached_at: Some(entry.cached_at),
        })
    }
}
