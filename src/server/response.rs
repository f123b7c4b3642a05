//! # API 响应结构
//!
//! 错误响应的 JSON 格式，以及把转发结果转换为 HTTP 响应。

use axum::{
    Json,
    body::Body,
    http::{HeaderName, HeaderValue},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::GATEWAY_VERSION;
use crate::error::ProxyError;
use crate::proxy::ResponseEnvelope;

/// 缓存状态响应头，取值 `HIT` / `MISS`
pub const CACHE_STATUS_HEADER: &str = "x-cache-status";
/// 网关版本响应头
pub const GATEWAY_VERSION_HEADER: &str = "x-gateway-version";

/// # 标准错误信息
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// 机器可读的错误码
    pub code: String,
    /// 面向客户端的错误描述
    pub message: String,
}

/// # 标准错误响应
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// 恒为 `false`
    pub success: bool,
    /// 错误信息
    pub error: ErrorInfo,
    /// 错误发生时间
    pub timestamp: DateTime<Utc>,
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let (status, code) = self.to_http_response_parts();
        let error_response = ErrorResponse {
            success: false,
            error: ErrorInfo {
                code: code.to_string(),
                message: self.client_message(),
            },
            timestamp: Utc::now(),
        };
        (status, Json(error_response)).into_response()
    }
}

/// 把转发结果转换为客户端响应
///
/// 状态码、响应头和响应体原样透传，并附加缓存状态与网关版本两个头部。
pub fn gateway_response(envelope: ResponseEnvelope) -> Response {
    let cache_status = envelope.cache_status();

    let mut response = Response::new(Body::from(envelope.body));
    *response.status_mut() = envelope.status;
    *response.headers_mut() = envelope.headers;

    let headers = response.headers_mut();
    headers.insert(
        HeaderName::from_static(CACHE_STATUS_HEADER),
        HeaderValue::from_static(cache_status),
    );
    headers.insert(
        HeaderName::from_static(GATEWAY_VERSION_HEADER),
        HeaderValue::from_static(GATEWAY_VERSION),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, StatusCode, header};
    use bytes::Bytes;

    #[test]
    fn test_error_response_shape() {
        let response = ProxyError::route_not_found("orders").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }

    #[test]
    fn test_gateway_response_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        let response = gateway_response(ResponseEnvelope {
            status: StatusCode::CREATED,
            headers,
            body: Bytes::from_static(b"ok"),
            served_from_cache: true,
            cached_at: Some(Utc::now()),
        });

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()[CACHE_STATUS_HEADER], "HIT");
        assert_eq!(response.headers()[GATEWAY_VERSION_HEADER], GATEWAY_VERSION);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
    }
}
