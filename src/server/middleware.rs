//! # Request ID 中间件
//!
//! 为每个请求分配 `request_id` 并注入到请求扩展中，供日志串联使用。
//! 客户端已携带 `x-request-id` 时沿用其值。

use axum::{extract::Request, middleware::Next, response::Response};
use std::fmt;
use std::ops::Deref;
use uuid::Uuid;

/// 请求ID请求头
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// 请求ID类型
#[derive(Debug, Clone)]
pub struct RequestId(String);

impl RequestId {
    /// 生成新的 UUID v4 请求ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// 从请求头恢复，空值或超长值会被忽略
    #[must_use]
    pub fn from_header(value: &str) -> Option<Self> {
        let value = value.trim();
        (!value.is_empty() && value.len() <= 128).then(|| Self(value.to_string()))
    }

    /// 请求ID字符串
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Deref for RequestId {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

/// 请求ID中间件
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(RequestId::from_header)
        .unwrap_or_default();
    request.extensions_mut().insert(request_id);
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_header() {
        assert_eq!(
            RequestId::from_header(" abc-123 ").map(|id| id.to_string()),
            Some("abc-123".to_string())
        );
        assert!(RequestId::from_header("   ").is_none());
        assert!(RequestId::from_header(&"x".repeat(200)).is_none());
    }

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(RequestId::new().as_str(), RequestId::new().as_str());
    }
}
