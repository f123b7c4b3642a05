//! The unified error handling system for the gateway.

use std::fmt::Display;

// 1. Core Types
pub use cache::{CacheError, CacheResult};
pub use config::ConfigError;
pub use types::ProxyError;

/// A unified `Result` type for the entire application.
///
/// All functions that can fail should return this type.
pub type Result<T> = std::result::Result<T, ProxyError>;

// 2. Module declarations
pub mod cache;
pub mod config;
pub mod types;

// 3. Context Trait for adding context to errors.
/// 为任意错误附加上下文信息并转换为 [`ProxyError::Internal`]
pub trait Context<T, E> {
    /// Wrap the error as an internal error carrying `context` as its message.
    #[track_caller]
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display;

    /// Like [`Context::context`], computing the message lazily.
    #[track_caller]
    fn with_context<C, F>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Display;
}

impl<T, E> Context<T, E> for std::result::Result<T, E>
where
    E: Into<anyhow::Error>,
{
    #[track_caller]
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display,
    {
        self.with_context(|| context)
    }

    #[track_caller]
    fn with_context<C, F>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Display,
    {
        self.map_err(|error| ProxyError::internal_with_source(context().to_string(), error))
    }
}

// 4. Error Category for monitoring and alerting.
/// Error category used in logs and for choosing a status class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Errors caused by the client (e.g., unknown service name).
    /// Corresponds to 4xx HTTP status codes.
    Client,
    /// Errors caused by the gateway or its upstreams.
    /// Corresponds to 5xx HTTP status codes.
    Server,
}
