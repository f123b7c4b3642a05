//! # 日志配置模块
//!
//! 提供统一的结构化日志宏和日志系统初始化。
//!
//! 每条日志都带有 `request_id`、处理阶段、组件以及操作标识，便于按请求串联
//! 网关内部的缓存与上游调用过程。

use std::env;
use std::fmt;
use tracing_subscriber::{EnvFilter, fmt as tracing_fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// 请求处理阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStage {
    /// 服务启动
    Startup,
    /// 服务关闭
    Shutdown,
    /// 配置加载
    Configuration,
    /// 缓存读写
    Cache,
    /// 请求进入网关
    RequestStart,
    /// 上游请求
    UpstreamRequest,
    /// 响应返回
    Response,
    /// 响应失败
    ResponseFailure,
    /// 错误处理
    Error,
    /// 健康检查
    HealthCheck,
}

impl LogStage {
    /// 阶段的日志标识
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::Shutdown => "shutdown",
            Self::Configuration => "configuration",
            Self::Cache => "cache",
            Self::RequestStart => "request_start",
            Self::UpstreamRequest => "upstream_request",
            Self::Response => "response",
            Self::ResponseFailure => "response_failure",
            Self::Error => "error",
            Self::HealthCheck => "health_check",
        }
    }
}

impl fmt::Display for LogStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 产生日志的组件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogComponent {
    /// 主程序
    Main,
    /// 配置管理
    Config,
    /// 缓存存储
    Cache,
    /// Redis 后端
    Redis,
    /// 缓存键派生
    KeyDeriver,
    /// 路由层
    Router,
    /// 转发引擎
    Forwarding,
    /// 上游 HTTP 客户端
    Upstream,
    /// 管理接口
    Management,
    /// 服务器构建
    ServerSetup,
}

impl LogComponent {
    /// 组件的日志标识
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Config => "config",
            Self::Cache => "cache",
            Self::Redis => "redis",
            Self::KeyDeriver => "key_deriver",
            Self::Router => "router",
            Self::Forwarding => "forwarding",
            Self::Upstream => "upstream",
            Self::Management => "management",
            Self::ServerSetup => "server_setup",
        }
    }
}

impl fmt::Display for LogComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 结构化日志的公共实现，不直接使用
#[doc(hidden)]
#[macro_export]
macro_rules! __gateway_log {
    ($level:ident, $request_id:expr, $stage:expr, $component:expr, $operation:expr, $description:expr $(, $key:ident = $value:expr)* $(,)?) => {
        ::tracing::$level!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            $($key = %$value,)*
            "{}",
            $description
        )
    };
}

/// 输出 info 级别的结构化日志
#[macro_export]
macro_rules! linfo {
    ($($args:tt)*) => {
        $crate::__gateway_log!(info, $($args)*)
    };
}

/// 输出 debug 级别的结构化日志
#[macro_export]
macro_rules! ldebug {
    ($($args:tt)*) => {
        $crate::__gateway_log!(debug, $($args)*)
    };
}

/// 输出 warn 级别的结构化日志
#[macro_export]
macro_rules! lwarn {
    ($($args:tt)*) => {
        $crate::__gateway_log!(warn, $($args)*)
    };
}

/// 输出 error 级别的结构化日志
#[macro_export]
macro_rules! lerror {
    ($($args:tt)*) => {
        $crate::__gateway_log!(error, $($args)*)
    };
}

/// 构建默认的日志过滤规则
#[must_use]
pub fn default_filter(level: &str) -> String {
    format!("{level},cache_gateway=debug,tower_http=info,hyper=warn,reqwest=warn")
}

/// 初始化日志系统
///
/// `RUST_LOG` 优先于命令行传入的级别。重复初始化（例如测试中）会被忽略。
pub fn init_logging(log_level: Option<&str>) {
    let level = log_level.unwrap_or("info");
    let log_filter = env::var("RUST_LOG").unwrap_or_else(|_| default_filter(level));

    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_new(&log_filter).unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(false)
                .with_thread_names(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .try_init();
}

/// 环境变量设置指南
pub fn print_logging_help() {
    println!("📋 日志配置指南:");
    println!("  RUST_LOG=info                          # 标准日志级别");
    println!("  RUST_LOG=debug                         # 调试级别");
    println!("  RUST_LOG=info,cache_gateway=trace      # 网关详细追踪");
    println!("  RUST_LOG=info,tower_http=debug         # 输出每个 HTTP 请求的处理过程");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_and_component_labels() {
        assert_eq!(LogStage::UpstreamRequest.to_string(), "upstream_request");
        assert_eq!(LogComponent::KeyDeriver.to_string(), "key_deriver");
    }

    #[test]
    fn test_default_filter_keeps_level() {
        let filter = default_filter("warn");
        assert!(filter.starts_with("warn,"));
        assert!(filter.contains("cache_gateway=debug"));
    }

    #[test]
    fn test_macros_expand_with_fields() {
        init_logging(Some("debug"));
        linfo!("system", LogStage::Startup, LogComponent::Main, "unit_test", "宏展开测试");
        ldebug!(
            "req-1",
            LogStage::Cache,
            LogComponent::Cache,
            "unit_test_fields",
            &format!("带字段: {}", 1),
            status = 200,
            url = "http://upstream-a/42"
        );
    }
}
