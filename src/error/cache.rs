use std::time::Duration;
use thiserror::Error;

/// 缓存后端操作的结果类型
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// 描述缓存及 Redis 相关的错误。
///
/// 这些错误只在缓存层内部流转，`CacheStore` 会把它们降级为未命中或写入失败。
#[derive(Debug, Error)]
pub enum CacheError {
    /// 操作超过配置的超时时间
    #[error("缓存操作超时: {0:?}")]
    Timeout(Duration),

    /// 后端拒绝或无法完成操作
    #[error("缓存操作失败: {0}")]
    Operation(String),

    /// 缓存负载无法编解码
    #[error("缓存数据序列化失败: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 删除模式无法转换为正则表达式
    #[error("缓存键模式无效: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// Redis 客户端错误
    #[error("Redis 客户端错误: {0}")]
    Redis(#[from] redis::RedisError),
}

impl CacheError {
    /// 便捷构造函数，统一字符串转换。
    pub fn operation(message: impl Into<String>) -> Self {
        Self::Operation(message.into())
    }
}
