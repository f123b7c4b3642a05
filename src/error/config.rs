use thiserror::Error;

/// 配置加载与校验错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// TOML 解析失败
    #[error("Configuration parse failed: {0}")]
    Parse(#[from] toml::de::Error),

    /// 配置文件读取失败
    #[error("Configuration load failed: {0}")]
    Load(String),

    /// 配置项取值不合法
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

impl ConfigError {
    /// 构造取值不合法错误
    pub fn invalid_value(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            message: message.into(),
        }
    }
}
