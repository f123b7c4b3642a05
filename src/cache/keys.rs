//! # 缓存键派生
//!
//! 把请求的形状（方法、目标地址、查询参数、请求体）规范化后做 SHA-256 摘要，
//! 得到定长且带命名空间前缀的缓存键。
//!
//! 规范化形式是一个 JSON 对象，所有对象键（包括查询参数和请求体内部的键）按字典序排列，
//! 因此查询参数在传输层的顺序不会影响缓存键。

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// 默认缓存键命名空间
pub const DEFAULT_KEY_PREFIX: &str = "gateway_cache";

/// 缓存键
///
/// 形如 `gateway_cache:<64 位十六进制摘要>`。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// 缓存键字符串
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 摘要部分（去掉命名空间前缀）
    #[must_use]
    pub fn digest(&self) -> &str {
        self.0.rsplit_once(':').map_or(self.0.as_str(), |(_, digest)| digest)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// 缓存键派生器
///
/// 纯函数式组件：不做 IO，也没有运行时失败路径。
#[derive(Debug, Clone)]
pub struct KeyDeriver {
    prefix: String,
}

impl Default for KeyDeriver {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_PREFIX)
    }
}

impl KeyDeriver {
    /// 使用指定命名空间前缀创建派生器
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// 命名空间前缀
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// 匹配本命名空间下所有缓存条目的模式，管理接口的默认清理范围
    #[must_use]
    pub fn all_entries_pattern(&self) -> String {
        format!("{}:*", self.prefix)
    }

    /// 由请求形状派生缓存键
    pub fn derive_key<I, K, V>(
        &self,
        method: &str,
        url: &str,
        params: I,
        body: Option<&Value>,
    ) -> CacheKey
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let canonical = canonical_request(method, url, params, body);
        let digest = Sha256::digest(canonical.as_bytes());
        CacheKey(format!("{}:{}", self.prefix, hex::encode(digest)))
    }
}

/// 构建请求的规范化字符串
fn canonical_request<I, K, V>(method: &str, url: &str, params: I, body: Option<&Value>) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let sorted_params: BTreeMap<String, String> = params
        .into_iter()
        .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string()))
        .collect();

    let mut params_object = Map::new();
    for (key, value) in sorted_params {
        params_object.insert(key, Value::String(value));
    }

    // 按键的字典序插入，保证输出顺序与 Map 的底层实现无关
    let mut object = Map::new();
    object.insert("body".to_string(), body.map_or(Value::Null, canonicalize));
    object.insert(
        "method".to_string(),
        Value::String(method.to_ascii_uppercase()),
    );
    object.insert("params".to_string(), Value::Object(params_object));
    object.insert("url".to_string(), Value::String(url.to_string()));

    Value::Object(object).to_string()
}

/// 递归地把 JSON 对象的键排序
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<&String, Value> =
                map.iter().map(|(k, v)| (k, canonicalize(v))).collect();
            let mut object = Map::new();
            for (key, value) in sorted {
                object.insert(key.clone(), value);
            }
            Value::Object(object)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}
