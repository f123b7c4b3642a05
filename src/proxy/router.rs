//! # 服务路由表
//!
//! 把逻辑服务名映射到上游基础地址，并拼接出上游目标 URL。

use std::collections::{BTreeMap, HashMap};
use url::Url;

use crate::error::ConfigError;

/// 单个服务的路由
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRoute {
    name: String,
    base_url: String,
}

impl ServiceRoute {
    /// 创建服务路由，校验基础地址是带主机名的 http/https URL
    pub fn new(name: impl Into<String>, base_url: &str) -> Result<Self, ConfigError> {
        let name = name.into();
        let trimmed = base_url.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::invalid_value(
                format!("services.{name}"),
                "上游地址不能为空",
            ));
        }

        let url = Url::parse(trimmed)
            .map_err(|e| ConfigError::invalid_value(format!("services.{name}"), e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") || url.host().is_none() {
            return Err(ConfigError::invalid_value(
                format!("services.{name}"),
                format!("必须是带主机名的 http/https 地址: {trimmed}"),
            ));
        }

        Ok(Self {
            name,
            base_url: trimmed.trim_end_matches('/').to_string(),
        })
    }

    /// 服务名
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 上游基础地址（不含结尾斜杠）
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// 拼接上游目标地址
    ///
    /// 直接字符串拼接，不做 URL 规范化：`http://upstream-a` + `/42` => `http://upstream-a/42`。
    #[must_use]
    pub fn target_url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }
}

/// 服务路由表，启动后只读
#[derive(Debug, Clone, Default)]
pub struct ServiceRoutes {
    routes: HashMap<String, ServiceRoute>,
}

impl ServiceRoutes {
    /// 从配置中的服务映射构建路由表
    pub fn from_config(services: &BTreeMap<String, String>) -> Result<Self, ConfigError> {
        let routes = services
            .iter()
            .map(|(name, base_url)| {
                ServiceRoute::new(name.clone(), base_url).map(|route| (name.clone(), route))
            })
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(Self { routes })
    }

    /// 按服务名查找路由，区分大小写
    #[must_use]
    pub fn resolve(&self, service: &str) -> Option<&ServiceRoute> {
        self.routes.get(service)
    }

    /// 已配置的服务名，按字典序
    #[must_use]
    pub fn service_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.routes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// 服务数量
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// 是否没有任何服务
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn routes() -> ServiceRoutes {
        let services = BTreeMap::from([
            ("users".to_string(), "http://upstream-a".to_string()),
            ("products".to_string(), "http://upstream-b:3002/".to_string()),
        ]);
        ServiceRoutes::from_config(&services).unwrap()
    }

    #[test]
    fn test_resolve_known_service() {
        let routes = routes();
        let route = routes.resolve("users").unwrap();
        assert_eq!(route.name(), "users");
        assert_eq!(route.target_url("/42"), "http://upstream-a/42");
        assert_eq!(routes.service_names(), vec!["products", "users"]);
    }

    #[test]
    fn test_unknown_and_case_sensitive() {
        let routes = routes();
        assert!(routes.resolve("orders").is_none());
        assert!(routes.resolve("Users").is_none());
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let routes = routes();
        let route = routes.resolve("products").unwrap();
        assert_eq!(route.base_url(), "http://upstream-b:3002");
        assert_eq!(route.target_url("/items/7"), "http://upstream-b:3002/items/7");
        assert_eq!(route.target_url("items/7"), "http://upstream-b:3002/items/7");
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        assert!(ServiceRoute::new("bad", "").is_err());
        assert!(ServiceRoute::new("bad", "ftp://files").is_err());
        assert!(ServiceRoute::new("bad", "localhost:3001").is_err());
    }
}
