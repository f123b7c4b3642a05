//! # 集成测试公共设施
//!
//! Mock 上游服务、Mock 缓存后端以及转发引擎的装配辅助。
#![allow(dead_code)]

use async_trait::async_trait;
use cache_gateway::cache::{CacheBackend, CacheStore, KeyDeriver, MemoryBackend};
use cache_gateway::error::{CacheError, CacheResult};
use cache_gateway::proxy::{ForwardingEngine, ServiceRoutes};
use mockall::mock;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// 测试用缓存操作超时
pub const TEST_CACHE_TIMEOUT: Duration = Duration::from_millis(500);
/// 测试用缓存 TTL
pub const TEST_CACHE_TTL: Duration = Duration::from_secs(60);

mock! {
    pub Backend {}

    #[async_trait]
    impl CacheBackend for Backend {
        fn name(&self) -> &'static str;
        async fn get(&self, key: &str) -> CacheResult<Option<String>>;
        async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()>;
        async fn delete_pattern(&self, pattern: &str) -> CacheResult<u64>;
        async fn ping(&self) -> CacheResult<()>;
    }
}

/// 所有操作都失败的缓存后端
pub fn failing_backend() -> MockBackend {
    let mut backend = MockBackend::new();
    backend.expect_name().return_const("failing");
    backend
        .expect_get()
        .returning(|_| Err(CacheError::operation("connection refused")));
    backend
        .expect_set_ex()
        .returning(|_, _, _| Err(CacheError::operation("connection refused")));
    backend
        .expect_delete_pattern()
        .returning(|_| Err(CacheError::operation("connection refused")));
    backend
        .expect_ping()
        .returning(|| Err(CacheError::operation("connection refused")));
    backend
}

/// 不允许任何读写的缓存后端，用于断言某条路径完全绕过缓存
pub fn untouchable_backend() -> MockBackend {
    let mut backend = MockBackend::new();
    backend.expect_name().return_const("untouchable");
    backend.expect_get().never();
    backend.expect_set_ex().never();
    backend
}

/// Mock 上游服务器
pub struct MockUpstream {
    server: MockServer,
}

impl MockUpstream {
    /// 启动 Mock 服务器
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// 获取服务器 URI
    pub fn uri(&self) -> String {
        self.server.uri()
    }

    pub fn server(&self) -> &MockServer {
        &self.server
    }

    /// 添加 JSON 响应，`expected_calls` 在服务器析构时校验
    pub async fn mock_json(
        &self,
        http_method: &str,
        request_path: &str,
        status: u16,
        body: Value,
        expected_calls: u64,
    ) {
        Mock::given(method(http_method))
            .and(path(request_path))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .expect(expected_calls)
            .mount(&self.server)
            .await;
    }

    /// 收到的请求数
    pub async fn received_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map_or(0, |requests| requests.len())
    }
}

/// 找一个当前没有进程监听的本地地址
pub fn unused_local_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{port}")
}

/// 路由表
pub fn routes(services: &[(&str, &str)]) -> ServiceRoutes {
    let services: BTreeMap<String, String> = services
        .iter()
        .map(|(name, url)| ((*name).to_string(), (*url).to_string()))
        .collect();
    ServiceRoutes::from_config(&services).unwrap()
}

/// 上游客户端，不跟随重定向
pub fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

/// 使用指定缓存后端装配转发引擎
pub fn engine_with_backend(
    backend: Arc<dyn CacheBackend>,
    services: &[(&str, &str)],
) -> ForwardingEngine {
    ForwardingEngine::new(
        routes(services),
        CacheStore::new(backend, TEST_CACHE_TIMEOUT),
        http_client(Duration::from_secs(5)),
        KeyDeriver::default(),
        TEST_CACHE_TTL,
    )
}

/// 使用内存缓存装配转发引擎
pub fn memory_engine(services: &[(&str, &str)]) -> ForwardingEngine {
    engine_with_backend(Arc::new(MemoryBackend::new(1000)), services)
}
