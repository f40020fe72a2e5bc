//! Test client helpers.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Request, Response, StatusCode, header},
};
use http_body_util::BodyExt;
use metrics_exporter_prometheus::PrometheusBuilder;
use pricecache_core::Backoff;
use pricecache_server::{
    AppState, CacheConfig, CatalogCache, FallbackRegistry, Gateway, GatewayConfig, create_router,
};
use tower::ServiceExt;

use super::source::StubSource;

/// Helper para tests de integracion HTTP.
#[derive(Clone)]
pub struct TestClient {
    app: Router,
}

impl TestClient {
    /// Crea un nuevo test client con el router proporcionado.
    pub fn new(app: Router) -> Self {
        Self { app }
    }

    /// Hace un GET request.
    pub async fn get(&self, uri: &str) -> TestResponse {
        self.request(
            Request::builder()
                .uri(uri)
                .method("GET")
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    /// Hace un GET request con headers personalizados.
    pub async fn get_with_headers(&self, uri: &str, headers: Vec<(&str, &str)>) -> TestResponse {
        let mut builder = Request::builder().uri(uri).method("GET");

        for (name, value) in headers {
            builder = builder.header(name, value);
        }

        self.request(builder.body(Body::empty()).unwrap()).await
    }

    /// Hace un POST sin body.
    pub async fn post(&self, uri: &str) -> TestResponse {
        self.request(
            Request::builder()
                .uri(uri)
                .method("POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    /// Hace un POST con body JSON.
    pub async fn post_json(&self, uri: &str, body: serde_json::Value) -> TestResponse {
        self.request(
            Request::builder()
                .uri(uri)
                .method("POST")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// Ejecuta un request arbitrario.
    async fn request(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .app
            .clone()
            .oneshot(request)
            .await
            .expect("Request failed");

        TestResponse::from_response(response).await
    }
}

/// Wrapper sobre Response con helpers para assertions.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    async fn from_response(response: Response<Body>) -> Self {
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read body")
            .to_bytes()
            .to_vec();

        Self {
            status,
            headers,
            body,
        }
    }

    /// Retorna el body como string.
    pub fn text(&self) -> String {
        String::from_utf8(self.body.clone()).expect("Body is not valid UTF-8")
    }

    /// Parsea el body como JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> T {
        serde_json::from_slice(&self.body).expect("Failed to parse JSON")
    }

    /// Retorna un header especifico.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Verifica que el status sea el esperado.
    pub fn assert_status(&self, expected: StatusCode) -> &Self {
        assert_eq!(
            self.status,
            expected,
            "Expected status {} but got {}. Body: {}",
            expected,
            self.status,
            self.text()
        );
        self
    }

    /// Verifica que un header exista.
    pub fn assert_header_exists(&self, name: &str) -> &Self {
        assert!(
            self.headers.contains_key(name),
            "Expected header '{}' to exist",
            name
        );
        self
    }

    /// Verifica que un header tenga un valor especifico.
    pub fn assert_header(&self, name: &str, expected: &str) -> &Self {
        let value = self
            .header(name)
            .unwrap_or_else(|| panic!("Header '{}' not found", name));

        assert_eq!(
            value, expected,
            "Expected header '{}' to be '{}' but got '{}'",
            name, expected, value
        );
        self
    }
}

/// Router, source and state wired the way `main` wires them.
pub struct TestApp {
    pub client: TestClient,
    pub source: Arc<StubSource>,
    pub state: AppState,
}

impl TestApp {
    pub fn cache(&self) -> &CatalogCache {
        self.state.cache()
    }
}

/// Retries and timeouts short enough for tests.
pub fn gateway_config() -> GatewayConfig {
    GatewayConfig {
        max_attempts: 3,
        backoff: Backoff::new(Duration::from_millis(1), Duration::from_millis(5)),
        recompute_timeout: Duration::from_millis(500),
        fallback_ttl: Duration::from_secs(30),
    }
}

/// App sin fallbacks sobre el catalogo de `StubSource::seeded`.
pub fn app() -> TestApp {
    app_with(FallbackRegistry::new())
}

pub fn app_with(fallbacks: FallbackRegistry) -> TestApp {
    let source = Arc::new(StubSource::seeded());
    let cache = CatalogCache::new(CacheConfig::default());
    let gateway = Gateway::new(cache, gateway_config()).with_fallbacks(fallbacks);
    let state = AppState::new(gateway, source.clone());

    // Sin instalar: no pisa el recorder global entre tests
    let prometheus = PrometheusBuilder::new().build_recorder().handle();

    TestApp {
        client: TestClient::new(create_router(state.clone(), prometheus)),
        source,
        state,
    }
}
