//! HTTP metrics middleware.

use axum::{body::Body, extract::MatchedPath, http::Request, middleware::Next, response::Response};
use metrics::{counter, histogram};
use std::time::Instant;

use crate::handlers::catalog::CACHE_SOURCE_HEADER;

/// Label para requests que no coinciden con ninguna ruta.
const UNMATCHED_PATH: &str = "unmatched";

/// Middleware que registra metricas HTTP para cada request.
/// Las lecturas del catalogo llevan ademas el origen del valor servido.
pub async fn http_metrics_middleware(
    matched_path: Option<MatchedPath>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = matched_path
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_PATH.to_string());

    let response = next.run(request).await;

    let status = response.status().as_u16().to_string();
    let source = response
        .headers()
        .get(&CACHE_SOURCE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    counter!(
        "pricecache_http_requests_total",
        "method" => method.clone(),
        "path" => path.clone(),
        "status" => status,
        "source" => source
    )
    .increment(1);

    histogram!(
        "pricecache_http_request_duration_seconds",
        "method" => method,
        "path" => path
    )
    .record(start.elapsed().as_secs_f64());

    response
}

/// Registra las metricas HTTP
pub fn register_http_metrics() {
    metrics::describe_counter!(
        "pricecache_http_requests_total",
        "HTTP requests by route, status and cache source"
    );
    metrics::describe_histogram!(
        "pricecache_http_request_duration_seconds",
        "HTTP request duration in seconds"
    );
}
