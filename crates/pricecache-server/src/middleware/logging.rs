//! Middleware de logging estructurado.

use axum::{
    body::Body,
    http::{Request, Response},
};
use std::{
    task::{Context, Poll},
    time::Instant,
};
use tower::{Layer, Service};
use tracing::{Instrument, info, info_span, warn};

use super::request_id::REQUEST_ID_HEADER;
use crate::handlers::catalog::CACHE_SOURCE_HEADER;

/// Layer that logs requests and responses.
#[derive(Clone, Default)]
pub struct LoggingLayer;

impl<S> Layer<S> for LoggingLayer {
    type Service = LoggingMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        LoggingMiddleware { inner }
    }
}

/// Middleware that logs request/response details.
#[derive(Clone)]
pub struct LoggingMiddleware<S> {
    inner: S,
}

impl<S> Service<Request<Body>> for LoggingMiddleware<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let start = Instant::now();
        let method = request.method().clone();
        let path = request.uri().path().to_string();

        // Lo pone RequestIdMiddleware
        let request_id = request
            .headers()
            .get(&REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();

        let span = info_span!(
            "http_request",
            request_id = %request_id,
            method = %method,
            path = %path,
        );

        let mut inner = self.inner.clone();

        Box::pin(
            async move {
                info!("Request started");

                let response = inner.call(request).await?;

                let status = response.status();
                let duration_ms = start.elapsed().as_millis() as u64;
                // Solo presente en las lecturas del catalogo
                let cache_source = response
                    .headers()
                    .get(&CACHE_SOURCE_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");

                if status.is_server_error() {
                    warn!(
                        status = status.as_u16(),
                        duration_ms,
                        cache_source,
                        "Request failed"
                    );
                } else {
                    info!(
                        status = status.as_u16(),
                        duration_ms,
                        cache_source,
                        "Request completed"
                    );
                }

                Ok(response)
            }
            .instrument(span),
        )
    }
}
