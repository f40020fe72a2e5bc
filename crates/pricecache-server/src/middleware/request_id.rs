//! Middleware que genera o propaga X-Request-Id.

use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request, Response},
};
use std::task::{Context, Poll};
use tower::{Layer, Service};
use uuid::Uuid;

/// Header name for request ID.
pub static REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Longest inbound ID that is propagated; longer ones are replaced.
pub const MAX_REQUEST_ID_LEN: usize = 128;

/// Layer that adds request ID to requests and responses.
#[derive(Clone, Default)]
pub struct RequestIdLayer;

impl<S> Layer<S> for RequestIdLayer {
    type Service = RequestIdMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestIdMiddleware { inner }
    }
}

/// Middleware that ensures every request has a usable ID.
#[derive(Clone)]
pub struct RequestIdMiddleware<S> {
    inner: S,
}

/// Acepta el ID entrante solo si es corto y sin espacios.
fn inbound_id(request: &Request<Body>) -> Option<String> {
    let id = request.headers().get(&REQUEST_ID_HEADER)?.to_str().ok()?;
    let usable = !id.is_empty()
        && id.len() <= MAX_REQUEST_ID_LEN
        && id.chars().all(|c| c.is_ascii_graphic());
    usable.then(|| id.to_string())
}

impl<S> Service<Request<Body>> for RequestIdMiddleware<S>
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

    fn call(&mut self, mut request: Request<Body>) -> Self::Future {
        let request_id = inbound_id(&request).unwrap_or_else(|| Uuid::new_v4().to_string());

        // Visible para los handlers y el logging
        let header = HeaderValue::from_str(&request_id).ok();
        if let Some(value) = &header {
            request
                .headers_mut()
                .insert(REQUEST_ID_HEADER.clone(), value.clone());
        }

        let mut inner = self.inner.clone();

        Box::pin(async move {
            let mut response = inner.call(request).await?;

            if let Some(value) = header {
                response
                    .headers_mut()
                    .insert(REQUEST_ID_HEADER.clone(), value);
            }

            Ok(response)
        })
    }
}

// Unit tests are in tests/middleware_test.rs to avoid complex type bounds
// with tower::service_fn and async functions.
