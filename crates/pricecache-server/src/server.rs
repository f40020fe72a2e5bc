use std::future::Future;
use std::net::SocketAddr;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceBuilder;

use crate::handlers::{
    admin::{flush, invalidate, stats, warm_up},
    catalog::{get_entity, get_priced_entity},
    health::health_check,
    metrics::{MetricsState, metrics_handler},
};
use crate::middleware::{LoggingLayer, RequestIdLayer};
use crate::state::AppState;

/// Creates the router with every route and the middleware stack.
pub fn create_router(state: AppState, prometheus_handle: PrometheusHandle) -> Router {
    let middleware_stack = ServiceBuilder::new()
        .layer(RequestIdLayer)
        .layer(LoggingLayer);

    // Router for metrics endpoint (different state)
    let metrics_router = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(MetricsState {
            prometheus: prometheus_handle,
            listener: state.listener().cloned(),
        });

    let app_router = Router::new()
        .route("/health", get(health_check))
        // Read routes
        .route("/catalog/{kind}/{entity_id}", get(get_entity))
        .route(
            "/catalog/{kind}/{entity_id}/price-lists/{price_list_id}",
            get(get_priced_entity),
        )
        // Admin routes
        .route("/admin/stats", get(stats))
        .route("/admin/invalidate", post(invalidate))
        .route("/admin/flush", post(flush))
        .route("/admin/warm-up", post(warm_up))
        .with_state(state);

    Router::new()
        .merge(app_router)
        .merge(metrics_router)
        .layer(middleware::from_fn(
            crate::metrics::http::http_metrics_middleware,
        ))
        .layer(middleware_stack)
}

/// Serves until `shutdown` resolves, then drains in-flight requests.
pub async fn run_server<F>(
    addr: SocketAddr,
    state: AppState,
    prometheus_handle: PrometheusHandle,
    shutdown: F,
) -> Result<(), std::io::Error>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(state, prometheus_handle);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
