//! Metrics endpoint handler.

use std::sync::Arc;

use axum::{extract::State, response::IntoResponse};
use metrics_exporter_prometheus::PrometheusHandle;
use pricecache_sync::ListenerState;

use crate::metrics::listener::update_listener_gauges;

/// Estado del router de /metrics.
#[derive(Clone)]
pub struct MetricsState {
    pub prometheus: PrometheusHandle,
    pub listener: Option<Arc<ListenerState>>,
}

/// Handler para el endpoint /metrics
pub async fn metrics_handler(State(state): State<MetricsState>) -> impl IntoResponse {
    if let Some(listener) = &state.listener {
        update_listener_gauges(&listener.snapshot());
    }
    state.prometheus.render()
}
