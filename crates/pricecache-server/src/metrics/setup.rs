//! Metrics setup and initialization.

use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};
use tracing::info;

use super::cache::register_cache_metrics;
use super::http::register_http_metrics;
use super::listener::register_listener_metrics;
use super::resolve::register_resolve_metrics;

/// Buckets por defecto (en segundos): operaciones de cache y HTTP.
const DEFAULT_BUCKETS: &[f64] = &[
    0.0001, // 100 microsegundos
    0.0005, // 500 microsegundos
    0.001,  // 1 milisegundo
    0.0025, // 2.5 milisegundos
    0.005,  // 5 milisegundos
    0.01,   // 10 milisegundos
    0.025,  // 25 milisegundos
    0.05,   // 50 milisegundos
    0.1,    // 100 milisegundos
    0.25,   // 250 milisegundos
    0.5,    // 500 milisegundos
    1.0,    // 1 segundo
    2.5,    // 2.5 segundos
    5.0,    // 5 segundos
];

/// Un resolve puede incluir reintentos con backoff y timeouts de recompute.
const RESOLVE_BUCKETS: &[f64] = &[0.0005, 0.005, 0.05, 0.25, 1.0, 2.0, 4.0, 8.0, 15.0];

/// Inicializa el sistema de metricas y retorna el handle para el endpoint.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new()
        .set_buckets(DEFAULT_BUCKETS)?
        .set_buckets_for_metric(
            Matcher::Full("pricecache_resolve_seconds".to_string()),
            RESOLVE_BUCKETS,
        )?
        .install_recorder()?;

    register_cache_metrics();
    register_resolve_metrics();
    register_listener_metrics();
    register_http_metrics();

    info!("Metrics system initialized");
    Ok(handle)
}
