//! Read path metrics.

use metrics::{counter, histogram};
use std::time::Duration;

use crate::gateway::ResolveSource;

/// Registra las metricas del read path.
pub fn register_resolve_metrics() {
    metrics::describe_counter!(
        "pricecache_resolve_total",
        "Resolutions by source (cache, fresh, stale, fallback, none)"
    );
    metrics::describe_histogram!(
        "pricecache_resolve_seconds",
        "Time spent resolving a key, including recompute"
    );
}

/// Registra una resolucion y su duracion.
pub fn record_resolution(source: ResolveSource, duration: Duration) {
    counter!("pricecache_resolve_total", "source" => source.as_str()).increment(1);
    histogram!("pricecache_resolve_seconds", "source" => source.as_str())
        .record(duration.as_secs_f64());
}
