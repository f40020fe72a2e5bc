//! Cache metrics recording.

use metrics::{counter, gauge, histogram};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Registra las metricas de cache.
/// Llamar una vez al inicio para registrar las metricas.
pub fn register_cache_metrics() {
    // Describir metricas
    metrics::describe_counter!("pricecache_cache_hits_total", "Total number of cache hits");
    metrics::describe_counter!(
        "pricecache_cache_misses_total",
        "Total number of cache misses"
    );
    metrics::describe_counter!(
        "pricecache_cache_invalidations_total",
        "Total number of entries removed by invalidation"
    );
    metrics::describe_counter!(
        "pricecache_cache_evictions_total",
        "Total number of cache evictions"
    );
    metrics::describe_counter!(
        "pricecache_cache_corrupt_entries_total",
        "Entries discarded because they could not be decoded"
    );
    metrics::describe_gauge!(
        "pricecache_cache_entries",
        "Current number of entries in cache"
    );
    metrics::describe_histogram!(
        "pricecache_cache_operation_seconds",
        "Time spent on cache operations"
    );
}

/// Recorder de metricas de cache.
/// Usa atomic counters internos para las estadisticas del endpoint admin.
#[derive(Debug, Clone)]
pub struct CacheMetrics {
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
    invalidations: Arc<AtomicU64>,
    evictions: Arc<AtomicU64>,
    corruptions: Arc<AtomicU64>,
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self {
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
            invalidations: Arc::new(AtomicU64::new(0)),
            evictions: Arc::new(AtomicU64::new(0)),
            corruptions: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Registra un cache hit
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        counter!("pricecache_cache_hits_total").increment(1);
    }

    /// Registra un cache miss
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        counter!("pricecache_cache_misses_total").increment(1);
    }

    /// Registra entries removidas por invalidacion
    pub fn record_invalidations(&self, count: u64) {
        self.invalidations.fetch_add(count, Ordering::Relaxed);
        counter!("pricecache_cache_invalidations_total").increment(count);
    }

    /// Registra una eviction. Solo ttl y capacity cuentan en las estadisticas.
    pub fn record_eviction(&self, reason: &str) {
        if matches!(reason, "ttl" | "capacity") {
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
        counter!("pricecache_cache_evictions_total", "reason" => reason.to_string()).increment(1);
    }

    /// Registra una entry descartada por no poder deserializarse
    pub fn record_corruption(&self) {
        self.corruptions.fetch_add(1, Ordering::Relaxed);
        counter!("pricecache_cache_corrupt_entries_total").increment(1);
    }

    /// Actualiza el gauge de entries
    pub fn update_entry_count(&self, count: u64) {
        gauge!("pricecache_cache_entries").set(count as f64);
    }

    /// Registra la duracion de una operacion
    pub fn record_operation_duration(&self, operation: &str, duration: Duration) {
        histogram!(
            "pricecache_cache_operation_seconds",
            "operation" => operation.to_string()
        )
        .record(duration.as_secs_f64());
    }

    /// Calcula hit rate
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed) as f64;
        let misses = self.misses.load(Ordering::Relaxed) as f64;
        let total = hits + misses;
        if total == 0.0 { 0.0 } else { hits / total }
    }

    /// Retorna el numero de hits
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Retorna el numero de misses
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn invalidations(&self) -> u64 {
        self.invalidations.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    pub fn corruptions(&self) -> u64 {
        self.corruptions.load(Ordering::Relaxed)
    }

    /// Reinicia los contadores internos. Los counters Prometheus son
    /// monotonicos y no se tocan.
    pub fn reset(&self) {
        for counter in [
            &self.hits,
            &self.misses,
            &self.invalidations,
            &self.evictions,
            &self.corruptions,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for CacheMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_metrics_hit_rate() {
        let metrics = CacheMetrics::new();

        // 3 hits, 1 miss = 75% hit rate
        metrics.record_hit();
        metrics.record_hit();
        metrics.record_hit();
        metrics.record_miss();

        let rate = metrics.hit_rate();
        assert!((rate - 0.75).abs() < 0.001);
    }

    #[test]
    fn test_hit_miss_counters() {
        let metrics = CacheMetrics::new();

        assert_eq!(metrics.hits(), 0);
        assert_eq!(metrics.misses(), 0);

        metrics.record_hit();
        metrics.record_hit();
        metrics.record_miss();

        assert_eq!(metrics.hits(), 2);
        assert_eq!(metrics.misses(), 1);
    }

    #[test]
    fn test_only_ttl_and_capacity_count_as_evictions() {
        let metrics = CacheMetrics::new();

        metrics.record_eviction("ttl");
        metrics.record_eviction("capacity");
        metrics.record_eviction("manual");
        metrics.record_eviction("replaced");

        assert_eq!(metrics.evictions(), 2);
    }

    #[test]
    fn test_reset() {
        let metrics = CacheMetrics::new();
        metrics.record_hit();
        metrics.record_invalidations(4);

        metrics.reset();

        assert_eq!(metrics.hits(), 0);
        assert_eq!(metrics.invalidations(), 0);
        assert_eq!(metrics.hit_rate(), 0.0);
    }
}
