//! Listener gauges.

use metrics::gauge;
use pricecache_sync::{ListenerPhase, ListenerStatus};

/// Registra las metricas del listener.
pub fn register_listener_metrics() {
    metrics::describe_gauge!(
        "pricecache_listener_connected",
        "1 while the notification listener is receiving"
    );
    metrics::describe_gauge!(
        "pricecache_listener_reconnects",
        "Successful reconnects since start"
    );
    metrics::describe_gauge!(
        "pricecache_listener_events_processed",
        "Change events decoded and applied"
    );
    metrics::describe_gauge!(
        "pricecache_listener_malformed_events",
        "Change events skipped because they could not be decoded"
    );
}

/// Copia el estado del listener a los gauges.
/// Se llama en cada scrape de /metrics.
pub fn update_listener_gauges(status: &ListenerStatus) {
    let connected = if status.phase == ListenerPhase::Connected { 1.0 } else { 0.0 };

    gauge!("pricecache_listener_connected").set(connected);
    gauge!("pricecache_listener_reconnects").set(status.reconnects as f64);
    gauge!("pricecache_listener_events_processed").set(status.events_processed as f64);
    gauge!("pricecache_listener_malformed_events").set(status.malformed_events as f64);
}
