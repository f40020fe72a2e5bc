use axum::{Json, extract::State};
use pricecache_sync::ListenerPhase;
use serde::Serialize;
use tokio::time::timeout;

use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub cache_entries: u64,
    pub source: SourceHealth,
    /// `None` when no listener runs in this process.
    pub listener: Option<ListenerPhase>,
}

#[derive(Debug, Serialize)]
pub struct SourceHealth {
    pub name: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// GET /health
///
/// Always `UP` while the process serves requests. A failing database or a
/// disconnected listener degrades freshness, not availability, so both are
/// reported per component.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let source = state.source();
    let deadline = state.gateway().config().recompute_timeout;

    let error = match timeout(deadline, source.health_check()).await {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(e.to_string()),
        Err(_) => Some(format!("health check timed out after {}ms", deadline.as_millis())),
    };

    Json(HealthResponse {
        status: "UP".to_string(),
        cache_entries: state.cache().entry_count(),
        source: SourceHealth {
            name: source.name().to_string(),
            status: if error.is_none() { "UP" } else { "DOWN" }.to_string(),
            error,
        },
        listener: state.listener_status().map(|s| s.phase),
    })
}
