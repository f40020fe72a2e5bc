//! Administrative endpoints.

use std::time::Instant;

use axum::{Json, extract::State};
use pricecache_sync::ListenerStatus;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::cache::{CacheStats, parse_pattern};
use crate::error::AppError;
use crate::state::AppState;
use crate::warmup::WarmUpReport;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub source: String,
    pub cache: CacheStats,
    pub listener: Option<ListenerStatus>,
}

/// Request body para invalidacion. Acepta un patron o varios.
#[derive(Debug, Deserialize)]
pub struct InvalidateRequest {
    pub pattern: Option<String>,
    #[serde(default)]
    pub patterns: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidateResponse {
    /// Numero de entries invalidadas.
    pub invalidated: usize,
    pub patterns: Vec<String>,
    pub duration_ms: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlushResponse {
    pub flushed: u64,
    pub duration_ms: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarmUpRequest {
    #[serde(default)]
    pub scope_ids: Vec<i64>,
}

/// GET /admin/stats
pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    // Entry counts are only exact after pending maintenance has run.
    state.cache().sync().await;

    Json(StatsResponse {
        source: state.source().name().to_string(),
        cache: state.cache().stats(),
        listener: state.listener_status(),
    })
}

/// POST /admin/invalidate
/// Invalida las entries que coinciden con los patrones glob.
/// Los patrones se validan todos antes de tocar la cache.
#[instrument(skip_all)]
pub async fn invalidate(
    State(state): State<AppState>,
    Json(request): Json<InvalidateRequest>,
) -> Result<Json<InvalidateResponse>, AppError> {
    let mut patterns = request.patterns;
    if let Some(pattern) = request.pattern {
        patterns.insert(0, pattern);
    }
    if patterns.is_empty() {
        return Err(AppError::BadRequest(
            "either 'pattern' or 'patterns' is required".to_string(),
        ));
    }
    for pattern in &patterns {
        parse_pattern(pattern)?;
    }

    let start = Instant::now();
    let refs: Vec<&str> = patterns.iter().map(String::as_str).collect();
    let result = state.cache().invalidate_by_patterns(&refs).await;

    info!(
        patterns = ?result.patterns,
        count = result.count,
        "Admin invalidation"
    );

    Ok(Json(InvalidateResponse {
        invalidated: result.count,
        patterns: result.patterns,
        duration_ms: start.elapsed().as_millis() as u64,
    }))
}

/// POST /admin/flush
/// Vacia la cache, incluidos los valores stale, y reinicia las estadisticas.
#[instrument(skip_all)]
pub async fn flush(State(state): State<AppState>) -> Json<FlushResponse> {
    let start = Instant::now();
    let flushed = state.cache().flush().await;

    info!(count = flushed, "Cache flushed");

    Json(FlushResponse {
        flushed,
        duration_ms: start.elapsed().as_millis() as u64,
    })
}

/// POST /admin/warm-up
/// Corre un warm-up y espera el reporte. Sin body, o con `scopeIds` vacio,
/// calienta todas las listas de precios activas.
#[instrument(skip_all)]
pub async fn warm_up(
    State(state): State<AppState>,
    body: Option<Json<WarmUpRequest>>,
) -> Result<Json<WarmUpReport>, AppError> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let report = state.warmup().warm_up(&request.scope_ids).await?;
    Ok(Json(report))
}
