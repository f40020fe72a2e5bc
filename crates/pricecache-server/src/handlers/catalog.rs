//! Read endpoints backed by the gateway.

use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderName, HeaderValue},
    response::{IntoResponse, Response},
};
use pricecache_core::{CacheKey, ProjectionKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;

use crate::error::AppError;
use crate::gateway::ResolveSource;
use crate::state::AppState;

pub static CACHE_SOURCE_HEADER: HeaderName = HeaderName::from_static("x-cache-source");
pub static CACHE_DEGRADED_HEADER: HeaderName = HeaderName::from_static("x-cache-degraded");

#[derive(Debug, Serialize)]
pub struct CatalogResponse {
    pub key: String,
    pub source: ResolveSource,
    pub value: Value,
}

#[derive(Debug, Deserialize)]
pub struct EntityPath {
    pub kind: String,
    pub entity_id: String,
}

#[derive(Debug, Deserialize)]
pub struct PricedEntityPath {
    pub kind: String,
    pub entity_id: String,
    pub price_list_id: String,
}

/// GET /catalog/{kind}/{entity_id}
#[instrument(skip_all, fields(kind = %path.kind, entity_id = %path.entity_id))]
pub async fn get_entity(State(state): State<AppState>, Path(path): Path<EntityPath>) -> Response {
    match parse_key(&path.kind, &path.entity_id, None) {
        Ok(key) => resolve(&state, key).await,
        Err(e) => e.into_response(),
    }
}

/// GET /catalog/{kind}/{entity_id}/price-lists/{price_list_id}
#[instrument(skip_all, fields(
    kind = %path.kind,
    entity_id = %path.entity_id,
    price_list_id = %path.price_list_id
))]
pub async fn get_priced_entity(
    State(state): State<AppState>,
    Path(path): Path<PricedEntityPath>,
) -> Response {
    let key = path
        .price_list_id
        .parse::<i64>()
        .map_err(|_| {
            AppError::BadRequest(format!("invalid price list id '{}'", path.price_list_id))
        })
        .and_then(|price_list_id| parse_key(&path.kind, &path.entity_id, Some(price_list_id)));

    match key {
        Ok(key) => resolve(&state, key).await,
        Err(e) => e.into_response(),
    }
}

/// Builds the cache key; `*` as entity selects the whole category.
fn parse_key(
    kind: &str,
    entity_id: &str,
    price_list_id: Option<i64>,
) -> Result<CacheKey, AppError> {
    let kind: ProjectionKind = kind
        .parse()
        .map_err(|e: pricecache_core::CoreError| AppError::BadRequest(e.to_string()))?;

    if entity_id == "*" {
        return Ok(CacheKey::all(kind, price_list_id));
    }

    let id = entity_id
        .parse::<i64>()
        .map_err(|_| AppError::BadRequest(format!("invalid entity id '{entity_id}'")))?;
    Ok(CacheKey::entity(kind, id, price_list_id))
}

async fn resolve(state: &AppState, key: CacheKey) -> Response {
    let source = state.source();
    let result = state
        .gateway()
        .resolve(key, || source.fetch(&key))
        .await;

    match result {
        Ok(resolved) => {
            let degraded = resolved.source.is_degraded();
            let mut response = Json(CatalogResponse {
                key: key.to_string(),
                source: resolved.source,
                value: resolved.value,
            })
            .into_response();

            set_source_headers(&mut response, resolved.source, degraded);
            response
        },
        Err(e) => {
            let mut response = AppError::from(e).into_response();
            set_source_headers(&mut response, ResolveSource::None, false);
            response
        },
    }
}

fn set_source_headers(response: &mut Response, source: ResolveSource, degraded: bool) {
    let headers = response.headers_mut();
    headers.insert(
        CACHE_SOURCE_HEADER.clone(),
        HeaderValue::from_static(source.as_str()),
    );
    if degraded {
        headers.insert(
            CACHE_DEGRADED_HEADER.clone(),
            HeaderValue::from_static("true"),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key() {
        assert_eq!(
            parse_key("test", "1001", Some(27)).unwrap().to_string(),
            "test:27:1001"
        );
        assert_eq!(
            parse_key("test_group", "*", None).unwrap().to_string(),
            "test_group:default:*"
        );
        assert!(matches!(
            parse_key("coupon", "1", None),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            parse_key("test", "abc", None),
            Err(AppError::BadRequest(_))
        ));
    }
}
