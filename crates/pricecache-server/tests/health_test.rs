mod helpers;

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use metrics_exporter_prometheus::PrometheusBuilder;
use pricecache_core::{CacheKey, ProjectionKind};
use pricecache_server::{EntrySource, create_router};
use pricecache_sync::{
    ChannelNotifier, ListenerConfig, ListenerPhase, MemoryWatermarkStore, NotificationListener,
};
use serde_json::{Value, json};

use helpers::{TestClient, app};

#[tokio::test]
async fn health_check_returns_200() {
    let response = app().client.get("/health").await;

    response.assert_status(StatusCode::OK);
}

#[tokio::test]
async fn health_check_returns_json() {
    let response = app().client.get("/health").await;

    let content_type = response.header("content-type").unwrap();
    assert!(content_type.contains("application/json"));
}

#[tokio::test]
async fn health_check_reports_cache_and_no_listener() {
    let app = app();
    let key = CacheKey::entity(ProjectionKind::Test, 1001, Some(27));
    app.cache()
        .set(key, json!({"id": 1001}), app.cache().ttl(), EntrySource::Fresh)
        .await;
    app.cache().sync().await;

    let health: Value = app.client.get("/health").await.json();

    assert_eq!(health["status"], "UP");
    assert_eq!(health["cacheEntries"], 1);
    assert!(health["listener"].is_null());
}

#[tokio::test]
async fn health_check_reports_listener_phase() {
    let app = app();
    let notifier = ChannelNotifier::new();
    let listener = NotificationListener::new(
        Arc::new(notifier.clone()),
        Arc::new(app.cache().clone()),
        Arc::new(MemoryWatermarkStore::new()),
        ListenerConfig::default(),
    );
    let handle = listener.start("catalog_changes").await;
    let listener_state = handle.state();
    tokio::time::timeout(
        Duration::from_secs(5),
        listener_state.wait_until(|s| s.phase == ListenerPhase::Connected),
    )
    .await
    .unwrap();

    let state = app.state.clone().with_listener(handle.state());
    let prometheus = PrometheusBuilder::new().build_recorder().handle();
    let client = TestClient::new(create_router(state, prometheus));

    let health: Value = client.get("/health").await.json();
    assert_eq!(health["status"], "UP");
    assert_eq!(health["listener"], "connected");

    handle.shutdown().await;
}

#[tokio::test]
async fn health_check_reports_source_down_but_stays_up() {
    let app = app();
    app.source.set_failing(true);

    let response = app.client.get("/health").await;
    response.assert_status(StatusCode::OK);

    let health: Value = response.json();
    assert_eq!(health["status"], "UP");
    assert_eq!(health["source"]["name"], "stub");
    assert_eq!(health["source"]["status"], "DOWN");
    assert!(health["source"]["error"].as_str().unwrap().contains("database is down"));
}

#[tokio::test]
async fn serves_reads_while_listener_is_still_connecting() {
    let app = app();
    let notifier = ChannelNotifier::new();
    notifier.set_available(false);

    let listener = NotificationListener::new(
        Arc::new(notifier.clone()),
        Arc::new(app.cache().clone()),
        Arc::new(MemoryWatermarkStore::new()),
        ListenerConfig::default(),
    );
    let handle = listener.start("catalog_changes").await;
    let listener_state = handle.state();

    let state = app.state.clone().with_listener(handle.state());
    let prometheus = PrometheusBuilder::new().build_recorder().handle();
    let client = TestClient::new(create_router(state, prometheus));

    let health: Value = client.get("/health").await.json();
    assert_eq!(health["status"], "UP");
    assert_eq!(health["source"]["status"], "UP");
    assert_ne!(health["listener"], "connected");

    let response = client.get("/catalog/test/1001/price-lists/27").await;
    response.assert_status(StatusCode::OK);

    // Once the channel comes back, the first connect catches up.
    notifier.set_available(true);
    let status = tokio::time::timeout(
        Duration::from_secs(5),
        listener_state.wait_until(|s| s.phase == ListenerPhase::Connected),
    )
    .await
    .unwrap();
    assert_eq!(status.catch_ups, 1);
    assert_eq!(status.reconnects, 0);

    handle.shutdown().await;
}
