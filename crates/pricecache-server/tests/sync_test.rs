//! Listener, cache and read path working together.

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use chrono::{DateTime, TimeZone, Utc};
use pricecache_core::{Backoff, CacheKey, ChangeEvent, EntityKind, ProjectionKind, Watermark};
use pricecache_sync::{
    ChannelNotifier, ListenerConfig, ListenerHandle, ListenerPhase, MemoryWatermarkStore,
    NotificationListener,
};
use serde_json::{Value, json};

use helpers::{TestApp, app};

const CHANNEL: &str = "catalog_changes";
const PRICED: &str = "/catalog/test/1001/price-lists/27";

fn at(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap() + chrono::Duration::seconds(secs)
}

fn config() -> ListenerConfig {
    ListenerConfig {
        backoff: Backoff::new(Duration::from_millis(5), Duration::from_millis(25)),
        connect_timeout: Duration::from_millis(250),
        batch_limit: 64,
    }
}

async fn within<F: std::future::Future>(fut: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(5), fut)
        .await
        .expect("condition not reached in time")
}

async fn listen(app: &TestApp, notifier: &ChannelNotifier) -> ListenerHandle {
    let watermarks = MemoryWatermarkStore::with_watermark(Watermark::new(at(0), CHANNEL));
    let listener = NotificationListener::new(
        Arc::new(notifier.clone()),
        Arc::new(app.cache().clone()),
        Arc::new(watermarks),
        config(),
    )
    .with_change_log(app.source.clone());

    let handle = listener.start(CHANNEL).await;
    within(handle.state().wait_until(|s| s.phase == ListenerPhase::Connected)).await;
    handle
}

async fn price(app: &TestApp, uri: &str) -> (String, Value) {
    let response = app.client.get(uri).await;
    response.assert_status(StatusCode::OK);
    let source = response.header("x-cache-source").unwrap().to_string();
    (source, response.json::<Value>()["value"]["price"].clone())
}

#[tokio::test]
async fn price_change_is_visible_on_next_read() {
    let app = app();
    let notifier = ChannelNotifier::new();
    let handle = listen(&app, &notifier).await;
    let state = handle.state();

    assert_eq!(price(&app, PRICED).await, ("fresh".to_string(), json!(270)));
    assert_eq!(price(&app, PRICED).await, ("cache".to_string(), json!(270)));

    app.source.put(
        ProjectionKind::Test,
        1001,
        Some(27),
        json!({ "id": 1001, "price": 300 }),
    );
    notifier.publish(
        CHANNEL,
        ChangeEvent::priced(EntityKind::PriceListEntry, 1001, 27, at(1)).to_payload(),
    );
    within(state.wait_until(|s| s.events_processed == 1)).await;

    assert_eq!(price(&app, PRICED).await, ("fresh".to_string(), json!(300)));
    assert_eq!(app.source.fetch_count(), 2);

    handle.shutdown().await;
}

#[tokio::test]
async fn changed_entity_is_served_stale_while_source_is_down() {
    let app = app();
    let notifier = ChannelNotifier::new();
    let handle = listen(&app, &notifier).await;
    let state = handle.state();

    price(&app, PRICED).await;

    notifier.publish(
        CHANNEL,
        ChangeEvent::priced(EntityKind::PriceListEntry, 1001, 27, at(1)).to_payload(),
    );
    within(state.wait_until(|s| s.events_processed == 1)).await;
    app.source.set_failing(true);

    assert_eq!(price(&app, PRICED).await, ("stale".to_string(), json!(270)));

    handle.shutdown().await;
}

#[tokio::test]
async fn entity_change_invalidates_every_scope_of_its_kind() {
    let app = app();
    let notifier = ChannelNotifier::new();
    let handle = listen(&app, &notifier).await;
    let state = handle.state();

    price(&app, PRICED).await;
    price(&app, "/catalog/test/1001/price-lists/31").await;
    price(&app, "/catalog/test_group/3/price-lists/27").await;

    notifier.publish(
        CHANNEL,
        ChangeEvent::new(EntityKind::Test, 1001, at(1)).to_payload(),
    );
    within(state.wait_until(|s| s.events_processed == 1)).await;

    assert_eq!(price(&app, PRICED).await.0, "fresh");
    assert_eq!(price(&app, "/catalog/test/1001/price-lists/31").await.0, "fresh");
    assert_eq!(price(&app, "/catalog/test_group/3/price-lists/27").await.0, "cache");

    handle.shutdown().await;
}

#[tokio::test]
async fn changes_missed_during_outage_are_invalidated_on_reconnect() {
    let app = app();
    let notifier = ChannelNotifier::new();
    let handle = listen(&app, &notifier).await;
    let state = handle.state();

    price(&app, PRICED).await;
    price(&app, "/catalog/test/1002/price-lists/27").await;
    app.client.get("/catalog/test/*/price-lists/27").await;

    notifier.set_available(false);
    notifier.disconnect_all();
    within(state.wait_until(|s| s.phase != ListenerPhase::Connected)).await;

    // Escrito mientras no habia conexion: nadie lo notifica
    app.source.put(
        ProjectionKind::Test,
        1001,
        Some(27),
        json!({ "id": 1001, "price": 310 }),
    );
    app.source
        .record_change(ChangeEvent::priced(EntityKind::PriceListEntry, 1001, 27, at(5)));
    notifier.set_available(true);

    within(state.wait_until(|s| s.catch_ups == 2)).await;

    let list = CacheKey::all(ProjectionKind::Test, Some(27));
    assert!(app.cache().get(&list).await.is_none());
    assert_eq!(price(&app, PRICED).await, ("fresh".to_string(), json!(310)));
    assert_eq!(
        price(&app, "/catalog/test/1002/price-lists/27").await.0,
        "cache"
    );
    assert_eq!(state.snapshot().watermark.unwrap().last_processed_at, at(5));

    handle.shutdown().await;
}
