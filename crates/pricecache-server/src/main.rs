//! Pricecache Server binary.

use std::sync::Arc;

use anyhow::Context;
use pricecache_sync::{
    CatalogQueries, CatalogSource, ChangeLog, FileWatermarkStore, ListenerHandle,
    NotificationListener, PgCatalogSource, PgNotificationConnector,
};
use pricecache_server::cache::CacheSweeper;
use pricecache_server::metrics::init_metrics;
use pricecache_server::{
    AppState, CatalogCache, Gateway, LogFormat, Settings, run_server, shutdown_signal,
};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("loading settings")?;
    init_tracing(settings.log_format);

    tracing::info!(
        "Starting Pricecache Server v{}",
        pricecache_server::version()
    );

    let prometheus_handle = init_metrics().context("installing metrics recorder")?;
    let addr = settings.socket_addr()?;
    let database_url = settings.database_url()?.to_string();

    let source = Arc::new(
        PgCatalogSource::connect_lazy(
            &database_url,
            settings.database.max_connections,
            settings.database.connect_timeout,
            CatalogQueries::default(),
        )
        .context("creating database pool")?,
    );

    let cache = CatalogCache::new(settings.cache_config());
    let gateway = Gateway::new(cache.clone(), settings.gateway_config())
        .with_fallbacks(settings.fallbacks()?);

    // Reads are served while the listener connects; every connect starts
    // with a catch-up invalidation.
    let listener = start_listener(&settings, &database_url, &cache, &source).await;
    let sweeper = CacheSweeper::new(cache.clone(), settings.cache.sweep_interval).start();

    let state = AppState::new(gateway, source).with_listener(listener.state());

    if settings.warmup.on_startup {
        state.warmup().spawn(settings.warmup.scope_ids.clone());
    }

    run_server(addr, state, prometheus_handle, shutdown_signal()).await?;

    sweeper.stop();
    listener.shutdown().await;
    tracing::info!("Pricecache Server stopped");

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Starts the notification listener in the background.
async fn start_listener(
    settings: &Settings,
    database_url: &str,
    cache: &CatalogCache,
    source: &Arc<PgCatalogSource>,
) -> ListenerHandle {
    let connector = Arc::new(PgNotificationConnector::new(database_url));
    let watermarks = Arc::new(FileWatermarkStore::new(&settings.listener.watermark_path));
    let change_log: Arc<dyn ChangeLog> = source.clone();

    tracing::info!(
        channel = %settings.listener.channel,
        source = source.name(),
        "Starting change listener"
    );

    NotificationListener::new(
        connector,
        Arc::new(cache.clone()),
        watermarks,
        settings.listener_config(),
    )
    .with_change_log(change_log)
    .start(&settings.listener.channel)
    .await
}
