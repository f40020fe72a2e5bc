//! Notification listener loop.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use pricecache_core::{Backoff, ChangeEvent, Invalidation, Watermark, coalesce};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use super::connector::{NotificationConnection, NotificationConnector};
use super::state::{ListenerPhase, ListenerState};
use crate::error::SyncError;
use crate::invalidator::CacheInvalidator;
use crate::source::ChangeLog;
use crate::watermark::WatermarkStore;

/// Callback invoked for every decoded change event.
pub type EventHandler = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

/// Configuration for the notification listener.
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Reconnect delays.
    pub backoff: Backoff,
    /// Deadline for a single connection attempt.
    pub connect_timeout: Duration,
    /// Maximum payloads coalesced into one burst.
    pub batch_limit: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            backoff: Backoff::new(Duration::from_millis(250), Duration::from_secs(30)),
            connect_timeout: Duration::from_secs(5),
            batch_limit: 256,
        }
    }
}

/// Handle for controlling a running listener.
pub struct ListenerHandle {
    shutdown_tx: watch::Sender<bool>,
    state: Arc<ListenerState>,
    task: Option<JoinHandle<()>>,
}

impl ListenerHandle {
    /// Signals the listener to stop.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Stops the listener and waits for the loop to exit.
    pub async fn shutdown(mut self) {
        self.stop();
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            error!(error = %e, "Listener task panicked");
        }
    }

    /// Returns the shared listener state.
    pub fn state(&self) -> Arc<ListenerState> {
        Arc::clone(&self.state)
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Why the receive loop ended.
enum Exit {
    Shutdown,
    Lost(String),
}

/// Listens for change notifications and invalidates the cache.
///
/// The listener never gives up: it is the only path by which the cache
/// learns about changes. Connection failures are retried forever with
/// exponential backoff, and every successful connect is followed by a
/// catch-up invalidation because the channel keeps no backlog.
pub struct NotificationListener {
    connector: Arc<dyn NotificationConnector>,
    invalidator: Arc<dyn CacheInvalidator>,
    watermarks: Arc<dyn WatermarkStore>,
    change_log: Option<Arc<dyn ChangeLog>>,
    handlers: Vec<EventHandler>,
    config: ListenerConfig,
    channel: String,
    state: Arc<ListenerState>,
    watermark: Option<Watermark>,
}

impl NotificationListener {
    /// Creates a new listener.
    pub fn new(
        connector: Arc<dyn NotificationConnector>,
        invalidator: Arc<dyn CacheInvalidator>,
        watermarks: Arc<dyn WatermarkStore>,
        config: ListenerConfig,
    ) -> Self {
        Self {
            connector,
            invalidator,
            watermarks,
            change_log: None,
            handlers: Vec::new(),
            config,
            channel: String::new(),
            state: Arc::new(ListenerState::new("")),
            watermark: None,
        }
    }

    /// Sets the change log queried during catch-up.
    ///
    /// Without one, catch-up invalidates everything.
    pub fn with_change_log(mut self, change_log: Arc<dyn ChangeLog>) -> Self {
        self.change_log = Some(change_log);
        self
    }

    /// Registers an extra callback run for every decoded event, after its
    /// invalidations are applied.
    pub fn on_event<F>(&mut self, handler: F)
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        self.handlers.push(Arc::new(handler));
    }

    /// Subscribes to `channel` in the background and returns right away.
    ///
    /// The first connection attempt is made immediately by the background
    /// loop; failures, including that first one, are retried with backoff
    /// and show up in the listener state. Callers can serve reads while the
    /// listener connects since every connect starts with a catch-up.
    pub async fn start(mut self, channel: &str) -> ListenerHandle {
        self.channel = channel.to_string();
        self.state = Arc::new(ListenerState::new(channel));

        self.watermark = match self.watermarks.load().await {
            Ok(wm) => wm,
            Err(e) => {
                warn!(error = %e, "Could not load watermark, catch-up will invalidate everything");
                None
            },
        };
        if let Some(wm) = &self.watermark {
            self.state.set_watermark(wm.clone());
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let state = Arc::clone(&self.state);
        let task = tokio::spawn(self.run(shutdown_rx));

        ListenerHandle {
            shutdown_tx,
            state,
            task: Some(task),
        }
    }

    /// Runs the listener loop until shutdown.
    async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(channel = %self.channel, "Starting notification listener");

        let mut is_first = true;
        let mut attempt: u32 = 0;

        loop {
            // The very first attempt does not wait.
            if !is_first || attempt > 0 {
                let delay = self.config.backoff.delay(attempt);
                self.state.set_phase(ListenerPhase::Backoff);
                debug!(delay_ms = delay.as_millis() as u64, attempt, "Backing off");

                tokio::select! {
                    _ = sleep(delay) => {}
                    _ = shutdown_rx.changed() => break,
                }
            }

            self.state.set_phase(ListenerPhase::Connecting);
            let result = tokio::select! {
                result = self.connect_once() => result,
                _ = shutdown_rx.changed() => break,
            };

            let mut connection = match result {
                Ok(conn) => conn,
                Err(e) => {
                    attempt = attempt.saturating_add(1);
                    self.state.record_failure(e.to_string());
                    if is_first {
                        warn!(attempt, error = %e, "Notification channel unavailable, retrying");
                    } else {
                        warn!(attempt, error = %e, "Reconnect failed");
                    }
                    continue;
                },
            };

            attempt = 0;
            self.state.record_connected(is_first);
            if !is_first {
                info!(channel = %self.channel, "Reconnected to notification channel");
            }
            is_first = false;

            self.catch_up().await;
            self.state.set_phase(ListenerPhase::Connected);

            match self.receive(&mut *connection, &mut shutdown_rx).await {
                Exit::Shutdown => break,
                Exit::Lost(reason) => {
                    warn!(reason = %reason, "Notification connection lost");
                    self.state.record_disconnect(reason);
                },
            }
        }

        self.state.set_phase(ListenerPhase::Stopped);
        info!("Notification listener shutting down");
    }

    /// Receives notifications until the connection drops or shutdown.
    async fn receive(
        &mut self,
        connection: &mut dyn NotificationConnection,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) -> Exit {
        loop {
            tokio::select! {
                biased;
                result = shutdown_rx.changed() => {
                    if result.is_err() || *shutdown_rx.borrow() {
                        return Exit::Shutdown;
                    }
                }
                result = connection.recv() => match result {
                    Ok(Some(payload)) => {
                        let mut batch = vec![payload];
                        let limit = self.config.batch_limit.saturating_sub(1);
                        batch.extend(connection.drain_buffered(limit));
                        self.process_batch(batch).await;
                    },
                    Ok(None) => return Exit::Lost(SyncError::ConnectionClosed.to_string()),
                    Err(e) => return Exit::Lost(e.to_string()),
                },
            }
        }
    }

    /// One connection attempt bounded by the per-attempt timeout.
    async fn connect_once(&self) -> Result<Box<dyn NotificationConnection>, SyncError> {
        let deadline = self.config.connect_timeout;
        match timeout(deadline, self.connector.connect(&self.channel)).await {
            Ok(result) => result,
            Err(_) => Err(SyncError::timeout(deadline)),
        }
    }

    /// Decodes a burst of payloads and applies their invalidations.
    ///
    /// Undecodable payloads are skipped one by one. Duplicate invalidations
    /// inside the burst are applied once. The watermark advances only after
    /// the invalidations went through.
    async fn process_batch(&mut self, payloads: Vec<String>) {
        let mut events = Vec::with_capacity(payloads.len());
        let mut malformed = 0;

        for payload in payloads {
            match ChangeEvent::from_payload(&payload) {
                Ok(event) => events.push(event),
                Err(e) => {
                    malformed += 1;
                    warn!(payload = %payload, error = %e, "Skipping malformed change event");
                },
            }
        }

        for event in events.iter().filter(|e| e.kind.is_unknown()) {
            warn!(kind = %event.kind, entity_id = event.entity_id, "Unknown entity kind, nothing to invalidate");
        }

        let invalidations = coalesce(events.iter().flat_map(Invalidation::for_event));
        let removed = self.apply(&invalidations).await;

        for event in &events {
            for handler in &self.handlers {
                handler(event);
            }
        }

        debug!(
            events = events.len(),
            invalidations = invalidations.len(),
            removed,
            "Processed notification burst"
        );

        self.advance_watermark(events.iter().map(|e| e.occurred_at).max())
            .await;
        self.state.record_events(events.len() as u64, malformed);
    }

    /// Invalidates whatever may have changed since the watermark.
    async fn catch_up(&mut self) {
        self.state.set_phase(ListenerPhase::CatchingUp);

        let since = self.watermark.as_ref().map(|wm| wm.last_processed_at);

        let (invalidations, latest) = match (since, &self.change_log) {
            (Some(since), Some(log)) => match log.changes_since(since).await {
                Ok(events) => {
                    let latest = events.iter().map(|e| e.occurred_at).max();
                    info!(
                        since = %since,
                        changes = events.len(),
                        "Catching up on missed changes"
                    );
                    (
                        coalesce(events.iter().flat_map(Invalidation::for_event)),
                        latest,
                    )
                },
                Err(e) => {
                    warn!(error = %e, "Change log unavailable, invalidating everything");
                    (vec![Invalidation::All], None)
                },
            },
            _ => {
                info!("No watermark or change log, invalidating everything");
                (vec![Invalidation::All], None)
            },
        };

        let removed = self.apply(&invalidations).await;
        info!(removed, "Catch-up invalidation complete");

        self.advance_watermark(latest).await;
        self.state.record_catch_up();
    }

    async fn apply(&self, invalidations: &[Invalidation]) -> u64 {
        let mut removed = 0;
        for invalidation in invalidations {
            removed += self.invalidator.apply(invalidation).await;
        }
        removed
    }

    async fn advance_watermark(&mut self, at: Option<DateTime<Utc>>) {
        let Some(at) = at else {
            return;
        };

        let changed = match &mut self.watermark {
            Some(wm) => {
                wm.last_channel.clone_from(&self.channel);
                wm.advance(at)
            },
            None => {
                self.watermark = Some(Watermark::new(at, &self.channel));
                true
            },
        };

        if !changed {
            return;
        }

        if let Some(wm) = &self.watermark {
            self.state.set_watermark(wm.clone());
            // Losing one save only widens the next catch-up window.
            if let Err(e) = self.watermarks.save(wm).await {
                warn!(error = %e, "Failed to persist watermark");
            }
        }
    }
}
