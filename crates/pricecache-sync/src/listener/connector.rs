//! Notification connection contracts and the Postgres implementation.

use async_trait::async_trait;
use sqlx::postgres::PgListener;
use tracing::{debug, info};

use crate::error::SyncError;

/// A live subscription delivering raw payloads.
#[async_trait]
pub trait NotificationConnection: Send {
    /// Waits for the next payload.
    ///
    /// `Ok(None)` means the connection was lost. The listener then drops
    /// this connection and goes through backoff and catch-up.
    async fn recv(&mut self) -> Result<Option<String>, SyncError>;

    /// Payloads that already arrived, without waiting. Used to coalesce
    /// bursts; the default buffers nothing.
    fn drain_buffered(&mut self, _limit: usize) -> Vec<String> {
        Vec::new()
    }
}

/// Opens subscriptions on a named channel.
#[async_trait]
pub trait NotificationConnector: Send + Sync {
    /// Opens a dedicated connection subscribed to `channel`.
    ///
    /// # Errors
    ///
    /// - `SyncError::Connect` if the database is unreachable
    /// - `SyncError::Subscribe` if `LISTEN` is rejected
    async fn connect(&self, channel: &str)
    -> Result<Box<dyn NotificationConnection>, SyncError>;
}

/// Connects with `PgListener`, which owns a connection outside any query
/// pool.
#[derive(Clone)]
pub struct PgNotificationConnector {
    url: String,
}

impl PgNotificationConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl std::fmt::Debug for PgNotificationConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The URL may embed credentials.
        f.debug_struct("PgNotificationConnector").finish_non_exhaustive()
    }
}

#[async_trait]
impl NotificationConnector for PgNotificationConnector {
    async fn connect(
        &self,
        channel: &str,
    ) -> Result<Box<dyn NotificationConnection>, SyncError> {
        let mut listener = PgListener::connect(&self.url).await?;

        listener
            .listen(channel)
            .await
            .map_err(|e| SyncError::Subscribe {
                channel: channel.to_string(),
                reason: e.to_string(),
            })?;

        info!(channel = %channel, "Subscribed to notification channel");

        Ok(Box::new(PgConnection { listener }))
    }
}

struct PgConnection {
    listener: PgListener,
}

#[async_trait]
impl NotificationConnection for PgConnection {
    async fn recv(&mut self) -> Result<Option<String>, SyncError> {
        // `try_recv` reports a lost connection as `None` instead of silently
        // reconnecting, which would skip the catch-up.
        match self.listener.try_recv().await? {
            Some(notification) => {
                debug!(channel = %notification.channel(), "Notification received");
                Ok(Some(notification.payload().to_string()))
            },
            None => Ok(None),
        }
    }

    fn drain_buffered(&mut self, limit: usize) -> Vec<String> {
        let mut out = Vec::new();
        while out.len() < limit {
            match self.listener.next_buffered() {
                Some(notification) => out.push(notification.payload().to_string()),
                None => break,
            }
        }
        out
    }
}
