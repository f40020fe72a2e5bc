//! In-process notifier.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::connector::{NotificationConnection, NotificationConnector};
use crate::error::SyncError;

/// A notification channel living inside the process.
///
/// Behaves like the database channel: payloads reach only the connections
/// open at publish time and there is no backlog. Used when the engine is
/// embedded next to the writer, and to drive the listener in tests
/// (`disconnect_all` and `set_available` reproduce outages).
#[derive(Clone)]
pub struct ChannelNotifier {
    inner: Arc<Mutex<Inner>>,
}

struct Inner {
    subscribers: Vec<(String, mpsc::UnboundedSender<String>)>,
    available: bool,
    connects: u64,
}

impl ChannelNotifier {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                subscribers: Vec::new(),
                available: true,
                connects: 0,
            })),
        }
    }

    /// Publishes a payload on a channel. Returns how many connections got it.
    pub fn publish(&self, channel: &str, payload: impl Into<String>) -> usize {
        let payload = payload.into();
        let mut inner = self.inner.lock();

        inner.subscribers.retain(|(_, tx)| !tx.is_closed());

        let mut delivered = 0;
        for (_, tx) in inner.subscribers.iter().filter(|(ch, _)| ch == channel) {
            if tx.send(payload.clone()).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    /// Drops every open connection. Their `recv` returns `None`.
    pub fn disconnect_all(&self) {
        self.inner.lock().subscribers.clear();
    }

    /// When unavailable, `connect` fails.
    pub fn set_available(&self, available: bool) {
        self.inner.lock().available = available;
    }

    /// Number of successful connects so far.
    pub fn connect_count(&self) -> u64 {
        self.inner.lock().connects
    }

    /// Number of currently open connections.
    pub fn subscriber_count(&self) -> usize {
        let mut inner = self.inner.lock();
        inner.subscribers.retain(|(_, tx)| !tx.is_closed());
        inner.subscribers.len()
    }
}

impl Default for ChannelNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationConnector for ChannelNotifier {
    async fn connect(
        &self,
        channel: &str,
    ) -> Result<Box<dyn NotificationConnection>, SyncError> {
        let mut inner = self.inner.lock();
        if !inner.available {
            return Err(SyncError::connect("notifier unavailable"));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        inner.subscribers.push((channel.to_string(), tx));
        inner.connects += 1;

        Ok(Box::new(ChannelConnection { rx }))
    }
}

struct ChannelConnection {
    rx: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
impl NotificationConnection for ChannelConnection {
    async fn recv(&mut self) -> Result<Option<String>, SyncError> {
        Ok(self.rx.recv().await)
    }

    fn drain_buffered(&mut self, limit: usize) -> Vec<String> {
        let mut out = Vec::new();
        while out.len() < limit {
            match self.rx.try_recv() {
                Ok(payload) => out.push(payload),
                Err(_) => break,
            }
        }
        out
    }
}
