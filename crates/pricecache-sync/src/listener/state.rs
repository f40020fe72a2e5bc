//! Listener state tracking.

use std::fmt;

use chrono::{DateTime, Utc};
use pricecache_core::Watermark;
use serde::Serialize;
use tokio::sync::watch;

/// Where the listener is in its connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ListenerPhase {
    /// Opening the notification connection.
    Connecting,
    /// Invalidating what may have changed while disconnected.
    CatchingUp,
    /// Receiving notifications.
    Connected,
    /// Waiting before the next connection attempt.
    Backoff,
    /// Shut down.
    Stopped,
}

impl fmt::Display for ListenerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Connecting => "connecting",
            Self::CatchingUp => "catching_up",
            Self::Connected => "connected",
            Self::Backoff => "backoff",
            Self::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Point-in-time view of the listener, for operators.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListenerStatus {
    pub phase: ListenerPhase,
    pub channel: String,
    pub connected_since: Option<DateTime<Utc>>,
    /// Successful connects after the first one.
    pub reconnects: u64,
    /// Consecutive failed connection attempts.
    pub failure_count: u32,
    pub last_error: Option<String>,
    pub events_processed: u64,
    pub malformed_events: u64,
    pub catch_ups: u64,
    pub watermark: Option<Watermark>,
}

impl ListenerStatus {
    fn new(channel: &str) -> Self {
        Self {
            phase: ListenerPhase::Connecting,
            channel: channel.to_string(),
            connected_since: None,
            reconnects: 0,
            failure_count: 0,
            last_error: None,
            events_processed: 0,
            malformed_events: 0,
            catch_ups: 0,
            watermark: None,
        }
    }
}

/// Shared, observable listener state.
///
/// Every update is published on a watch channel, so readers never block
/// the listener loop and tests can await a particular transition.
#[derive(Debug)]
pub struct ListenerState {
    status: watch::Sender<ListenerStatus>,
}

impl ListenerState {
    pub fn new(channel: &str) -> Self {
        Self {
            status: watch::Sender::new(ListenerStatus::new(channel)),
        }
    }

    /// Returns a snapshot of the current status.
    pub fn snapshot(&self) -> ListenerStatus {
        self.status.borrow().clone()
    }

    pub fn phase(&self) -> ListenerPhase {
        self.status.borrow().phase
    }

    /// Returns true while notifications are being received.
    pub fn is_connected(&self) -> bool {
        self.phase() == ListenerPhase::Connected
    }

    /// Subscribes to status changes.
    pub fn subscribe(&self) -> watch::Receiver<ListenerStatus> {
        self.status.subscribe()
    }

    /// Waits until the status satisfies `predicate`.
    pub async fn wait_until<F>(&self, mut predicate: F) -> ListenerStatus
    where
        F: FnMut(&ListenerStatus) -> bool,
    {
        let mut rx = self.subscribe();
        match rx.wait_for(|s| predicate(s)).await {
            Ok(status) => status.clone(),
            // The sender lives in `self`, it cannot be dropped while borrowed.
            Err(_) => self.snapshot(),
        }
    }

    pub(crate) fn set_phase(&self, phase: ListenerPhase) {
        self.status.send_modify(|s| s.phase = phase);
    }

    pub(crate) fn record_connected(&self, first: bool) {
        self.status.send_modify(|s| {
            s.connected_since = Some(Utc::now());
            s.failure_count = 0;
            s.last_error = None;
            if !first {
                s.reconnects += 1;
            }
        });
    }

    pub(crate) fn record_failure(&self, error: impl Into<String>) {
        let error = error.into();
        self.status.send_modify(|s| {
            s.failure_count += 1;
            s.last_error = Some(error);
        });
    }

    pub(crate) fn record_disconnect(&self, reason: impl Into<String>) {
        let reason = reason.into();
        self.status.send_modify(|s| {
            s.connected_since = None;
            s.last_error = Some(reason);
        });
    }

    pub(crate) fn record_events(&self, processed: u64, malformed: u64) {
        self.status.send_modify(|s| {
            s.events_processed += processed;
            s.malformed_events += malformed;
        });
    }

    pub(crate) fn record_catch_up(&self) {
        self.status.send_modify(|s| s.catch_ups += 1);
    }

    pub(crate) fn set_watermark(&self, watermark: Watermark) {
        self.status.send_modify(|s| s.watermark = Some(watermark));
    }
}
