//! Change-notification listener.
//!
//! Holds a subscription to the database channel and turns incoming change
//! events into cache invalidations. The connection lifecycle is an explicit
//! state machine: `connecting → catching_up → connected`, dropping to
//! `backoff` whenever the connection is lost.

mod channel;
mod connector;
mod runner;
mod state;

pub use channel::ChannelNotifier;
pub use connector::{NotificationConnection, NotificationConnector, PgNotificationConnector};
pub use runner::{EventHandler, ListenerConfig, ListenerHandle, NotificationListener};
pub use state::{ListenerPhase, ListenerState, ListenerStatus};
