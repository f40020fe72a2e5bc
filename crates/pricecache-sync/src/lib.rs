//! # Pricecache Sync
//!
//! Keeps the catalog cache in step with the database.
//!
//! This crate owns everything that talks to the authoritative store:
//!
//! - Read-only source contracts (`CatalogSource`, `ChangeLog`) with a
//!   Postgres implementation over `sqlx`
//! - A notification listener holding a dedicated `LISTEN` connection,
//!   reconnecting with exponential backoff and running a catch-up
//!   invalidation after every (re)connect
//! - Durable watermark stores so a restart never silently skips changes
//!
//! The cache itself is reached through the `CacheInvalidator` trait, so the
//! listener does not depend on any particular cache implementation.
//!
//! ## Example
//!
//! ```ignore
//! use pricecache_sync::{ListenerConfig, NotificationListener, PgNotificationConnector};
//!
//! let connector = Arc::new(PgNotificationConnector::new(&database_url));
//! let listener = NotificationListener::new(connector, cache, watermarks, ListenerConfig::default())
//!     .with_change_log(source);
//!
//! let handle = listener.start("catalog_changes").await;
//! ```

pub mod error;
pub mod invalidator;
pub mod listener;
pub mod source;
pub mod watermark;

// Re-exports
pub use error::SyncError;
pub use invalidator::CacheInvalidator;
pub use listener::{
    ChannelNotifier, ListenerConfig, ListenerHandle, ListenerPhase, ListenerState,
    ListenerStatus, NotificationConnection, NotificationConnector, NotificationListener,
    PgNotificationConnector,
};
pub use source::{CatalogQueries, CatalogSource, ChangeLog, PgCatalogSource, ProjectionQueries};
pub use watermark::{FileWatermarkStore, MemoryWatermarkStore, WatermarkStore};

// Re-export pricecache_core for consumers
pub use pricecache_core;
