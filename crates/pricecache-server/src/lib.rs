//! Pricecache Server
//!
//! Serves catalog projections from an in-process cache kept in step with
//! the database by the notification listener.
//!
//! - `cache`: the moka-backed store with pattern invalidation and the
//!   stale copy used when the database fails
//! - `gateway`: the cache-aside read path with single-flight recompute,
//!   retries and the stale / fallback chain
//! - `warmup`: pre-population after startup or a flush
//! - `handlers`, `middleware`, `server`: the axum HTTP surface
//! - `settings`: layered configuration

pub mod cache;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod server;
pub mod settings;
pub mod state;
pub mod warmup;

pub use cache::{CacheConfig, CatalogCache, EntrySource};
pub use error::AppError;
pub use gateway::{FallbackRegistry, Gateway, GatewayConfig, GatewayError, ResolveSource, Resolved};
pub use server::{create_router, run_server, shutdown_signal};
pub use settings::{LogFormat, Settings, SettingsError};
pub use state::AppState;
pub use warmup::{WarmUpCoordinator, WarmUpReport};

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
