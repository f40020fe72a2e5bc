//! Metrics module for the pricecache server.

pub mod cache;
pub mod http;
pub mod listener;
pub mod resolve;
pub mod setup;

pub use cache::CacheMetrics;
pub use setup::init_metrics;
