//! Cache module for the catalog projections.
//!
//! This module provides the cache layer using Moka, with per-entry TTL,
//! an optional LRU bound, glob pattern invalidation, a last-known-good
//! copy for degraded reads, and metrics.

pub mod catalog_cache;
pub mod entry;
pub mod invalidation;
pub mod sweeper;

// Re-exports
pub use catalog_cache::{CacheConfig, CacheError, CacheStats, CatalogCache};
pub use entry::{CacheEntry, EntrySource};
pub use invalidation::{InvalidationResult, parse_pattern};
pub use sweeper::{CacheSweeper, SweeperHandle};
