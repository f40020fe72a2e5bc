//! Cache invalidation seam used by the listener.

use async_trait::async_trait;
use pricecache_core::{CacheKey, Invalidation};

/// Something that can drop cached projections.
///
/// Implementations must make every method idempotent: removing an absent
/// key is a no-op. Return values are the number of entries removed.
#[async_trait]
pub trait CacheInvalidator: Send + Sync {
    /// Removes exactly one key.
    async fn invalidate_key(&self, key: &CacheKey) -> u64;

    /// Removes every key matching the glob pattern.
    async fn invalidate_pattern(&self, pattern: &str) -> u64;

    /// Removes every cached projection.
    async fn invalidate_all(&self) -> u64;

    /// Applies a translated invalidation.
    async fn apply(&self, invalidation: &Invalidation) -> u64 {
        match invalidation {
            Invalidation::Key(key) => self.invalidate_key(key).await,
            Invalidation::Pattern(pattern) => self.invalidate_pattern(pattern).await,
            Invalidation::All => self.invalidate_all().await,
        }
    }
}
