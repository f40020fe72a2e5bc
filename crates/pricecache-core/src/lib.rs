//! Pricecache Core - Domain types
//!
//! This crate provides the foundational types shared by the listener and the
//! server: change events as they arrive from the database, the cache key
//! scheme, the translation from events to invalidations, the durable
//! watermark and the backoff policy used by every retry loop.

pub mod backoff;
pub mod error;
pub mod event;
pub mod invalidation;
pub mod key;
pub mod watermark;

pub use backoff::Backoff;
pub use error::{CoreError, Result};
pub use event::{ChangeEvent, EntityKind};
pub use invalidation::{Invalidation, coalesce};
pub use key::{CacheKey, EntityRef, ProjectionKind, Scope};
pub use watermark::Watermark;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_semver() {
        let v = version();
        assert_eq!(v.split('.').count(), 3, "Version should be semver");
    }
}
