//! Entradas del cache y su expiracion.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use moka::Expiry;
use pricecache_core::CacheKey;
use serde::Serialize;
use serde_json::Value;

/// Origen del valor almacenado.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntrySource {
    /// Leido de la base de datos.
    Fresh,
    /// Valor estatico de respaldo.
    Fallback,
}

impl fmt::Display for EntrySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fresh => f.write_str("fresh"),
            Self::Fallback => f.write_str("fallback"),
        }
    }
}

/// Valor cacheado con su metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: Value,
    pub stored_at: DateTime<Utc>,
    pub ttl: Duration,
    pub source: EntrySource,
    created: Instant,
}

impl CacheEntry {
    pub fn new(value: Value, ttl: Duration, source: EntrySource) -> Self {
        Self {
            value,
            stored_at: Utc::now(),
            ttl,
            source,
            created: Instant::now(),
        }
    }

    /// Tiempo transcurrido desde que se escribio.
    pub fn age(&self) -> Duration {
        self.created.elapsed()
    }

    pub fn is_fallback(&self) -> bool {
        self.source == EntrySource::Fallback
    }
}

/// Politica de expiracion por entrada: cada valor vive su propio TTL.
pub(crate) struct EntryExpiry;

impl Expiry<CacheKey, Arc<CacheEntry>> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &CacheKey,
        value: &Arc<CacheEntry>,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &CacheKey,
        value: &Arc<CacheEntry>,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entry_metadata() {
        let entry = CacheEntry::new(json!({"id": 1}), Duration::from_secs(5), EntrySource::Fresh);

        assert!(!entry.is_fallback());
        assert!(entry.age() < Duration::from_secs(1));
        assert_eq!(entry.ttl, Duration::from_secs(5));
    }

    #[test]
    fn test_expiry_uses_entry_ttl() {
        let key = CacheKey::entity(pricecache_core::ProjectionKind::Test, 1, None);
        let entry = Arc::new(CacheEntry::new(
            Value::Null,
            Duration::from_millis(100),
            EntrySource::Fallback,
        ));

        let ttl = EntryExpiry.expire_after_create(&key, &entry, Instant::now());
        assert_eq!(ttl, Some(Duration::from_millis(100)));
        assert_eq!(EntrySource::Fallback.to_string(), "fallback");
    }
}
