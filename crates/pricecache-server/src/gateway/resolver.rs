//! Cache-aside read path.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use pricecache_core::{Backoff, CacheKey};
use pricecache_sync::SyncError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, warn};

use super::error::GatewayError;
use super::fallback::FallbackRegistry;
use crate::cache::{CatalogCache, EntrySource};
use crate::metrics::resolve::record_resolution;

/// Where a resolved value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveSource {
    /// Served from the cache.
    Cache,
    /// Recomputed from the source just now.
    Fresh,
    /// Last known good value, the source is failing.
    Stale,
    /// Static value registered for the kind.
    Fallback,
    /// Nothing usable.
    None,
}

impl ResolveSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cache => "cache",
            Self::Fresh => "fresh",
            Self::Stale => "stale",
            Self::Fallback => "fallback",
            Self::None => "none",
        }
    }

    /// True when the value may not reflect the current database state.
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Stale | Self::Fallback)
    }
}

impl fmt::Display for ResolveSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value together with its provenance.
#[derive(Debug, Clone)]
pub struct Resolved<T> {
    pub value: T,
    pub source: ResolveSource,
}

/// Read path configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Recompute attempts per resolve, including the first one.
    pub max_attempts: u32,
    /// Delay between attempts.
    pub backoff: Backoff,
    /// Deadline for a single recompute attempt.
    pub recompute_timeout: Duration,
    /// How long a fallback value is cached before the source is tried again.
    pub fallback_ttl: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::new(Duration::from_millis(50), Duration::from_secs(1)),
            recompute_timeout: Duration::from_secs(2),
            fallback_ttl: Duration::from_secs(30),
        }
    }
}

/// Cache-aside gateway in front of the catalog source.
///
/// On a hit the cached value is returned. On a miss exactly one caller per
/// key recomputes, with retries and a per-attempt deadline, while the
/// others wait for its result. When the recompute fails the gateway
/// degrades, in order, to the last known good value, to the static fallback
/// of the key's kind, and finally to an error.
#[derive(Clone)]
pub struct Gateway {
    cache: CatalogCache,
    fallbacks: Arc<FallbackRegistry>,
    config: GatewayConfig,
}

impl Gateway {
    pub fn new(cache: CatalogCache, config: GatewayConfig) -> Self {
        Self {
            cache,
            fallbacks: Arc::new(FallbackRegistry::new()),
            config,
        }
    }

    pub fn with_fallbacks(mut self, fallbacks: FallbackRegistry) -> Self {
        self.fallbacks = Arc::new(fallbacks);
        self
    }

    pub fn cache(&self) -> &CatalogCache {
        &self.cache
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Resolves a key to its JSON projection.
    ///
    /// `recompute` is called once per attempt and must read the current
    /// value from the source.
    pub async fn resolve<F, Fut>(
        &self,
        key: CacheKey,
        recompute: F,
    ) -> Result<Resolved<Value>, GatewayError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<Value, SyncError>>,
    {
        self.resolve_as(key, recompute).await
    }

    /// Resolves a key and decodes it as `T`.
    ///
    /// A cached value that does not decode is evicted and recomputed.
    pub async fn resolve_as<T, F, Fut>(
        &self,
        key: CacheKey,
        recompute: F,
    ) -> Result<Resolved<T>, GatewayError>
    where
        T: DeserializeOwned,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<Value, SyncError>>,
    {
        let start = Instant::now();
        let result = self.lookup(key, &recompute).await;

        let source = match &result {
            Ok(resolved) => resolved.source,
            Err(_) => ResolveSource::None,
        };
        record_resolution(source, start.elapsed());

        result
    }

    async fn lookup<T, F, Fut>(&self, key: CacheKey, recompute: &F) -> Result<Resolved<T>, GatewayError>
    where
        T: DeserializeOwned,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<Value, SyncError>>,
    {
        if let Some((value, origin)) = self.cache.get_as::<T>(&key).await {
            let source = match origin {
                EntrySource::Fresh => ResolveSource::Cache,
                EntrySource::Fallback => ResolveSource::Fallback,
            };
            return Ok(Resolved { value, source });
        }

        let outcome = self
            .cache
            .get_or_try_insert_with(key, self.recompute_with_retry(&key, recompute))
            .await;

        let failure = match outcome {
            Ok((entry, inserted)) => match T::deserialize(&entry.value) {
                Ok(value) => {
                    let source = if entry.is_fallback() {
                        ResolveSource::Fallback
                    } else {
                        ResolveSource::Fresh
                    };
                    debug!(key = %key, inserted, "Resolved on miss");
                    return Ok(Resolved { value, source });
                },
                Err(e) => {
                    self.cache.invalidate(&key).await;
                    GatewayError::decode(&key, e)
                },
            },
            Err(failure) => failure,
        };

        if failure.is_not_found() {
            return Err(failure);
        }

        self.degrade(key, failure).await
    }

    /// Runs `recompute` until it succeeds, the error is permanent, or the
    /// attempts run out.
    async fn recompute_with_retry<F, Fut>(
        &self,
        key: &CacheKey,
        recompute: &F,
    ) -> Result<Value, GatewayError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<Value, SyncError>>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            let result = match timeout(self.config.recompute_timeout, recompute()).await {
                Ok(result) => result,
                Err(_) => Err(SyncError::timeout(self.config.recompute_timeout)),
            };

            match result {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    let delay = self.config.backoff.delay(attempt - 1);
                    warn!(
                        key = %key,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Recompute failed, retrying"
                    );
                    sleep(delay).await;
                },
                Err(e) => return Err(GatewayError::from_source(key, attempt, e)),
            }
        }
    }

    /// Stale, then fallback, then the error.
    async fn degrade<T: DeserializeOwned>(
        &self,
        key: CacheKey,
        failure: GatewayError,
    ) -> Result<Resolved<T>, GatewayError> {
        if let Some(entry) = self.cache.get_stale(&key).await
            && let Ok(value) = T::deserialize(&entry.value)
        {
            warn!(
                key = %key,
                age_ms = entry.age().as_millis() as u64,
                error = %failure,
                "Serving stale value"
            );
            return Ok(Resolved {
                value,
                source: ResolveSource::Stale,
            });
        }

        if let Some(fallback) = self.fallbacks.get(key.kind())
            && let Ok(value) = T::deserialize(fallback)
        {
            warn!(key = %key, error = %failure, "Serving static fallback");
            self.cache
                .set(
                    key,
                    fallback.clone(),
                    self.config.fallback_ttl,
                    EntrySource::Fallback,
                )
                .await;
            return Ok(Resolved {
                value,
                source: ResolveSource::Fallback,
            });
        }

        error!(key = %key, error = %failure, "No usable value");
        Err(failure)
    }
}
