//! Cache warm-up.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use pricecache_core::{CacheKey, ProjectionKind, Scope};
use pricecache_sync::{CatalogSource, SyncError};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use crate::cache::{CatalogCache, EntrySource};

#[derive(Debug, Error)]
pub enum WarmUpError {
    #[error("a warm-up is already running")]
    AlreadyRunning,
}

/// A failure confined to one scope (or to listing the scopes).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeError {
    /// `None` when the list of active price lists could not be read.
    pub scope_id: Option<i64>,
    pub kind: Option<ProjectionKind>,
    pub error: String,
}

/// Outcome of a warm-up run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WarmUpReport {
    pub started_at: DateTime<Utc>,
    pub scopes: Vec<i64>,
    pub entries_written: u64,
    pub errors: Vec<ScopeError>,
    pub duration_ms: u64,
}

impl WarmUpReport {
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Pre-populates the cache, scope by scope.
///
/// Values are written straight into the cache without going through the
/// gateway's single-flight path. A failing scope is reported and the run
/// moves on to the next one.
#[derive(Clone)]
pub struct WarmUpCoordinator {
    source: Arc<dyn CatalogSource>,
    cache: CatalogCache,
    running: Arc<Mutex<()>>,
}

impl WarmUpCoordinator {
    pub fn new(source: Arc<dyn CatalogSource>, cache: CatalogCache) -> Self {
        Self {
            source,
            cache,
            running: Arc::new(Mutex::new(())),
        }
    }

    /// Warms the given price lists, or every active one when `scope_ids`
    /// is empty.
    #[instrument(skip_all, fields(requested = scope_ids.len()))]
    pub async fn warm_up(&self, scope_ids: &[i64]) -> Result<WarmUpReport, WarmUpError> {
        let Ok(_guard) = self.running.try_lock() else {
            return Err(WarmUpError::AlreadyRunning);
        };

        let started_at = Utc::now();
        let start = Instant::now();
        let mut errors = Vec::new();

        let scopes = if scope_ids.is_empty() {
            match self.source.active_price_lists().await {
                Ok(ids) => ids,
                Err(e) => {
                    warn!(error = %e, "Could not list active price lists");
                    errors.push(ScopeError {
                        scope_id: None,
                        kind: None,
                        error: e.to_string(),
                    });
                    Vec::new()
                },
            }
        } else {
            scope_ids.to_vec()
        };

        let mut entries_written = 0;
        for &scope_id in &scopes {
            for kind in ProjectionKind::ALL {
                match self.warm_scope(kind, scope_id).await {
                    Ok(written) => entries_written += written,
                    Err(e) => {
                        warn!(scope_id, kind = %kind, error = %e, "Warm-up of scope failed");
                        errors.push(ScopeError {
                            scope_id: Some(scope_id),
                            kind: Some(kind),
                            error: e.to_string(),
                        });
                    },
                }
            }
        }

        let report = WarmUpReport {
            started_at,
            scopes,
            entries_written,
            errors,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            scopes = report.scopes.len(),
            entries = report.entries_written,
            errors = report.errors.len(),
            duration_ms = report.duration_ms,
            "Warm-up finished"
        );

        Ok(report)
    }

    /// Runs a warm-up in the background. Startup does not wait for it.
    pub fn spawn(&self, scope_ids: Vec<i64>) -> JoinHandle<()> {
        let coordinator = self.clone();
        tokio::spawn(async move {
            if let Err(e) = coordinator.warm_up(&scope_ids).await {
                warn!(error = %e, "Background warm-up skipped");
            }
        })
    }

    /// Writes every entity of one kind in one price list, then the list key.
    ///
    /// Rows read before an invalidation that lands during the listing are
    /// not written.
    async fn warm_scope(&self, kind: ProjectionKind, scope_id: i64) -> Result<u64, SyncError> {
        let since = self.cache.epoch();
        let rows = self
            .source
            .list_scope(kind, Scope::PriceList(scope_id))
            .await?;

        let ttl = self.cache.ttl();
        let mut written = 0;
        let mut list = Vec::with_capacity(rows.len());

        for (key, value) in rows {
            list.push(value.clone());
            if self
                .cache
                .set_since(key, value, ttl, EntrySource::Fresh, since)
                .await
            {
                written += 1;
            }
        }

        let list_key = CacheKey::all(kind, Some(scope_id));
        if self
            .cache
            .set_since(list_key, Value::Array(list), ttl, EntrySource::Fresh, since)
            .await
        {
            written += 1;
        }

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use async_trait::async_trait;
    use serde_json::json;

    /// Two tests per price list; price list 13 is broken.
    struct ScopedSource;

    #[async_trait]
    impl CatalogSource for ScopedSource {
        async fn fetch(&self, key: &CacheKey) -> Result<Value, SyncError> {
            Err(SyncError::NotFound {
                key: key.to_string(),
            })
        }

        async fn list_scope(
            &self,
            kind: ProjectionKind,
            scope: Scope,
        ) -> Result<Vec<(CacheKey, Value)>, SyncError> {
            let pl = scope.price_list_id();
            if pl == Some(13) {
                return Err(SyncError::query("relation does not exist"));
            }
            if kind == ProjectionKind::TestGroup {
                return Ok(Vec::new());
            }
            Ok((1..=2)
                .map(|id| (CacheKey::entity(kind, id, pl), json!({ "id": id })))
                .collect())
        }

        async fn active_price_lists(&self) -> Result<Vec<i64>, SyncError> {
            Ok(vec![27, 31])
        }

        async fn health_check(&self) -> Result<(), SyncError> {
            Ok(())
        }

        fn name(&self) -> &str {
            "scoped"
        }
    }

    fn coordinator() -> (WarmUpCoordinator, CatalogCache) {
        let cache = CatalogCache::new(CacheConfig::default());
        (
            WarmUpCoordinator::new(Arc::new(ScopedSource), cache.clone()),
            cache,
        )
    }

    #[tokio::test]
    async fn test_warm_up_explicit_scopes() {
        let (coordinator, cache) = coordinator();

        let report = coordinator.warm_up(&[27]).await.unwrap();

        // 2 tests + test list + empty test_group list
        assert_eq!(report.entries_written, 4);
        assert!(report.is_complete());
        assert!(
            cache
                .get(&CacheKey::entity(ProjectionKind::Test, 2, Some(27)))
                .await
                .is_some()
        );
        let list = cache
            .get(&CacheKey::all(ProjectionKind::Test, Some(27)))
            .await
            .unwrap();
        assert_eq!(list.value, json!([{"id": 1}, {"id": 2}]));
    }

    #[tokio::test]
    async fn test_warm_up_defaults_to_active_price_lists() {
        let (coordinator, _cache) = coordinator();

        let report = coordinator.warm_up(&[]).await.unwrap();

        assert_eq!(report.scopes, vec![27, 31]);
        assert_eq!(report.entries_written, 8);
    }

    #[tokio::test]
    async fn test_failing_scope_is_reported_and_others_continue() {
        let (coordinator, cache) = coordinator();

        let report = coordinator.warm_up(&[13, 27]).await.unwrap();

        assert_eq!(report.errors.len(), 2);
        assert!(report.errors.iter().all(|e| e.scope_id == Some(13)));
        assert_eq!(report.entries_written, 4);
        assert!(
            cache
                .get(&CacheKey::entity(ProjectionKind::Test, 1, Some(27)))
                .await
                .is_some()
        );
    }

    /// Lists one test, while a change for that price list is invalidated.
    struct RacingSource {
        cache: CatalogCache,
    }

    #[async_trait]
    impl CatalogSource for RacingSource {
        async fn fetch(&self, key: &CacheKey) -> Result<Value, SyncError> {
            Err(SyncError::NotFound {
                key: key.to_string(),
            })
        }

        async fn list_scope(
            &self,
            kind: ProjectionKind,
            scope: Scope,
        ) -> Result<Vec<(CacheKey, Value)>, SyncError> {
            let pl = scope.price_list_id();
            let rows = vec![(CacheKey::entity(kind, 1, pl), json!({ "price": 250 }))];
            self.cache.invalidate_by_pattern("*:27:*").await;
            Ok(rows)
        }

        async fn active_price_lists(&self) -> Result<Vec<i64>, SyncError> {
            Ok(vec![27])
        }

        async fn health_check(&self) -> Result<(), SyncError> {
            Ok(())
        }

        fn name(&self) -> &str {
            "racing"
        }
    }

    #[tokio::test]
    async fn test_rows_read_before_an_invalidation_are_not_written() {
        let cache = CatalogCache::new(CacheConfig::default());
        let coordinator = WarmUpCoordinator::new(
            Arc::new(RacingSource {
                cache: cache.clone(),
            }),
            cache.clone(),
        );

        let report = coordinator.warm_up(&[27]).await.unwrap();

        assert_eq!(report.entries_written, 0);
        assert!(report.is_complete());
        assert!(
            cache
                .get(&CacheKey::entity(ProjectionKind::Test, 1, Some(27)))
                .await
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_concurrent_warm_up_is_rejected() {
        let (coordinator, _cache) = coordinator();
        let _guard = coordinator.running.lock().await;

        let result = coordinator.warm_up(&[27]).await;
        assert!(matches!(result, Err(WarmUpError::AlreadyRunning)));
    }
}
