//! Source contracts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pricecache_core::{CacheKey, ChangeEvent, ProjectionKind, Scope};
use serde_json::Value;

use crate::error::SyncError;

/// A read-only source of catalog projections.
///
/// The engine never writes catalog data. Every method issues read queries
/// keyed by entity id and price list id.
///
/// # Implementors
///
/// - `PgCatalogSource` - reads projections from Postgres
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Fetches the current projection for a key.
    ///
    /// A wildcard key (`test:27:*`) yields a JSON array with every entity of
    /// the category.
    ///
    /// # Errors
    ///
    /// - `SyncError::NotFound` if the entity does not exist in that scope
    /// - `SyncError::Query` / `SyncError::Connect` if the database fails
    async fn fetch(&self, key: &CacheKey) -> Result<Value, SyncError>;

    /// Enumerates every entity of a kind in one scope, for warm-up.
    async fn list_scope(
        &self,
        kind: ProjectionKind,
        scope: Scope,
    ) -> Result<Vec<(CacheKey, Value)>, SyncError>;

    /// Ids of the price lists currently in use.
    async fn active_price_lists(&self) -> Result<Vec<i64>, SyncError>;

    /// Verifies that the source answers queries.
    async fn health_check(&self) -> Result<(), SyncError>;

    /// Returns the name of this source, for logging.
    fn name(&self) -> &str;
}

/// Replays what changed while the listener was not connected.
///
/// The notification channel keeps no backlog, so after a reconnect the
/// listener asks the source directly.
#[async_trait]
pub trait ChangeLog: Send + Sync {
    /// Changes with `occurred_at` at or after `since`, oldest first.
    ///
    /// Rows written in one transaction share a timestamp, so the boundary is
    /// inclusive: some of them may not have been delivered before the
    /// watermark moved to it. Replaying the ones that were is harmless.
    async fn changes_since(&self, since: DateTime<Utc>) -> Result<Vec<ChangeEvent>, SyncError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pricecache_core::EntityKind;
    use serde_json::json;

    struct MockSource {
        name: String,
    }

    #[async_trait]
    impl CatalogSource for MockSource {
        async fn fetch(&self, key: &CacheKey) -> Result<Value, SyncError> {
            Ok(json!({ "key": key.to_string() }))
        }

        async fn list_scope(
            &self,
            kind: ProjectionKind,
            scope: Scope,
        ) -> Result<Vec<(CacheKey, Value)>, SyncError> {
            let key = CacheKey::entity(kind, 1, scope.price_list_id());
            Ok(vec![(key, json!({ "id": 1 }))])
        }

        async fn active_price_lists(&self) -> Result<Vec<i64>, SyncError> {
            Ok(vec![27])
        }

        async fn health_check(&self) -> Result<(), SyncError> {
            Ok(())
        }

        fn name(&self) -> &str {
            &self.name
        }
    }

    struct MockLog {
        events: Vec<ChangeEvent>,
    }

    #[async_trait]
    impl ChangeLog for MockLog {
        async fn changes_since(
            &self,
            since: DateTime<Utc>,
        ) -> Result<Vec<ChangeEvent>, SyncError> {
            Ok(self
                .events
                .iter()
                .filter(|e| e.occurred_at >= since)
                .cloned()
                .collect())
        }
    }

    #[tokio::test]
    async fn test_mock_source() {
        let source = MockSource {
            name: "mock".to_string(),
        };

        let key = CacheKey::entity(ProjectionKind::Test, 1001, Some(27));
        let value = source.fetch(&key).await.unwrap();
        assert_eq!(value["key"], "test:27:1001");

        let listed = source
            .list_scope(ProjectionKind::Test, Scope::PriceList(27))
            .await
            .unwrap();
        assert_eq!(listed[0].0.to_string(), "test:27:1");
        assert_eq!(source.name(), "mock");
        assert!(source.health_check().await.is_ok());
    }

    #[tokio::test]
    async fn test_change_log_includes_the_boundary() {
        let t0 = Utc::now();
        let log = MockLog {
            events: vec![
                ChangeEvent::new(EntityKind::Test, 1, t0 - chrono::Duration::seconds(1)),
                ChangeEvent::new(EntityKind::Test, 2, t0),
                ChangeEvent::new(EntityKind::Test, 3, t0 + chrono::Duration::seconds(1)),
            ],
        };

        let events = log.changes_since(t0).await.unwrap();
        let ids: Vec<i64> = events.iter().map(|e| e.entity_id).collect();
        assert_eq!(ids, vec![2, 3]);
    }
}
