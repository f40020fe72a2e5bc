//! Postgres-backed catalog source.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pricecache_core::{CacheKey, ChangeEvent, EntityKind, EntityRef, ProjectionKind, Scope};
use serde_json::Value;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::debug;

use super::{CatalogQueries, CatalogSource, ChangeLog};
use crate::error::SyncError;

/// Reads projections and change history from Postgres.
///
/// Query traffic goes through a regular pool. Notifications use their own
/// dedicated connection (see `PgNotificationConnector`), so a busy pool
/// never delays change delivery.
#[derive(Clone)]
pub struct PgCatalogSource {
    pool: PgPool,
    queries: CatalogQueries,
}

impl PgCatalogSource {
    /// Wraps an existing pool.
    pub fn new(pool: PgPool, queries: CatalogQueries) -> Self {
        Self { pool, queries }
    }

    /// Builds a lazily-connecting pool.
    ///
    /// Connections are opened on first use, so the service starts (and
    /// serves cached or fallback data) while the database is down.
    pub fn connect_lazy(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
        queries: CatalogQueries,
    ) -> Result<Self, SyncError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect_lazy(url)?;

        Ok(Self::new(pool, queries))
    }

    /// Returns the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn rows_for(&self, key: &CacheKey) -> Result<Vec<(i64, Value)>, SyncError> {
        let q = self.queries.for_kind(key.kind());

        let rows = match (key.scope(), key.entity_ref()) {
            (Scope::Default, EntityRef::Id(id)) => {
                sqlx::query_as::<_, (i64, Value)>(&q.by_id)
                    .bind(id)
                    .fetch_all(&self.pool)
                    .await?
            },
            (Scope::PriceList(pl), EntityRef::Id(id)) => {
                sqlx::query_as::<_, (i64, Value)>(&q.by_id_priced)
                    .bind(id)
                    .bind(pl)
                    .fetch_all(&self.pool)
                    .await?
            },
            (Scope::Default, EntityRef::All) => {
                sqlx::query_as::<_, (i64, Value)>(&q.all)
                    .fetch_all(&self.pool)
                    .await?
            },
            (Scope::PriceList(pl), EntityRef::All) => {
                sqlx::query_as::<_, (i64, Value)>(&q.all_priced)
                    .bind(pl)
                    .fetch_all(&self.pool)
                    .await?
            },
        };

        Ok(rows)
    }
}

#[async_trait]
impl CatalogSource for PgCatalogSource {
    async fn fetch(&self, key: &CacheKey) -> Result<Value, SyncError> {
        let rows = self.rows_for(key).await?;
        debug!(key = %key, rows = rows.len(), "Fetched projection");

        if key.is_wildcard() {
            return Ok(Value::Array(rows.into_iter().map(|(_, v)| v).collect()));
        }

        rows.into_iter()
            .next()
            .map(|(_, v)| v)
            .ok_or_else(|| SyncError::NotFound {
                key: key.to_string(),
            })
    }

    async fn list_scope(
        &self,
        kind: ProjectionKind,
        scope: Scope,
    ) -> Result<Vec<(CacheKey, Value)>, SyncError> {
        let sql = self.queries.list_for(kind, scope);

        let query = sqlx::query_as::<_, (i64, Value)>(sql);
        let query = match scope {
            Scope::Default => query,
            Scope::PriceList(pl) => query.bind(pl),
        };

        let rows = query.fetch_all(&self.pool).await?;

        Ok(rows
            .into_iter()
            .map(|(id, v)| (CacheKey::entity(kind, id, scope.price_list_id()), v))
            .collect())
    }

    async fn active_price_lists(&self) -> Result<Vec<i64>, SyncError> {
        let ids = sqlx::query_scalar::<_, i64>(&self.queries.active_price_lists)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    async fn health_check(&self) -> Result<(), SyncError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "postgres"
    }
}

#[async_trait]
impl ChangeLog for PgCatalogSource {
    async fn changes_since(&self, since: DateTime<Utc>) -> Result<Vec<ChangeEvent>, SyncError> {
        let rows = sqlx::query_as::<_, (String, i64, Option<i64>, DateTime<Utc>)>(
            &self.queries.changes_since,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(kind, entity_id, price_list_id, occurred_at)| ChangeEvent {
                kind: kind.parse::<EntityKind>().unwrap_or_else(|e| match e {}),
                entity_id,
                price_list_id,
                occurred_at,
            })
            .collect())
    }
}

impl std::fmt::Debug for PgCatalogSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgCatalogSource")
            .field("pool_size", &self.pool.size())
            .finish()
    }
}

