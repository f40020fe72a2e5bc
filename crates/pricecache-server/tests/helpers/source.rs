//! In-memory catalog source.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use pricecache_core::{CacheKey, ChangeEvent, EntityRef, ProjectionKind, Scope};
use pricecache_sync::{CatalogSource, ChangeLog, SyncError};
use serde_json::{Value, json};

/// Catalog held in a map, with a switch that makes every query fail.
#[derive(Default)]
pub struct StubSource {
    rows: Mutex<HashMap<(ProjectionKind, Option<i64>, i64), Value>>,
    changes: Mutex<Vec<ChangeEvent>>,
    failing: AtomicBool,
    fetches: AtomicU32,
    list_delay: Mutex<Duration>,
}

impl StubSource {
    /// Tests 1001 and 1002 priced in lists 27 and 31, group 3 in list 27,
    /// plus unpriced test 1001.
    pub fn seeded() -> Self {
        let source = Self::default();
        for pl in [27, 31] {
            for id in [1001, 1002] {
                source.put(ProjectionKind::Test, id, Some(pl), json!({ "id": id, "price": pl * 10 }));
            }
        }
        source.put(ProjectionKind::TestGroup, 3, Some(27), json!({ "id": 3, "price": 99 }));
        source.put(ProjectionKind::Test, 1001, None, json!({ "id": 1001, "name": "Hemograma" }));
        source
    }

    pub fn put(&self, kind: ProjectionKind, id: i64, price_list_id: Option<i64>, value: Value) {
        self.rows.lock().insert((kind, price_list_id, id), value);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Makes every `list_scope` call take at least `delay`.
    pub fn set_list_delay(&self, delay: Duration) {
        *self.list_delay.lock() = delay;
    }

    pub fn fetch_count(&self) -> u32 {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn record_change(&self, event: ChangeEvent) {
        self.changes.lock().push(event);
    }

    fn check(&self) -> Result<(), SyncError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SyncError::query("database is down"));
        }
        Ok(())
    }

    /// Ordered by entity id.
    fn scope_rows(&self, kind: ProjectionKind, price_list_id: Option<i64>) -> Vec<(i64, Value)> {
        let mut rows: Vec<(i64, Value)> = self
            .rows
            .lock()
            .iter()
            .filter(|((k, pl, _), _)| *k == kind && *pl == price_list_id)
            .map(|((_, _, id), v)| (*id, v.clone()))
            .collect();
        rows.sort_by_key(|(id, _)| *id);
        rows
    }
}

#[async_trait]
impl CatalogSource for StubSource {
    async fn fetch(&self, key: &CacheKey) -> Result<Value, SyncError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.check()?;

        let pl = key.scope().price_list_id();
        match key.entity_ref() {
            EntityRef::All => Ok(Value::Array(
                self.scope_rows(key.kind(), pl)
                    .into_iter()
                    .map(|(_, v)| v)
                    .collect(),
            )),
            EntityRef::Id(id) => self
                .rows
                .lock()
                .get(&(key.kind(), pl, id))
                .cloned()
                .ok_or_else(|| SyncError::NotFound {
                    key: key.to_string(),
                }),
        }
    }

    async fn list_scope(
        &self,
        kind: ProjectionKind,
        scope: Scope,
    ) -> Result<Vec<(CacheKey, Value)>, SyncError> {
        let delay = *self.list_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.check()?;
        let pl = scope.price_list_id();
        Ok(self
            .scope_rows(kind, pl)
            .into_iter()
            .map(|(id, v)| (CacheKey::entity(kind, id, pl), v))
            .collect())
    }

    async fn active_price_lists(&self) -> Result<Vec<i64>, SyncError> {
        self.check()?;
        let mut ids: Vec<i64> = self.rows.lock().keys().filter_map(|(_, pl, _)| *pl).collect();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }

    async fn health_check(&self) -> Result<(), SyncError> {
        self.check()
    }

    fn name(&self) -> &str {
        "stub"
    }
}

#[async_trait]
impl ChangeLog for StubSource {
    async fn changes_since(&self, since: DateTime<Utc>) -> Result<Vec<ChangeEvent>, SyncError> {
        self.check()?;
        Ok(self
            .changes
            .lock()
            .iter()
            .filter(|e| e.occurred_at >= since)
            .cloned()
            .collect())
    }
}
