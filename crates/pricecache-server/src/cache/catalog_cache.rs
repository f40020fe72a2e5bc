//! Catalog cache using Moka.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use moka::future::Cache;
use moka::notification::RemovalCause;
use moka::ops::compute::{CompResult, Op};
use moka::policy::EvictionPolicy;
use pricecache_core::CacheKey;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use super::entry::{CacheEntry, EntryExpiry, EntrySource};
use crate::metrics::CacheMetrics;

/// Error del sistema de cache
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

/// Configuracion del cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL de las entradas frescas (default: 5 minutos)
    pub ttl: Duration,
    /// Cuanto se conserva el ultimo valor bueno tras una invalidacion (default: 1 hora)
    pub stale_ttl: Duration,
    /// Maximo numero de entries, LRU al superarlo (default: 10000)
    pub max_capacity: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            stale_ttl: Duration::from_secs(3600),
            max_capacity: Some(10_000),
        }
    }
}

/// Resultado interno de una carga con `or_try_insert_with`.
enum Load<E> {
    Failed(E),
    /// Hubo una invalidacion mientras se calculaba; el valor no se cachea.
    Superseded(Arc<CacheEntry>),
}

/// Snapshot de las estadisticas del cache.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub entries: u64,
    pub stale_entries: u64,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub invalidations: u64,
    pub evictions: u64,
    pub max_capacity: Option<u64>,
    pub ttl_ms: u64,
}

/// Cache de proyecciones del catalogo.
///
/// Mantiene dos almacenes:
/// - `fresh`: lo que se sirve como hit. Cada entrada expira segun su propio
///   TTL y las invalidaciones borran de aqui.
/// - `stale`: el ultimo valor leido de la base por key, retenido `stale_ttl`.
///   Las invalidaciones no lo tocan; el gateway lo usa cuando el recompute
///   falla.
///
/// Cada invalidacion incrementa un epoch global. Una escritura calculada
/// antes de una invalidacion se descarta si el epoch cambio mientras tanto,
/// asi un valor leido antes de un cambio nunca sobrevive a su invalidacion.
///
/// Clonar es barato, los clones comparten almacenamiento.
///
/// # Examples
///
/// ```no_run
/// use pricecache_core::{CacheKey, ProjectionKind};
/// use pricecache_server::cache::{CacheConfig, CatalogCache, EntrySource};
/// use serde_json::json;
///
/// # #[tokio::main]
/// # async fn main() {
/// let cache = CatalogCache::new(CacheConfig::default());
/// let key = CacheKey::entity(ProjectionKind::Test, 1001, Some(27));
///
/// cache.set(key, json!({"price": 12.5}), cache.ttl(), EntrySource::Fresh).await;
/// if let Some(entry) = cache.get(&key).await {
///     println!("Cache hit: {}", entry.value);
/// }
/// # }
/// ```
#[derive(Clone)]
pub struct CatalogCache {
    fresh: Cache<CacheKey, Arc<CacheEntry>>,
    stale: Cache<CacheKey, Arc<CacheEntry>>,
    epoch: Arc<AtomicU64>,
    config: CacheConfig,
    metrics: CacheMetrics,
}

impl CatalogCache {
    /// Crea un nuevo cache con la configuracion dada.
    pub fn new(config: CacheConfig) -> Self {
        let metrics = CacheMetrics::new();

        let mut fresh = Cache::builder()
            .expire_after(EntryExpiry)
            .eviction_policy(EvictionPolicy::lru());
        let mut stale = Cache::builder()
            .time_to_live(config.stale_ttl)
            .eviction_policy(EvictionPolicy::lru());

        if let Some(capacity) = config.max_capacity {
            fresh = fresh.max_capacity(capacity);
            stale = stale.max_capacity(capacity);
        }

        // Configurar listener para evictions
        let eviction_metrics = metrics.clone();
        fresh = fresh.eviction_listener(move |_key, _value, cause| {
            let reason = match cause {
                RemovalCause::Expired => "ttl",
                RemovalCause::Size => "capacity",
                RemovalCause::Explicit => "manual",
                RemovalCause::Replaced => "replaced",
            };
            eviction_metrics.record_eviction(reason);
        });

        Self {
            fresh: fresh.build(),
            stale: stale.build(),
            epoch: Arc::new(AtomicU64::new(0)),
            config,
            metrics,
        }
    }

    /// TTL por defecto de las entradas frescas.
    pub fn ttl(&self) -> Duration {
        self.config.ttl
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Epoch de invalidacion actual. Capturarlo antes de leer de la base y
    /// pasarlo a [`CatalogCache::set_since`].
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Marca que hubo una invalidacion. Se llama antes de borrar.
    pub(crate) fn bump_epoch(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }

    /// Obtiene una entrada si existe y no expiro. Cuenta hit o miss.
    pub async fn get(&self, key: &CacheKey) -> Option<Arc<CacheEntry>> {
        let start = Instant::now();
        let result = self.fresh.get(key).await;

        if result.is_some() {
            self.metrics.record_hit();
        } else {
            self.metrics.record_miss();
        }

        self.metrics
            .record_operation_duration("get", start.elapsed());
        self.update_entry_gauge();

        result
    }

    /// Obtiene una entrada y la deserializa.
    ///
    /// Si el valor almacenado no se puede deserializar como `T`, la entrada
    /// se descarta y la lectura cuenta como miss.
    pub async fn get_as<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<(T, EntrySource)> {
        let start = Instant::now();

        let Some(entry) = self.fresh.get(key).await else {
            self.metrics.record_miss();
            return None;
        };

        let result = match T::deserialize(&entry.value) {
            Ok(value) => {
                self.metrics.record_hit();
                Some((value, entry.source))
            },
            Err(e) => {
                warn!(key = %key, error = %e, "Discarding undecodable cache entry");
                self.fresh.invalidate(key).await;
                self.stale.invalidate(key).await;
                self.metrics.record_corruption();
                self.metrics.record_miss();
                None
            },
        };

        self.metrics
            .record_operation_duration("get", start.elapsed());
        result
    }

    /// Ultimo valor bueno conocido, aunque haya sido invalidado.
    pub async fn get_stale(&self, key: &CacheKey) -> Option<Arc<CacheEntry>> {
        self.stale.get(key).await
    }

    /// Escribe un valor.
    ///
    /// Un valor de respaldo nunca pisa una entrada fresca vigente. Retorna
    /// si la escritura se aplico.
    pub async fn set(
        &self,
        key: CacheKey,
        value: Value,
        ttl: Duration,
        source: EntrySource,
    ) -> bool {
        self.write(key, value, ttl, source, None).await
    }

    /// Como [`CatalogCache::set`], pero descarta la escritura si hubo una
    /// invalidacion despues de `since` (ver [`CatalogCache::epoch`]).
    pub async fn set_since(
        &self,
        key: CacheKey,
        value: Value,
        ttl: Duration,
        source: EntrySource,
        since: u64,
    ) -> bool {
        self.write(key, value, ttl, source, Some(since)).await
    }

    async fn write(
        &self,
        key: CacheKey,
        value: Value,
        ttl: Duration,
        source: EntrySource,
        since: Option<u64>,
    ) -> bool {
        let start = Instant::now();
        let entry = Arc::new(CacheEntry::new(value, ttl, source));
        let superseded =
            move |epoch: &AtomicU64| since.is_some_and(|s| epoch.load(Ordering::SeqCst) != s);

        let candidate = Arc::clone(&entry);
        let epoch = Arc::clone(&self.epoch);
        let result = self
            .fresh
            .entry(key)
            .and_compute_with(move |existing| {
                let keep = superseded(&*epoch)
                    || (source == EntrySource::Fallback
                        && existing.is_some_and(|e| e.value().source == EntrySource::Fresh));
                let op = if keep { Op::Nop } else { Op::Put(candidate) };
                std::future::ready(op)
            })
            .await;

        let mut written = matches!(
            result,
            CompResult::Inserted(_) | CompResult::ReplacedWith(_)
        );

        // Una invalidacion pudo llegar entre el chequeo y el insert.
        if written && superseded(&*self.epoch) {
            self.fresh.invalidate(&key).await;
            written = false;
        }

        if written && source == EntrySource::Fresh {
            self.stale.insert(key, entry).await;
        }
        if !written {
            debug!(key = %key, ?source, "Cache write skipped");
        }

        self.metrics
            .record_operation_duration("set", start.elapsed());
        self.update_entry_gauge();

        written
    }

    /// Obtiene un valor o lo calcula con `init`.
    /// Evita cache stampede: solo una tarea ejecuta `init` para una key dada,
    /// las demas esperan su resultado.
    ///
    /// Retorna la entrada y si quedo insertada por esta llamada. Los errores
    /// de `init` no se cachean. Si hubo una invalidacion mientras `init`
    /// corria, el valor se retorna pero no se cachea.
    pub async fn get_or_try_insert_with<F, E>(
        &self,
        key: CacheKey,
        init: F,
    ) -> Result<(Arc<CacheEntry>, bool), E>
    where
        F: Future<Output = Result<Value, E>>,
        E: Clone + Send + Sync + 'static,
    {
        let start = Instant::now();
        let ttl = self.config.ttl;
        let since = self.epoch();
        let epoch = Arc::clone(&self.epoch);

        let result = self
            .fresh
            .entry(key)
            .or_try_insert_with(async move {
                let value = init.await.map_err(Load::Failed)?;
                let entry = Arc::new(CacheEntry::new(value, ttl, EntrySource::Fresh));
                if epoch.load(Ordering::SeqCst) != since {
                    return Err(Load::Superseded(entry));
                }
                Ok(entry)
            })
            .await;

        let outcome = match result {
            Ok(entry) => {
                let mut inserted = entry.is_fresh();
                let value = entry.into_value();

                if inserted && self.epoch() != since {
                    // Invalidado entre el chequeo y el insert.
                    self.fresh.invalidate(&key).await;
                    inserted = false;
                }
                if inserted {
                    self.stale.insert(key, Arc::clone(&value)).await;
                }
                Ok((value, inserted))
            },
            Err(shared) => match &*shared {
                Load::Superseded(entry) => {
                    debug!(key = %key, "Value computed before an invalidation, not cached");
                    Ok((Arc::clone(entry), false))
                },
                Load::Failed(e) => Err(e.clone()),
            },
        };

        self.metrics
            .record_operation_duration("get_or_insert", start.elapsed());
        self.update_entry_gauge();

        outcome
    }

    /// Retorna el numero aproximado de entries frescas.
    pub fn entry_count(&self) -> u64 {
        self.fresh.entry_count()
    }

    /// Retorna el numero aproximado de entries retenidas como stale.
    pub fn stale_entry_count(&self) -> u64 {
        self.stale.entry_count()
    }

    /// Itera sobre las entries frescas.
    /// Nota: es una snapshot, las entries pueden cambiar durante la iteracion.
    pub fn iter(&self) -> impl Iterator<Item = (Arc<CacheKey>, Arc<CacheEntry>)> + '_ {
        self.fresh.iter()
    }

    /// Vacia ambos almacenes y reinicia los contadores.
    /// Retorna cuantas entries frescas habia.
    pub async fn flush(&self) -> u64 {
        self.bump_epoch();
        self.sync().await;
        let count = self.fresh.entry_count();

        self.fresh.invalidate_all();
        self.stale.invalidate_all();
        self.sync().await;

        self.metrics.reset();
        self.update_entry_gauge();
        count
    }

    /// Snapshot de estadisticas.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.fresh.entry_count(),
            stale_entries: self.stale.entry_count(),
            hits: self.metrics.hits(),
            misses: self.metrics.misses(),
            hit_rate: self.metrics.hit_rate(),
            invalidations: self.metrics.invalidations(),
            evictions: self.metrics.evictions(),
            max_capacity: self.config.max_capacity,
            ttl_ms: self.config.ttl.as_millis() as u64,
        }
    }

    /// Retorna las metricas para acceso externo.
    pub fn metrics(&self) -> &CacheMetrics {
        &self.metrics
    }

    /// Sincroniza el cache.
    /// Fuerza la limpieza de entries expiradas y la actualizacion de contadores.
    pub async fn sync(&self) {
        self.fresh.run_pending_tasks().await;
        self.stale.run_pending_tasks().await;
    }

    pub(crate) fn fresh_store(&self) -> &Cache<CacheKey, Arc<CacheEntry>> {
        &self.fresh
    }

    /// Actualiza el gauge de entry count.
    fn update_entry_gauge(&self) {
        self.metrics.update_entry_count(self.fresh.entry_count());
    }
}
