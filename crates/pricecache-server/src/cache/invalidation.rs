//! Cache invalidation with pattern matching support.

use async_trait::async_trait;
use glob::Pattern;
use pricecache_core::CacheKey;
use pricecache_sync::CacheInvalidator;
use serde::Serialize;
use tracing::{debug, info};

use super::catalog_cache::{CacheError, CatalogCache};

/// Resultado de una operacion de invalidacion.
#[derive(Debug, Clone, Serialize)]
pub struct InvalidationResult {
    /// Numero de entries invalidadas.
    pub count: usize,
    /// Patrones aplicados.
    pub patterns: Vec<String>,
}

/// Valida un patron glob sobre keys `kind:scope:entity`.
pub fn parse_pattern(pattern: &str) -> Result<Pattern, CacheError> {
    if pattern.trim().is_empty() {
        return Err(CacheError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: "pattern is empty".to_string(),
        });
    }
    Pattern::new(pattern).map_err(|e| CacheError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

impl CatalogCache {
    /// Invalida una entrada especifica. La key se toma literal, aunque sea
    /// un wildcard. Retorna si la entrada existia.
    pub async fn invalidate(&self, key: &CacheKey) -> bool {
        self.bump_epoch();
        let removed = self.fresh_store().remove(key).await.is_some();
        if removed {
            self.metrics().record_invalidations(1);
        }

        debug!(key = %key, removed, "Cache key invalidated");
        removed
    }

    /// Invalida entradas usando un patron glob.
    ///
    /// El patron sigue el formato `kind:scope:entity`, donde cada parte
    /// puede usar comodines:
    /// - `*`: coincide con cualquier secuencia de caracteres
    /// - `?`: coincide con un caracter
    ///
    /// Invalidar dos veces es igual que invalidar una: la segunda retorna 0.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use pricecache_server::cache::{CacheConfig, CatalogCache};
    /// # #[tokio::main]
    /// # async fn main() {
    /// # let cache = CatalogCache::new(CacheConfig::default());
    /// // Todo lo de la lista de precios 27
    /// let result = cache.invalidate_by_pattern("*:27:*").await;
    ///
    /// // Todos los tests en cualquier scope
    /// let result = cache.invalidate_by_pattern("test:*:*").await;
    /// # }
    /// ```
    pub async fn invalidate_by_pattern(&self, pattern_str: &str) -> InvalidationResult {
        let pattern = match parse_pattern(pattern_str) {
            Ok(p) => p,
            Err(e) => {
                debug!(pattern = %pattern_str, error = %e, "Invalid glob pattern");
                return InvalidationResult {
                    count: 0,
                    patterns: vec![pattern_str.to_string()],
                };
            },
        };

        self.bump_epoch();

        // Recolectar primero, el iterador es una snapshot
        let matching: Vec<CacheKey> = self
            .iter()
            .filter(|(key, _)| pattern.matches(&key.to_string()))
            .map(|(key, _)| *key)
            .collect();

        let mut count = 0;
        for key in matching {
            if self.fresh_store().remove(&key).await.is_some() {
                count += 1;
            }
        }
        self.metrics().record_invalidations(count as u64);

        info!(
            pattern = %pattern_str,
            count = count,
            "Cache entries invalidated by pattern"
        );

        InvalidationResult {
            count,
            patterns: vec![pattern_str.to_string()],
        }
    }

    /// Invalida multiples patrones a la vez.
    pub async fn invalidate_by_patterns(&self, patterns: &[&str]) -> InvalidationResult {
        let mut total_count = 0;
        let mut all_patterns = Vec::new();

        for pattern_str in patterns {
            let result = self.invalidate_by_pattern(pattern_str).await;
            total_count += result.count;
            all_patterns.extend(result.patterns);
        }

        InvalidationResult {
            count: total_count,
            patterns: all_patterns,
        }
    }

    /// Invalida todas las entradas frescas. El valor stale se conserva.
    pub async fn invalidate_all_entries(&self) -> u64 {
        self.bump_epoch();
        self.sync().await;
        let count = self.entry_count();

        self.fresh_store().invalidate_all();
        self.sync().await;
        self.metrics().record_invalidations(count);

        info!(count, "All cache entries invalidated");
        count
    }
}

#[async_trait]
impl CacheInvalidator for CatalogCache {
    async fn invalidate_key(&self, key: &CacheKey) -> u64 {
        u64::from(self.invalidate(key).await)
    }

    async fn invalidate_pattern(&self, pattern: &str) -> u64 {
        self.invalidate_by_pattern(pattern).await.count as u64
    }

    async fn invalidate_all(&self) -> u64 {
        self.invalidate_all_entries().await
    }
}
