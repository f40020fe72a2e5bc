//! Background housekeeping for expired entries.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::interval;
use tracing::{debug, info};

use super::CatalogCache;

/// Handle for a running sweeper. Dropping it stops the task.
pub struct SweeperHandle {
    shutdown_tx: watch::Sender<bool>,
}

impl SweeperHandle {
    /// Signals the sweeper to stop.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Periodically flushes moka's pending maintenance so expired entries are
/// dropped even when nobody reads them.
pub struct CacheSweeper {
    cache: CatalogCache,
    interval: Duration,
}

impl CacheSweeper {
    pub fn new(cache: CatalogCache, interval: Duration) -> Self {
        Self { cache, interval }
    }

    /// Starts the background task.
    pub fn start(self) -> SweeperHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(self.run(shutdown_rx));
        SweeperHandle { shutdown_tx }
    }

    async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        let mut timer = interval(self.interval);
        info!("Starting cache sweeper with interval {:?}", self.interval);

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    self.cache.sync().await;
                    self.cache.metrics().update_entry_count(self.cache.entry_count());
                    debug!(entries = self.cache.entry_count(), "Cache sweep complete");
                }
                result = shutdown_rx.changed() => {
                    if result.is_err() || *shutdown_rx.borrow() {
                        info!("Cache sweeper shutting down");
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheConfig, EntrySource};
    use pricecache_core::{CacheKey, ProjectionKind};
    use serde_json::json;

    #[tokio::test]
    async fn test_sweeper_drops_expired_entries() {
        let cache = CatalogCache::new(CacheConfig::default());
        for id in 0..3 {
            cache
                .set(
                    CacheKey::entity(ProjectionKind::Test, id, None),
                    json!(id),
                    Duration::from_millis(30),
                    EntrySource::Fresh,
                )
                .await;
        }
        cache.sync().await;
        assert_eq!(cache.entry_count(), 3);

        let handle = CacheSweeper::new(cache.clone(), Duration::from_millis(10)).start();
        tokio::time::sleep(Duration::from_millis(120)).await;

        assert_eq!(cache.entry_count(), 0);
        handle.stop();
    }
}
