//! In-memory watermark store.

use async_trait::async_trait;
use parking_lot::RwLock;
use pricecache_core::Watermark;

use super::WatermarkStore;
use crate::error::SyncError;

/// Keeps the watermark in memory. Nothing survives a restart, so this is
/// only suitable for tests and ephemeral deployments.
#[derive(Debug, Default)]
pub struct MemoryWatermarkStore {
    current: RwLock<Option<Watermark>>,
    saves: RwLock<u64>,
}

impl MemoryWatermarkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already holds a watermark.
    pub fn with_watermark(watermark: Watermark) -> Self {
        Self {
            current: RwLock::new(Some(watermark)),
            saves: RwLock::new(0),
        }
    }

    /// Returns the stored watermark without going through the trait.
    pub fn current(&self) -> Option<Watermark> {
        self.current.read().clone()
    }

    /// Number of `save` calls so far.
    pub fn save_count(&self) -> u64 {
        *self.saves.read()
    }
}

#[async_trait]
impl WatermarkStore for MemoryWatermarkStore {
    async fn load(&self) -> Result<Option<Watermark>, SyncError> {
        Ok(self.current.read().clone())
    }

    async fn save(&self, watermark: &Watermark) -> Result<(), SyncError> {
        *self.current.write() = Some(watermark.clone());
        *self.saves.write() += 1;
        Ok(())
    }
}
