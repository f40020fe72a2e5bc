//! Durable watermark persistence.

mod file;
mod memory;

use async_trait::async_trait;
use pricecache_core::Watermark;

use crate::error::SyncError;

pub use file::FileWatermarkStore;
pub use memory::MemoryWatermarkStore;

/// Storage for the listener watermark.
///
/// The watermark is the only state the engine owns that must survive a
/// process restart.
#[async_trait]
pub trait WatermarkStore: Send + Sync {
    /// Loads the last persisted watermark, `None` if nothing was saved yet.
    async fn load(&self) -> Result<Option<Watermark>, SyncError>;

    /// Persists the watermark, replacing the previous one.
    async fn save(&self, watermark: &Watermark) -> Result<(), SyncError>;
}
