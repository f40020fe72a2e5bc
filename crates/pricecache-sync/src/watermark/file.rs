//! File-backed watermark store.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use pricecache_core::Watermark;
use tracing::debug;

use super::WatermarkStore;
use crate::error::SyncError;

/// Persists the watermark as a small JSON document.
///
/// Writes go to a sibling temporary file that is then renamed over the
/// target, so a crash mid-write leaves the previous watermark intact.
#[derive(Debug, Clone)]
pub struct FileWatermarkStore {
    path: PathBuf,
}

impl FileWatermarkStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "watermark".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn error(&self, reason: impl ToString) -> SyncError {
        SyncError::watermark(&self.path, reason.to_string())
    }
}

#[async_trait]
impl WatermarkStore for FileWatermarkStore {
    async fn load(&self) -> Result<Option<Watermark>, SyncError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.error(e)),
        };

        let watermark = serde_json::from_slice(&bytes).map_err(|e| self.error(e))?;
        Ok(Some(watermark))
    }

    async fn save(&self, watermark: &Watermark) -> Result<(), SyncError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.error(e))?;
        }

        let json = serde_json::to_vec_pretty(watermark).map_err(|e| self.error(e))?;
        let tmp = self.temp_path();

        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| self.error(e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.error(e))?;

        debug!(
            path = %self.path.display(),
            at = %watermark.last_processed_at,
            "Watermark persisted"
        );
        Ok(())
    }
}
