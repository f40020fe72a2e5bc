//! Read path errors.

use pricecache_core::CacheKey;
use pricecache_sync::SyncError;
use thiserror::Error;

/// Why a key could not be resolved to any usable value.
///
/// Cloneable because a single recompute failure is shared by every caller
/// waiting on the same key.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("{key} not found")]
    NotFound { key: String },

    #[error("recompute of {key} failed after {attempts} attempt(s): {reason}")]
    Unavailable {
        key: String,
        attempts: u32,
        reason: String,
    },

    #[error("value for {key} could not be decoded: {reason}")]
    Decode { key: String, reason: String },
}

impl GatewayError {
    pub(crate) fn from_source(key: &CacheKey, attempts: u32, error: SyncError) -> Self {
        match error {
            SyncError::NotFound { .. } => Self::NotFound {
                key: key.to_string(),
            },
            other => Self::Unavailable {
                key: key.to_string(),
                attempts,
                reason: other.to_string(),
            },
        }
    }

    pub(crate) fn decode(key: &CacheKey, reason: impl ToString) -> Self {
        Self::Decode {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true if a later attempt may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}
