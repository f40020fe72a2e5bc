//! Error types for the synchronization layer.

use std::path::PathBuf;

use pricecache_core::CoreError;

/// Errors that can occur while talking to the database or the disk.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Could not open a connection.
    #[error("connection failed: {reason}")]
    Connect { reason: String },

    /// Connected, but `LISTEN` on the channel failed.
    #[error("failed to subscribe to channel '{channel}': {reason}")]
    Subscribe { channel: String, reason: String },

    /// The notification connection dropped.
    #[error("notification connection closed")]
    ConnectionClosed,

    /// An operation exceeded its deadline.
    #[error("operation timed out after {millis}ms")]
    Timeout { millis: u64 },

    /// A read query failed.
    #[error("query failed: {reason}")]
    Query { reason: String },

    /// The source has no row for the requested key.
    #[error("not found: {key}")]
    NotFound { key: String },

    /// Reading or writing the watermark failed.
    #[error("watermark error at {path}: {reason}")]
    Watermark { path: PathBuf, reason: String },

    /// A payload or key could not be decoded.
    #[error(transparent)]
    Decode(#[from] CoreError),
}

impl SyncError {
    /// Creates a new connection error.
    pub fn connect(reason: impl Into<String>) -> Self {
        Self::Connect {
            reason: reason.into(),
        }
    }

    /// Creates a new query error.
    pub fn query(reason: impl Into<String>) -> Self {
        Self::Query {
            reason: reason.into(),
        }
    }

    /// Creates a timeout error from a duration.
    pub fn timeout(after: std::time::Duration) -> Self {
        Self::Timeout {
            millis: after.as_millis() as u64,
        }
    }

    /// Creates a watermark I/O error.
    pub fn watermark(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Watermark {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if this is a transient error that might succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Connect { .. }
                | Self::ConnectionClosed
                | Self::Timeout { .. }
                | Self::Query { .. }
        )
    }
}

impl From<sqlx::Error> for SyncError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound {
                key: "row".to_string(),
            },
            sqlx::Error::PoolTimedOut => Self::Timeout { millis: 0 },
            sqlx::Error::Io(e) => Self::connect(e.to_string()),
            sqlx::Error::PoolClosed | sqlx::Error::WorkerCrashed => {
                Self::connect(err.to_string())
            },
            other => Self::query(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_error_display() {
        let err = SyncError::connect("refused");
        assert_eq!(err.to_string(), "connection failed: refused");

        let err = SyncError::timeout(Duration::from_millis(1500));
        assert_eq!(err.to_string(), "operation timed out after 1500ms");

        let err = SyncError::Subscribe {
            channel: "catalog_changes".into(),
            reason: "permission denied".into(),
        };
        assert_eq!(
            err.to_string(),
            "failed to subscribe to channel 'catalog_changes': permission denied"
        );
    }

    #[test]
    fn test_is_transient() {
        assert!(SyncError::connect("x").is_transient());
        assert!(SyncError::ConnectionClosed.is_transient());
        assert!(SyncError::timeout(Duration::from_secs(1)).is_transient());
        assert!(SyncError::query("x").is_transient());
        assert!(!SyncError::NotFound { key: "k".into() }.is_transient());
        assert!(!SyncError::watermark("/tmp/wm", "denied").is_transient());
    }

    #[test]
    fn test_from_sqlx() {
        let err: SyncError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, SyncError::NotFound { .. }));

        let err: SyncError = sqlx::Error::PoolTimedOut.into();
        assert!(err.is_transient());
    }
}
