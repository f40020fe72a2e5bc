//! Durable processing marker of the notification listener.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point up to which change events have been processed.
///
/// The timestamp only moves forward. A restarted listener invalidates
/// everything that changed after it instead of assuming nothing was missed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Watermark {
    pub last_processed_at: DateTime<Utc>,
    pub last_channel: String,
}

impl Watermark {
    pub fn new(last_processed_at: DateTime<Utc>, last_channel: impl Into<String>) -> Self {
        Self {
            last_processed_at,
            last_channel: last_channel.into(),
        }
    }

    /// Moves the watermark to `at` unless it is already past it.
    ///
    /// Returns true if the watermark changed.
    pub fn advance(&mut self, at: DateTime<Utc>) -> bool {
        if at > self.last_processed_at {
            self.last_processed_at = at;
            true
        } else {
            false
        }
    }
}
