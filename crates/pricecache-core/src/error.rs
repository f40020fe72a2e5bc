//! Error types for the core domain.
//!
//! Decoding and parsing are the only fallible operations at this level.
//! Everything that talks to the network or the disk lives in
//! `pricecache-sync` and wraps these errors.

use thiserror::Error;

/// Convenience alias for results produced by this crate.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised while decoding events or parsing keys.
///
/// # Example
///
/// ```
/// use pricecache_core::ChangeEvent;
///
/// let err = ChangeEvent::from_payload("not json").unwrap_err();
/// assert!(err.is_malformed());
/// ```
#[derive(Debug, Error)]
pub enum CoreError {
    /// The notification payload could not be decoded.
    #[error("malformed change payload: {reason}")]
    MalformedPayload {
        /// What was wrong with the payload
        reason: String,
    },

    /// A price-scoped event arrived without its price list id.
    #[error("event of kind '{kind}' requires a price_list_id")]
    MissingPriceList {
        /// Kind of the offending event
        kind: String,
    },

    /// A cache key string does not follow `kind:scope:entity`.
    #[error("invalid cache key '{key}': {reason}")]
    InvalidKey {
        /// The rejected key
        key: String,
        /// Why it was rejected
        reason: String,
    },
}

impl CoreError {
    /// Creates a malformed payload error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedPayload {
            reason: reason.into(),
        }
    }

    /// Creates an invalid key error.
    pub fn invalid_key(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if the error comes from an undecodable notification.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            Self::MalformedPayload { .. } | Self::MissingPriceList { .. }
        )
    }
}
