//! Cache-aside read path.
//!
//! The gateway is the only place values enter the cache on demand. It
//! resolves a key to a value plus where that value came from, degrading to
//! stale or static data when the source fails.

mod error;
mod fallback;
mod resolver;

pub use error::GatewayError;
pub use fallback::FallbackRegistry;
pub use resolver::{Gateway, GatewayConfig, ResolveSource, Resolved};
