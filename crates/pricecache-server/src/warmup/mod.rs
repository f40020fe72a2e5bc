//! Warm-up coordinator.

mod coordinator;

pub use coordinator::{ScopeError, WarmUpCoordinator, WarmUpError, WarmUpReport};
