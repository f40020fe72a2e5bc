//! Application state.

use std::sync::Arc;

use pricecache_sync::{CatalogSource, ListenerState, ListenerStatus};

use crate::cache::CatalogCache;
use crate::gateway::Gateway;
use crate::warmup::WarmUpCoordinator;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    gateway: Gateway,
    source: Arc<dyn CatalogSource>,
    warmup: WarmUpCoordinator,
    listener: Option<Arc<ListenerState>>,
}

impl AppState {
    /// Creates the state; the warm-up coordinator shares the gateway's cache.
    pub fn new(gateway: Gateway, source: Arc<dyn CatalogSource>) -> Self {
        let warmup = WarmUpCoordinator::new(Arc::clone(&source), gateway.cache().clone());
        Self {
            gateway,
            source,
            warmup,
            listener: None,
        }
    }

    /// Attaches the state of a running notification listener.
    pub fn with_listener(mut self, listener: Arc<ListenerState>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    pub fn cache(&self) -> &CatalogCache {
        self.gateway.cache()
    }

    pub fn source(&self) -> &Arc<dyn CatalogSource> {
        &self.source
    }

    pub fn warmup(&self) -> &WarmUpCoordinator {
        &self.warmup
    }

    pub fn listener(&self) -> Option<&Arc<ListenerState>> {
        self.listener.as_ref()
    }

    /// Snapshot of the listener, if one is attached.
    pub fn listener_status(&self) -> Option<ListenerStatus> {
        self.listener.as_ref().map(|l| l.snapshot())
    }
}
