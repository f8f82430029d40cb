//! Per-window composition root.
//!
//! Builds one window's bridge, sync manager, store, and coordinator as
//! explicitly owned instances (no globals) and tears them down together.
//! Lifetime equals the window's lifetime.

use std::sync::Arc;

use crate::bridge::MessageBridge;
use crate::storage::Storage;
use crate::store::ConfigStore;
use crate::sync::{ConfigSyncManager, SyncOptions};
use crate::transport::{EventHub, EventTransport};
use crate::window_state::WindowStateCoordinator;

pub struct WindowContext {
    pub bridge: Arc<MessageBridge>,
    pub sync: Arc<ConfigSyncManager>,
    pub store: Arc<ConfigStore>,
    pub coordinator: WindowStateCoordinator,
}

impl WindowContext {
    pub fn new(
        hub: &Arc<EventHub>,
        label: &str,
        storage: &Arc<Storage>,
        options: SyncOptions,
    ) -> Arc<Self> {
        let transport = EventTransport::new(Arc::clone(hub), label);
        let bridge = MessageBridge::new(transport.clone());
        let sync = ConfigSyncManager::new(Arc::clone(&bridge), Arc::clone(storage), options);
        let store = ConfigStore::new(Arc::clone(&sync), Arc::clone(storage));
        store.init_sync();
        let coordinator = WindowStateCoordinator::new(transport, Arc::clone(&sync));
        Arc::new(Self {
            bridge,
            sync,
            store,
            coordinator,
        })
    }

    /// Unsubscribes every listener this window registered. Idempotent.
    pub fn dispose(&self) {
        self.store.dispose();
        self.sync.dispose();
        self.bridge.dispose();
    }
}
