//! Config sync manager: the closed catalog of sync topics, per-topic
//! debouncing, storage side effects, and the catch-up protocol.
//!
//! Each `sync_*_config` call is debounced independently, so a light-slider
//! drag and a camera drag coalesce on their own timelines without blocking
//! each other. After a broadcast fires, the changed slice is merged into the
//! single persisted `modelConfig` record (read-merge-write; concurrent
//! writers race and the last one wins, by design of the original protocol).
//!
//! Catch-up is pull-based: a late joiner emits `config_request` and any
//! window with a registered provider answers by broadcasting the full state.
//! With two providers both answer and the requester keeps whichever full
//! sync lands last. There is no timeout; an unanswered requester simply
//! keeps its current state.

mod debounce;

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::bridge::{ListenerGuard, MessageBridge, MessageCallback};
use crate::config::{MODEL_CONFIG_KEY, SYNC_DEBOUNCE_MS};
use crate::storage::Storage;
use crate::store::{
    AnimationSlice, BackgroundSlice, CameraSlice, ConfigState, LightSlice, ModelSlice,
};

pub use debounce::Debouncer;

/// The fixed set of sync topics. Wire names are part of the protocol and
/// never change without a coordinated UI update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigTopic {
    Light,
    Model,
    Camera,
    Background,
    Animation,
    FullSync,
    Request,
}

impl ConfigTopic {
    /// Topics that carry a state slice (everything except `Request`).
    pub const UPDATES: [ConfigTopic; 6] = [
        ConfigTopic::Light,
        ConfigTopic::Model,
        ConfigTopic::Camera,
        ConfigTopic::Background,
        ConfigTopic::Animation,
        ConfigTopic::FullSync,
    ];

    #[must_use]
    pub const fn channel(self) -> &'static str {
        match self {
            ConfigTopic::Light => "light_config_update",
            ConfigTopic::Model => "model_config_update",
            ConfigTopic::Camera => "camera_config_update",
            ConfigTopic::Background => "background_config_update",
            ConfigTopic::Animation => "animation_config_update",
            ConfigTopic::FullSync => "full_config_sync",
            ConfigTopic::Request => "config_request",
        }
    }
}

/// Tuning for one manager instance.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub debounce_delay: Duration,
    /// Persist each synced slice into local storage after broadcast.
    pub persist: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            debounce_delay: Duration::from_millis(SYNC_DEBOUNCE_MS),
            persist: true,
        }
    }
}

pub type ConfigProvider = Arc<dyn Fn() -> ConfigState + Send + Sync>;

pub struct ConfigSyncManager {
    bridge: Arc<MessageBridge>,
    debouncers: HashMap<ConfigTopic, Debouncer<serde_json::Value>>,
    guards: Mutex<Vec<ListenerGuard>>,
}

impl ConfigSyncManager {
    pub fn new(bridge: Arc<MessageBridge>, storage: Arc<Storage>, options: SyncOptions) -> Arc<Self> {
        let mut debouncers = HashMap::new();
        for topic in ConfigTopic::UPDATES {
            let bridge_for_topic = Arc::clone(&bridge);
            let storage_for_topic = Arc::clone(&storage);
            let persist = options.persist;
            debouncers.insert(
                topic,
                Debouncer::new(options.debounce_delay, move |payload: serde_json::Value| {
                    bridge_for_topic.broadcast(topic.channel(), payload.clone());
                    if !persist {
                        return;
                    }
                    if topic == ConfigTopic::FullSync {
                        storage_for_topic.set(MODEL_CONFIG_KEY, payload);
                    } else {
                        storage_for_topic.merge(MODEL_CONFIG_KEY, &payload);
                    }
                }),
            );
        }
        Arc::new(Self {
            bridge,
            debouncers,
            guards: Mutex::new(Vec::new()),
        })
    }

    fn sync(&self, topic: ConfigTopic, payload: serde_json::Value) {
        if let Some(debouncer) = self.debouncers.get(&topic) {
            debouncer.call(payload);
        }
    }

    fn sync_serialized<T: serde::Serialize>(&self, topic: ConfigTopic, slice: &T) {
        match serde_json::to_value(slice) {
            Ok(payload) => self.sync(topic, payload),
            Err(e) => log::warn!("Failed to serialize {} payload: {e}", topic.channel()),
        }
    }

    pub fn sync_light_config(&self, slice: &LightSlice) {
        self.sync_serialized(ConfigTopic::Light, slice);
    }

    pub fn sync_model_config(&self, slice: &ModelSlice) {
        self.sync_serialized(ConfigTopic::Model, slice);
    }

    pub fn sync_camera_config(&self, slice: &CameraSlice) {
        self.sync_serialized(ConfigTopic::Camera, slice);
    }

    pub fn sync_background_config(&self, slice: &BackgroundSlice) {
        self.sync_serialized(ConfigTopic::Background, slice);
    }

    pub fn sync_animation_config(&self, slice: &AnimationSlice) {
        self.sync_serialized(ConfigTopic::Animation, slice);
    }

    pub fn sync_full_config(&self, state: &ConfigState) {
        self.sync_serialized(ConfigTopic::FullSync, state);
    }

    /// Subscribes a handler for one inbound topic. The caller owns the guard;
    /// dropping it without unsubscribing leaves the handler live for the
    /// window's lifetime, which is the common case.
    pub fn on_config_update(&self, topic: ConfigTopic, handler: MessageCallback) -> ListenerGuard {
        self.bridge.on(topic.channel(), handler)
    }

    /// Asks for the current full configuration: addressed when a target label
    /// is given, broadcast otherwise. Fire-and-forget, no timeout.
    pub fn request_current_config(&self, target: Option<&str>) {
        let payload = serde_json::json!({});
        match target {
            Some(label) => self
                .bridge
                .send_to(label, ConfigTopic::Request.channel(), payload),
            None => self.bridge.broadcast(ConfigTopic::Request.channel(), payload),
        }
    }

    /// Registers this window as a catch-up responder. Any inbound
    /// `config_request` is answered immediately (not debounced) with a
    /// broadcast of the provider's full state.
    pub fn on_config_request(&self, provider: ConfigProvider) {
        // Weak: the closure lives in the bridge's own registry, an Arc here
        // would keep the bridge alive through itself.
        let bridge = Arc::downgrade(&self.bridge);
        let guard = self.bridge.on(
            ConfigTopic::Request.channel(),
            Arc::new(move |_payload| {
                let Some(bridge) = bridge.upgrade() else { return };
                let state = provider();
                match serde_json::to_value(&state) {
                    Ok(value) => bridge.broadcast(ConfigTopic::FullSync.channel(), value),
                    Err(e) => log::warn!("Failed to serialize full config response: {e}"),
                }
            }),
        );
        self.lock_guards().push(guard);
    }

    fn lock_guards(&self) -> std::sync::MutexGuard<'_, Vec<ListenerGuard>> {
        self.guards.lock().unwrap_or_else(|e| {
            log::error!("Sync guard mutex was poisoned, recovering");
            e.into_inner()
        })
    }

    /// Unsubscribes handlers the manager registered itself. Idempotent.
    pub fn dispose(&self) {
        for guard in self.lock_guards().drain(..) {
            guard.unsubscribe();
        }
    }
}
