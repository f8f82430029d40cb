//! In-process event hub and per-window transport handles.
//!
//! The hub is the host primitive the sync layers build on: named-channel
//! publish/listen with broadcast-to-all semantics (the emitting window's own
//! listeners receive the event too) plus a registry of live windows for
//! addressed delivery, existence queries, and focus requests.
//!
//! Listener callbacks run outside the hub lock, so a callback may emit again
//! on the same hub (the catch-up protocol answers a request from inside
//! dispatch). Per-channel delivery order follows registration and emit order
//! for a single emitter; nothing is guaranteed across channels.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

pub type EventCallback = Arc<dyn Fn(&serde_json::Value) + Send + Sync>;
pub type FocusHook = Arc<dyn Fn() + Send + Sync>;

struct ChannelListener {
    id: u64,
    callback: EventCallback,
}

struct WindowEntry {
    focus: FocusHook,
}

#[derive(Default)]
struct HubInner {
    channels: HashMap<String, Vec<ChannelListener>>,
    windows: HashMap<String, WindowEntry>,
    next_listener_id: u64,
}

/// Process-wide event bus shared by all windows.
#[derive(Default)]
pub struct EventHub {
    inner: Mutex<HubInner>,
}

impl EventHub {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HubInner> {
        self.inner.lock().unwrap_or_else(|e| {
            log::error!("Event hub mutex was poisoned, recovering");
            e.into_inner()
        })
    }

    /// Delivers `value` to every listener currently registered on `channel`,
    /// including listeners owned by the emitting window. Fire-and-forget.
    pub fn emit(&self, channel: &str, value: &serde_json::Value) {
        let callbacks: Vec<EventCallback> = {
            let inner = self.lock();
            match inner.channels.get(channel) {
                Some(listeners) => listeners.iter().map(|l| Arc::clone(&l.callback)).collect(),
                None => return,
            }
        };
        for cb in callbacks {
            cb(value);
        }
    }

    /// Registers a listener on `channel`. The returned subscription is
    /// idempotent to unsubscribe and safe to drop after the hub is gone.
    pub fn listen(self: &Arc<Self>, channel: &str, callback: EventCallback) -> Subscription {
        let id = {
            let mut inner = self.lock();
            inner.next_listener_id += 1;
            let id = inner.next_listener_id;
            inner
                .channels
                .entry(channel.to_string())
                .or_default()
                .push(ChannelListener { id, callback });
            id
        };
        Subscription {
            hub: Arc::downgrade(self),
            channel: channel.to_string(),
            id,
        }
    }

    /// Registers a live window with its focus hook. Labels are exact strings.
    pub fn register_window(&self, label: &str, focus: FocusHook) {
        let mut inner = self.lock();
        if inner
            .windows
            .insert(label.to_string(), WindowEntry { focus })
            .is_some()
        {
            log::warn!("Window '{label}' registered twice; replacing focus hook");
        }
    }

    /// Removes a window from the registry. Its channel listeners stay until
    /// unsubscribed by their owners.
    pub fn remove_window(&self, label: &str) {
        self.lock().windows.remove(label);
    }

    #[must_use]
    pub fn window_exists(&self, label: &str) -> bool {
        self.lock().windows.contains_key(label)
    }

    /// Invokes the focus hook of `label`. Non-fatal no-op with a warning when
    /// no live window carries that label. The hook runs outside the lock.
    pub fn focus_window(&self, label: &str) {
        let hook = {
            let inner = self.lock();
            inner.windows.get(label).map(|e| Arc::clone(&e.focus))
        };
        match hook {
            Some(focus) => focus(),
            None => log::warn!("Window '{label}' not found"),
        }
    }

    fn unsubscribe(&self, channel: &str, id: u64) {
        let mut inner = self.lock();
        if let Some(listeners) = inner.channels.get_mut(channel) {
            listeners.retain(|l| l.id != id);
            if listeners.is_empty() {
                inner.channels.remove(channel);
            }
        }
    }
}

/// Handle to one registered listener. Unsubscribing twice, or after the hub
/// has been dropped, is a no-op.
pub struct Subscription {
    hub: Weak<EventHub>,
    channel: String,
    id: u64,
}

impl Subscription {
    pub fn unsubscribe(&self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.unsubscribe(&self.channel, self.id);
        }
    }
}

/// Per-window view of the hub: the same bus plus this window's label.
#[derive(Clone)]
pub struct EventTransport {
    hub: Arc<EventHub>,
    label: String,
}

impl EventTransport {
    #[must_use]
    pub fn new(hub: Arc<EventHub>, label: impl Into<String>) -> Self {
        Self {
            hub,
            label: label.into(),
        }
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn emit(&self, channel: &str, value: &serde_json::Value) {
        self.hub.emit(channel, value);
    }

    pub fn listen(&self, channel: &str, callback: EventCallback) -> Subscription {
        self.hub.listen(channel, callback)
    }

    #[must_use]
    pub fn window_exists(&self, label: &str) -> bool {
        self.hub.window_exists(label)
    }

    pub fn focus_window(&self, label: &str) {
        self.hub.focus_window(label);
    }

    /// Drops this window from the hub registry on teardown.
    pub fn unregister(&self) {
        self.hub.remove_window(&self.label);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn emit_reaches_all_listeners_including_emitter() {
        let hub = EventHub::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let subs: Vec<Subscription> = (0..3)
            .map(|_| {
                let h = Arc::clone(&hits);
                hub.listen("ch", Arc::new(move |_| {
                    h.fetch_add(1, Ordering::SeqCst);
                }))
            })
            .collect();
        hub.emit("ch", &serde_json::json!({"a": 1}));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        drop(subs);
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let hub = EventHub::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let sub = hub.listen("ch", Arc::new(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        }));
        sub.unsubscribe();
        sub.unsubscribe();
        hub.emit("ch", &serde_json::Value::Null);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unsubscribe_after_hub_dropped_is_noop() {
        let hub = EventHub::new();
        let sub = hub.listen("ch", Arc::new(|_| {}));
        drop(hub);
        sub.unsubscribe();
    }

    #[test]
    fn listener_may_emit_from_inside_dispatch() {
        let hub = EventHub::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let _inner_sub = hub.listen("reply", Arc::new(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        }));
        let hub2 = Arc::clone(&hub);
        let _outer_sub = hub.listen("request", Arc::new(move |_| {
            hub2.emit("reply", &serde_json::Value::Null);
        }));
        hub.emit("request", &serde_json::Value::Null);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn window_registry_tracks_existence_and_focus() {
        let hub = EventHub::new();
        let focused = Arc::new(AtomicUsize::new(0));
        let f = Arc::clone(&focused);
        hub.register_window("main", Arc::new(move || {
            f.fetch_add(1, Ordering::SeqCst);
        }));
        assert!(hub.window_exists("main"));
        assert!(!hub.window_exists("model_config_window"));
        hub.focus_window("main");
        assert_eq!(focused.load(Ordering::SeqCst), 1);
        hub.focus_window("nope");
        hub.remove_window("main");
        assert!(!hub.window_exists("main"));
    }
}
