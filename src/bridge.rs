//! Topic-addressed pub/sub between windows, with echo suppression.
//!
//! Every broadcast rides one shared hub channel and is delivered to all
//! windows, the sender included. The bridge wraps payloads in an [`Envelope`]
//! stamped with the sending window's label and discards inbound envelopes
//! whose `source` matches its own label; without that filter every local
//! action would double-apply. Addressed delivery (`send_to`) bypasses the
//! shared channel via a `"{label}:{type}"` channel, so no filter is needed
//! there.
//!
//! One bridge per window, owned by the window's composition root and kept for
//! the window's full lifetime; `dispose` unsubscribes everything.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use serde::{Deserialize, Serialize};

use crate::config::BROADCAST_CHANNEL;
use crate::transport::{EventTransport, Subscription};

/// Wire envelope for every cross-window message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: serde_json::Value,
    /// Unix millis at send time. Informational; receivers do not order by it.
    pub timestamp: u64,
    /// Label of the originating window. Receivers drop their own echoes.
    pub source: String,
}

/// Current Unix time in milliseconds.
#[must_use]
pub fn unix_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

pub type MessageCallback = Arc<dyn Fn(&serde_json::Value) + Send + Sync>;

struct LocalListener {
    id: u64,
    callback: MessageCallback,
}

pub struct MessageBridge {
    transport: EventTransport,
    /// type → listeners, dispatched in registration order.
    registry: Mutex<HashMap<String, Vec<LocalListener>>>,
    /// Hub subscriptions owned by this bridge (broadcast + direct channels).
    subscriptions: Mutex<Vec<Subscription>>,
    next_id: AtomicU64,
}

impl MessageBridge {
    /// Creates the bridge for one window and wires the shared broadcast
    /// channel listener.
    pub fn new(transport: EventTransport) -> Arc<Self> {
        let bridge = Arc::new(Self {
            transport,
            registry: Mutex::new(HashMap::new()),
            subscriptions: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
        });

        let weak = Arc::downgrade(&bridge);
        let sub = bridge.transport.listen(
            BROADCAST_CHANNEL,
            Arc::new(move |value| {
                let Some(bridge) = weak.upgrade() else { return };
                let envelope: Envelope = match serde_json::from_value(value.clone()) {
                    Ok(e) => e,
                    Err(e) => {
                        log::warn!("Discarding malformed broadcast envelope: {e}");
                        return;
                    }
                };
                // Echo suppression: the hub delivers our own broadcasts back.
                if envelope.source == bridge.transport.label() {
                    return;
                }
                bridge.dispatch(&envelope.kind, &envelope.payload);
            }),
        );
        bridge.lock_subs().push(sub);
        bridge
    }

    /// This window's label (the `source` stamped on outgoing envelopes).
    #[must_use]
    #[allow(dead_code)]
    pub fn label(&self) -> &str {
        self.transport.label()
    }

    fn lock_registry(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<LocalListener>>> {
        self.registry.lock().unwrap_or_else(|e| {
            log::error!("Bridge registry mutex was poisoned, recovering");
            e.into_inner()
        })
    }

    fn lock_subs(&self) -> std::sync::MutexGuard<'_, Vec<Subscription>> {
        self.subscriptions.lock().unwrap_or_else(|e| {
            log::error!("Bridge subscription mutex was poisoned, recovering");
            e.into_inner()
        })
    }

    /// Invokes every local listener registered for `kind`, in registration
    /// order. Callbacks run outside the registry lock so they may subscribe
    /// or unsubscribe.
    fn dispatch(&self, kind: &str, payload: &serde_json::Value) {
        let callbacks: Vec<MessageCallback> = {
            let registry = self.lock_registry();
            match registry.get(kind) {
                Some(listeners) => listeners.iter().map(|l| Arc::clone(&l.callback)).collect(),
                None => return,
            }
        };
        for cb in callbacks {
            cb(payload);
        }
    }

    fn envelope(&self, kind: &str, payload: serde_json::Value) -> Envelope {
        Envelope {
            kind: kind.to_string(),
            payload,
            timestamp: unix_millis(),
            source: self.transport.label().to_string(),
        }
    }

    /// Broadcasts `payload` under `kind` to every window (self excluded by
    /// the receive-side echo filter). Fire-and-forget.
    pub fn broadcast(&self, kind: &str, payload: serde_json::Value) {
        let envelope = self.envelope(kind, payload);
        match serde_json::to_value(&envelope) {
            Ok(value) => self.transport.emit(BROADCAST_CHANNEL, &value),
            Err(e) => log::warn!("Failed to serialize broadcast '{kind}': {e}"),
        }
    }

    /// Addressed delivery to one window. Resolves to a warning no-op when the
    /// target label is not live.
    pub fn send_to(&self, target: &str, kind: &str, payload: serde_json::Value) {
        if !self.transport.window_exists(target) {
            log::warn!("Window '{target}' not found");
            return;
        }
        let envelope = self.envelope(kind, payload);
        match serde_json::to_value(&envelope) {
            Ok(value) => self
                .transport
                .emit(&direct_channel(target, kind), &value),
            Err(e) => log::warn!("Failed to serialize send_to '{kind}': {e}"),
        }
    }

    /// Subscribes `callback` to `kind`: broadcasts dispatched through the
    /// shared channel and messages addressed directly to this window both
    /// land here. The returned guard's unsubscribe is idempotent.
    pub fn on(self: &Arc<Self>, kind: &str, callback: MessageCallback) -> ListenerGuard {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.lock_registry()
            .entry(kind.to_string())
            .or_default()
            .push(LocalListener {
                id,
                callback: Arc::clone(&callback),
            });

        // Direct channel: addressed senders exclude themselves by addressing,
        // so the payload is handed straight to the callback.
        let direct = self.transport.listen(
            &direct_channel(self.transport.label(), kind),
            Arc::new(move |value| {
                match serde_json::from_value::<Envelope>(value.clone()) {
                    Ok(envelope) => callback(&envelope.payload),
                    Err(e) => log::warn!("Discarding malformed direct envelope: {e}"),
                }
            }),
        );

        ListenerGuard {
            bridge: Arc::downgrade(self),
            kind: kind.to_string(),
            id,
            direct,
        }
    }

    /// Subscribes for a single delivery, then unsubscribes itself.
    ///
    /// At-least-once: two envelopes of the same kind arriving back-to-back
    /// can both invoke `callback` before the unsubscribe lands. Callers that
    /// need exactly-once must deduplicate themselves.
    pub fn once(self: &Arc<Self>, kind: &str, callback: MessageCallback) {
        let slot: Arc<Mutex<Option<ListenerGuard>>> = Arc::new(Mutex::new(None));
        let slot_in_cb = Arc::clone(&slot);
        let guard = self.on(
            kind,
            Arc::new(move |payload| {
                callback(payload);
                if let Ok(mut held) = slot_in_cb.lock()
                    && let Some(guard) = held.take()
                {
                    guard.unsubscribe();
                }
            }),
        );
        if let Ok(mut held) = slot.lock() {
            *held = Some(guard);
        }
    }

    fn remove_listener(&self, kind: &str, id: u64) {
        let mut registry = self.lock_registry();
        if let Some(listeners) = registry.get_mut(kind) {
            listeners.retain(|l| l.id != id);
            if listeners.is_empty() {
                registry.remove(kind);
            }
        }
    }

    /// Unsubscribes every listener this bridge registered and drops the
    /// window from the registry, so addressed sends to it become no-ops.
    /// Idempotent; called on window teardown.
    pub fn dispose(&self) {
        for sub in self.lock_subs().drain(..) {
            sub.unsubscribe();
        }
        self.lock_registry().clear();
        self.transport.unregister();
    }
}

fn direct_channel(label: &str, kind: &str) -> String {
    format!("{label}:{kind}")
}

/// Unsubscribe handle for one `on` registration. Safe to call more than once
/// or after the bridge is gone.
pub struct ListenerGuard {
    bridge: Weak<MessageBridge>,
    kind: String,
    id: u64,
    direct: Subscription,
}

impl ListenerGuard {
    pub fn unsubscribe(&self) {
        self.direct.unsubscribe();
        if let Some(bridge) = self.bridge.upgrade() {
            bridge.remove_listener(&self.kind, self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{EventHub, EventTransport};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn pair(hub: &Arc<EventHub>, label: &str) -> Arc<MessageBridge> {
        MessageBridge::new(EventTransport::new(Arc::clone(hub), label))
    }

    fn counting(counter: &Arc<AtomicUsize>) -> MessageCallback {
        let c = Arc::clone(counter);
        Arc::new(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn envelope_wire_format_roundtrips() {
        let envelope = Envelope {
            kind: "camera_config_update".to_string(),
            payload: serde_json::json!({"cameraFov": 45.0}),
            timestamp: 1717490000000,
            source: "main".to_string(),
        };
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["type"], "camera_config_update");
        assert_eq!(value["source"], "main");
        let back: Envelope = serde_json::from_value(value).unwrap();
        assert_eq!(back.kind, envelope.kind);
        assert_eq!(back.payload, envelope.payload);
    }

    #[test]
    fn broadcast_reaches_peer_but_not_sender() {
        let hub = EventHub::new();
        let main = pair(&hub, "main");
        let config = pair(&hub, "model_config_window");
        let main_seen = Arc::new(AtomicUsize::new(0));
        let config_seen = Arc::new(AtomicUsize::new(0));
        let _g1 = main.on("topic", counting(&main_seen));
        let _g2 = config.on("topic", counting(&config_seen));

        main.broadcast("topic", serde_json::json!({"n": 1}));
        assert_eq!(main_seen.load(Ordering::SeqCst), 0);
        assert_eq!(config_seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn listeners_dispatch_in_registration_order() {
        let hub = EventHub::new();
        let main = pair(&hub, "main");
        let config = pair(&hub, "model_config_window");
        let order = Arc::new(Mutex::new(Vec::new()));
        let o1 = Arc::clone(&order);
        let o2 = Arc::clone(&order);
        let _g1 = config.on("topic", Arc::new(move |_| o1.lock().unwrap().push(1)));
        let _g2 = config.on("topic", Arc::new(move |_| o2.lock().unwrap().push(2)));
        main.broadcast("topic", serde_json::Value::Null);
        assert_eq!(*order.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn send_to_requires_a_live_window() {
        let hub = EventHub::new();
        let main = pair(&hub, "main");
        let config = pair(&hub, "model_config_window");
        let seen = Arc::new(AtomicUsize::new(0));
        let _g = config.on("topic", counting(&seen));

        // Not registered yet: warning no-op, nothing delivered.
        main.send_to("model_config_window", "topic", serde_json::json!({}));
        assert_eq!(seen.load(Ordering::SeqCst), 0);

        hub.register_window("model_config_window", Arc::new(|| {}));
        main.send_to("model_config_window", "topic", serde_json::json!({}));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn listener_guard_unsubscribe_is_idempotent() {
        let hub = EventHub::new();
        let main = pair(&hub, "main");
        let config = pair(&hub, "model_config_window");
        let seen = Arc::new(AtomicUsize::new(0));
        let guard = config.on("topic", counting(&seen));
        guard.unsubscribe();
        guard.unsubscribe();
        main.broadcast("topic", serde_json::Value::Null);
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn dispose_drops_broadcast_listening() {
        let hub = EventHub::new();
        let main = pair(&hub, "main");
        let config = pair(&hub, "model_config_window");
        let seen = Arc::new(AtomicUsize::new(0));
        let _g = config.on("topic", counting(&seen));
        config.dispose();
        main.broadcast("topic", serde_json::Value::Null);
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn malformed_envelopes_are_discarded() {
        let hub = EventHub::new();
        let config = pair(&hub, "model_config_window");
        let seen = Arc::new(AtomicUsize::new(0));
        let _g = config.on("topic", counting(&seen));
        // Raw emit bypassing the bridge: not an envelope at all.
        hub.emit(BROADCAST_CHANNEL, &serde_json::json!({"nope": true}));
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }
}
