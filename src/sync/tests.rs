//! Unit tests for the sync manager: topic catalog, debounced broadcast with
//! storage side effects, and the catch-up request path.

use super::*;
use crate::transport::EventHub;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

fn temp_storage(name: &str) -> Arc<Storage> {
    let dir = std::env::temp_dir().join(format!("modelview-syncmgr-{name}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    Arc::new(Storage::new(dir))
}

fn manager_for(label: &str, name: &str) -> (Arc<EventHub>, Arc<MessageBridge>, Arc<ConfigSyncManager>, Arc<Storage>) {
    let hub = EventHub::new();
    let bridge = MessageBridge::new(crate::transport::EventTransport::new(Arc::clone(&hub), label));
    let storage = temp_storage(name);
    let manager = ConfigSyncManager::new(
        Arc::clone(&bridge),
        Arc::clone(&storage),
        SyncOptions {
            debounce_delay: Duration::from_millis(10),
            persist: true,
        },
    );
    (hub, bridge, manager, storage)
}

#[test]
fn topic_channels_are_the_wire_names() {
    assert_eq!(ConfigTopic::Light.channel(), "light_config_update");
    assert_eq!(ConfigTopic::Model.channel(), "model_config_update");
    assert_eq!(ConfigTopic::Camera.channel(), "camera_config_update");
    assert_eq!(ConfigTopic::Background.channel(), "background_config_update");
    assert_eq!(ConfigTopic::Animation.channel(), "animation_config_update");
    assert_eq!(ConfigTopic::FullSync.channel(), "full_config_sync");
    assert_eq!(ConfigTopic::Request.channel(), "config_request");
    assert!(!ConfigTopic::UPDATES.contains(&ConfigTopic::Request));
}

#[test]
fn debounced_sync_merges_slice_into_storage() {
    let (_hub, _bridge, manager, storage) = manager_for("main", "persist");
    storage.set(MODEL_CONFIG_KEY, serde_json::json!({"modelScale": 3.0}));

    manager.sync_camera_config(&CameraSlice {
        camera_fov: Some(60.0),
        camera_distance: None,
    });
    thread::sleep(Duration::from_millis(100));

    let record = storage.get(MODEL_CONFIG_KEY).expect("persisted");
    assert_eq!(record["cameraFov"], 60.0);
    assert_eq!(record["modelScale"], 3.0);
}

#[test]
fn full_sync_overwrites_the_record() {
    let (_hub, _bridge, manager, storage) = manager_for("main", "overwrite");
    storage.set(MODEL_CONFIG_KEY, serde_json::json!({"stale": true}));

    manager.sync_full_config(&ConfigState::default());
    thread::sleep(Duration::from_millis(100));

    let record = storage.get(MODEL_CONFIG_KEY).expect("persisted");
    assert!(record.get("stale").is_none());
    assert_eq!(record["lights"].as_array().map(Vec::len), Some(2));
}

#[test]
fn persist_disabled_leaves_storage_untouched() {
    let hub = EventHub::new();
    let bridge = MessageBridge::new(crate::transport::EventTransport::new(Arc::clone(&hub), "main"));
    let storage = temp_storage("no-persist");
    let manager = ConfigSyncManager::new(
        Arc::clone(&bridge),
        Arc::clone(&storage),
        SyncOptions {
            debounce_delay: Duration::from_millis(10),
            persist: false,
        },
    );
    manager.sync_animation_config(&AnimationSlice {
        rotation_speed: 0.5,
    });
    thread::sleep(Duration::from_millis(100));
    assert!(storage.get(MODEL_CONFIG_KEY).is_none());
}

#[test]
fn broadcast_request_is_answered_with_full_sync() {
    // Requester and responder on the same hub, distinct labels.
    let hub = EventHub::new();
    let requester_bridge =
        MessageBridge::new(crate::transport::EventTransport::new(Arc::clone(&hub), "main"));
    let responder_bridge = MessageBridge::new(crate::transport::EventTransport::new(
        Arc::clone(&hub),
        "model_config_window",
    ));
    let storage = temp_storage("request");
    let requester = ConfigSyncManager::new(
        Arc::clone(&requester_bridge),
        Arc::clone(&storage),
        SyncOptions::default(),
    );
    let responder = ConfigSyncManager::new(
        Arc::clone(&responder_bridge),
        Arc::clone(&storage),
        SyncOptions::default(),
    );

    responder.on_config_request(Arc::new(|| {
        let mut state = ConfigState::default();
        state.camera_fov = 75.0;
        state
    }));

    let received = Arc::new(AtomicUsize::new(0));
    let r = Arc::clone(&received);
    let _guard = requester.on_config_update(
        ConfigTopic::FullSync,
        Arc::new(move |payload| {
            assert_eq!(payload["cameraFov"], 75.0);
            r.fetch_add(1, Ordering::SeqCst);
        }),
    );

    // Broadcast form: the responder answers immediately, undebounced.
    requester.request_current_config(None);
    assert_eq!(received.load(Ordering::SeqCst), 1);

    // Addressed form needs the target registered as a live window.
    hub.register_window("model_config_window", Arc::new(|| {}));
    requester.request_current_config(Some("model_config_window"));
    assert_eq!(received.load(Ordering::SeqCst), 2);
}

#[test]
fn dispose_silences_the_request_responder() {
    let hub = EventHub::new();
    let requester_bridge =
        MessageBridge::new(crate::transport::EventTransport::new(Arc::clone(&hub), "main"));
    let responder_bridge = MessageBridge::new(crate::transport::EventTransport::new(
        Arc::clone(&hub),
        "model_config_window",
    ));
    let storage = temp_storage("dispose");
    let requester = ConfigSyncManager::new(
        Arc::clone(&requester_bridge),
        Arc::clone(&storage),
        SyncOptions::default(),
    );
    let responder = ConfigSyncManager::new(
        Arc::clone(&responder_bridge),
        Arc::clone(&storage),
        SyncOptions::default(),
    );
    responder.on_config_request(Arc::new(ConfigState::default));

    let received = Arc::new(AtomicUsize::new(0));
    let r = Arc::clone(&received);
    let _guard = requester.on_config_update(
        ConfigTopic::FullSync,
        Arc::new(move |_| {
            r.fetch_add(1, Ordering::SeqCst);
        }),
    );

    responder.dispose();
    requester.request_current_config(None);
    assert_eq!(received.load(Ordering::SeqCst), 0);
    responder.dispose();
}
