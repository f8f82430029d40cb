//! Authoritative in-window model configuration and its sync protocol.
//!
//! The state is mutated only through named actions; every local action ends
//! by handing the changed slice to the sync manager, so each mutation has a
//! matching broadcast. Inbound messages are applied through explicit
//! per-slice functions and never re-broadcast — the bridge's echo filter
//! guarantees a window never sees its own update, and the store guarantees
//! applying a peer's update stays silent, so the two-window loop terminates
//! after one hop.
//!
//! A window starts `Defaulted` and becomes `Synced` on its first full sync
//! (inbound or loaded from storage). Only an explicit reset goes back.

use std::sync::{Arc, Mutex, Weak};

use serde::{Deserialize, Serialize};

use crate::bridge::{unix_millis, ListenerGuard};
use crate::config::MODEL_CONFIG_KEY;
use crate::storage::Storage;
use crate::sync::{ConfigSyncManager, ConfigTopic};

// ---------------------------------------------------------------------------
// Data model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LightKind {
    Ambient,
    Directional,
    Point,
    Spot,
}

impl LightKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            LightKind::Ambient => "ambient",
            LightKind::Directional => "directional",
            LightKind::Point => "point",
            LightKind::Spot => "spot",
        }
    }

    #[must_use]
    const fn display_name(self) -> &'static str {
        match self {
            LightKind::Ambient => "Ambient Light",
            LightKind::Directional => "Directional Light",
            LightKind::Point => "Point Light",
            LightKind::Spot => "Spot Light",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// One light in the scene. Optional fields are only meaningful for some
/// kinds (target: directional/spot; angle/penumbra: spot; decay/distance:
/// spot/point) and stay absent on the wire otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Light {
    /// Unique within `lights`, never reused: `{kind}-{unix_millis}`.
    pub id: String,
    #[serde(rename = "type")]
    pub kind: LightKind,
    pub name: String,
    pub intensity: f64,
    pub color: String,
    pub position: Vec3,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Vec3>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angle: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub penumbra: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decay: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    pub enabled: bool,
}

/// The synchronized aggregate. camelCase on the wire and in storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigState {
    pub lights: Vec<Light>,
    pub model_scale: f64,
    pub model_auto_rotate: bool,
    pub model_float_animation: bool,
    pub camera_distance: f64,
    pub camera_fov: f64,
    /// Color literal or the sentinel `"transparent"`.
    pub background_color: String,
    pub rotation_speed: f64,
}

fn default_lights() -> Vec<Light> {
    vec![
        Light {
            id: "ambient-1".to_string(),
            kind: LightKind::Ambient,
            name: "Ambient Light".to_string(),
            intensity: 0.4,
            color: "#ffffff".to_string(),
            position: Vec3::new(0.0, 0.0, 0.0),
            target: None,
            angle: None,
            penumbra: None,
            decay: None,
            distance: None,
            enabled: true,
        },
        Light {
            id: "directional-1".to_string(),
            kind: LightKind::Directional,
            name: "Key Light".to_string(),
            intensity: 1.6,
            color: "#ffffff".to_string(),
            position: Vec3::new(1.0, 1.0, 1.0),
            target: Some(Vec3::new(0.0, 0.0, 0.0)),
            angle: None,
            penumbra: None,
            decay: None,
            distance: None,
            enabled: true,
        },
    ]
}

impl Default for ConfigState {
    fn default() -> Self {
        Self {
            lights: default_lights(),
            model_scale: 3.0,
            model_auto_rotate: false,
            model_float_animation: true,
            camera_distance: 5.0,
            camera_fov: 45.0,
            background_color: "transparent".to_string(),
            rotation_speed: 0.003,
        }
    }
}

// ---------------------------------------------------------------------------
// Slices and patches
// ---------------------------------------------------------------------------

/// Light topic payload: always the whole list, never a diff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightSlice {
    pub lights: Vec<Light>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSlice {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_scale: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_auto_rotate: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_float_animation: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraSlice {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera_distance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera_fov: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundSlice {
    pub background_color: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimationSlice {
    pub rotation_speed: f64,
}

/// Per-field patch for one light (absent fields untouched).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LightPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub intensity: Option<f64>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub position: Option<Vec3>,
    #[serde(default)]
    pub target: Option<Vec3>,
    #[serde(default)]
    pub angle: Option<f64>,
    #[serde(default)]
    pub penumbra: Option<f64>,
    #[serde(default)]
    pub decay: Option<f64>,
    #[serde(default)]
    pub distance: Option<f64>,
    #[serde(default)]
    pub enabled: Option<bool>,
}

/// Lenient whole-state patch used for full syncs and storage loads.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatePatch {
    #[serde(default)]
    lights: Option<Vec<Light>>,
    #[serde(default)]
    model_scale: Option<f64>,
    #[serde(default)]
    model_auto_rotate: Option<bool>,
    #[serde(default)]
    model_float_animation: Option<bool>,
    #[serde(default)]
    camera_distance: Option<f64>,
    #[serde(default)]
    camera_fov: Option<f64>,
    #[serde(default)]
    background_color: Option<String>,
    #[serde(default)]
    rotation_speed: Option<f64>,
}

/// Sync lifecycle of one window's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// Hardcoded defaults; no full sync seen yet.
    Defaulted,
    /// Caught up via an inbound full sync or a storage load.
    Synced,
}

// ---------------------------------------------------------------------------
// Legacy migration
// ---------------------------------------------------------------------------

/// Upgrades a pre-multi-light record (`lightIntensity`/`lightColor`, no
/// `lights` array) in place: ambient gets 20% of the old intensity,
/// directional 80%. Derivation is deterministic, so re-running it on the same
/// record yields the same lights; a record that already has `lights` is left
/// alone.
pub fn migrate_legacy_config(value: &mut serde_json::Value) {
    let Some(obj) = value.as_object_mut() else {
        return;
    };
    if obj.contains_key("lights") {
        return;
    }
    let Some(intensity) = obj.get("lightIntensity").and_then(serde_json::Value::as_f64) else {
        return;
    };
    let color = obj
        .get("lightColor")
        .and_then(serde_json::Value::as_str)
        .unwrap_or("#ffffff")
        .to_string();
    let position = obj
        .get("lightPosition")
        .cloned()
        .unwrap_or_else(|| serde_json::json!({"x": 1.0, "y": 1.0, "z": 1.0}));
    obj.insert(
        "lights".to_string(),
        serde_json::json!([
            {
                "id": "ambient-1",
                "type": "ambient",
                "name": "Ambient Light",
                "intensity": intensity * 0.2,
                "color": color,
                "position": {"x": 0.0, "y": 0.0, "z": 0.0},
                "enabled": true,
            },
            {
                "id": "directional-1",
                "type": "directional",
                "name": "Key Light",
                "intensity": intensity * 0.8,
                "color": color,
                "position": position,
                "target": {"x": 0.0, "y": 0.0, "z": 0.0},
                "enabled": true,
            },
        ]),
    );
}

/// Best-effort coercion for records written by older UIs that stored numbers
/// as strings.
fn coerce_numeric_fields(value: &mut serde_json::Value) {
    const NUMERIC: [&str; 5] = [
        "modelScale",
        "cameraDistance",
        "cameraFov",
        "rotationSpeed",
        "lightIntensity",
    ];
    let Some(obj) = value.as_object_mut() else {
        return;
    };
    for key in NUMERIC {
        if let Some(field) = obj.get_mut(key)
            && let Some(parsed) = field.as_str().and_then(|s| s.parse::<f64>().ok())
            && let Some(number) = serde_json::Number::from_f64(parsed)
        {
            *field = serde_json::Value::Number(number);
        }
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

pub type ChangeNotifier = Arc<dyn Fn(&ConfigState) + Send + Sync>;

pub struct ConfigStore {
    state: Mutex<ConfigState>,
    phase: Mutex<SyncPhase>,
    sync: Arc<ConfigSyncManager>,
    storage: Arc<Storage>,
    notifier: Mutex<Option<ChangeNotifier>>,
    guards: Mutex<Vec<ListenerGuard>>,
}

impl ConfigStore {
    pub fn new(sync: Arc<ConfigSyncManager>, storage: Arc<Storage>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(ConfigState::default()),
            phase: Mutex::new(SyncPhase::Defaulted),
            sync,
            storage,
            notifier: Mutex::new(None),
            guards: Mutex::new(Vec::new()),
        })
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, ConfigState> {
        self.state.lock().unwrap_or_else(|e| {
            log::error!("Config state mutex was poisoned, recovering");
            e.into_inner()
        })
    }

    fn set_phase(&self, phase: SyncPhase) {
        if let Ok(mut held) = self.phase.lock() {
            *held = phase;
        }
    }

    #[must_use]
    pub fn phase(&self) -> SyncPhase {
        self.phase
            .lock()
            .map(|p| *p)
            .unwrap_or(SyncPhase::Defaulted)
    }

    #[must_use]
    pub fn state(&self) -> ConfigState {
        self.lock_state().clone()
    }

    #[must_use]
    pub fn enabled_lights(&self) -> Vec<Light> {
        self.lock_state()
            .lights
            .iter()
            .filter(|l| l.enabled)
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn lights_count(&self) -> usize {
        self.lock_state().lights.len()
    }

    /// Installs the shell's push hook, invoked after every state change so
    /// the window's WebView can repaint with fresh state.
    pub fn set_change_notifier(&self, notifier: ChangeNotifier) {
        if let Ok(mut held) = self.notifier.lock() {
            *held = Some(notifier);
        }
    }

    fn notify(&self, snapshot: &ConfigState) {
        let notifier = self
            .notifier
            .lock()
            .ok()
            .and_then(|held| held.clone());
        if let Some(notifier) = notifier {
            notifier(snapshot);
        }
    }

    fn broadcast_lights(&self, snapshot: &ConfigState) {
        self.sync.sync_light_config(&LightSlice {
            lights: snapshot.lights.clone(),
        });
    }

    // -- local light actions ------------------------------------------------

    /// Appends a new light of `kind` with per-kind defaults and broadcasts
    /// the whole light list. Returns the generated id.
    pub fn add_light(&self, kind: LightKind) -> String {
        let snapshot = {
            let mut state = self.lock_state();
            let ordinal = state.lights.iter().filter(|l| l.kind == kind).count() + 1;
            let mut light = Light {
                id: format!("{}-{}", kind.as_str(), unix_millis()),
                kind,
                name: format!("{} {}", kind.display_name(), ordinal),
                intensity: 1.0,
                color: "#ffffff".to_string(),
                position: Vec3::new(1.0, 1.0, 1.0),
                target: None,
                angle: None,
                penumbra: None,
                decay: None,
                distance: None,
                enabled: true,
            };
            match kind {
                LightKind::Directional => {
                    light.target = Some(Vec3::new(0.0, 0.0, 0.0));
                }
                LightKind::Spot => {
                    light.target = Some(Vec3::new(0.0, 0.0, 0.0));
                    light.angle = Some(std::f64::consts::FRAC_PI_4);
                    light.penumbra = Some(0.1);
                    light.decay = Some(2.0);
                    light.distance = Some(0.0);
                }
                LightKind::Point => {
                    light.decay = Some(2.0);
                    light.distance = Some(0.0);
                }
                LightKind::Ambient => {}
            }
            state.lights.push(light);
            state.clone()
        };
        let id = snapshot
            .lights
            .last()
            .map(|l| l.id.clone())
            .unwrap_or_default();
        self.broadcast_lights(&snapshot);
        self.notify(&snapshot);
        id
    }

    /// Removes the light with `id`. Unknown ids are a silent no-op: nothing
    /// mutates and nothing is broadcast.
    pub fn remove_light(&self, id: &str) -> bool {
        let snapshot = {
            let mut state = self.lock_state();
            let Some(index) = state.lights.iter().position(|l| l.id == id) else {
                return false;
            };
            state.lights.remove(index);
            state.clone()
        };
        self.broadcast_lights(&snapshot);
        self.notify(&snapshot);
        true
    }

    /// Applies a per-field patch to one light.
    pub fn update_light(&self, id: &str, patch: &LightPatch) -> bool {
        let snapshot = {
            let mut state = self.lock_state();
            let Some(light) = state.lights.iter_mut().find(|l| l.id == id) else {
                return false;
            };
            if let Some(name) = &patch.name {
                light.name = name.clone();
            }
            if let Some(intensity) = patch.intensity {
                light.intensity = intensity.max(0.0);
            }
            if let Some(color) = &patch.color {
                light.color = color.clone();
            }
            if let Some(position) = patch.position {
                light.position = position;
            }
            if let Some(target) = patch.target {
                light.target = Some(target);
            }
            if let Some(angle) = patch.angle {
                light.angle = Some(angle);
            }
            if let Some(penumbra) = patch.penumbra {
                light.penumbra = Some(penumbra);
            }
            if let Some(decay) = patch.decay {
                light.decay = Some(decay);
            }
            if let Some(distance) = patch.distance {
                light.distance = Some(distance);
            }
            if let Some(enabled) = patch.enabled {
                light.enabled = enabled;
            }
            state.clone()
        };
        self.broadcast_lights(&snapshot);
        self.notify(&snapshot);
        true
    }

    pub fn update_light_position(&self, id: &str, position: Vec3) -> bool {
        self.update_light(
            id,
            &LightPatch {
                position: Some(position),
                ..LightPatch::default()
            },
        )
    }

    /// Moves a light's target. Only directional and spot lights have one;
    /// other kinds are left untouched.
    pub fn update_light_target(&self, id: &str, target: Vec3) -> bool {
        let snapshot = {
            let mut state = self.lock_state();
            let Some(light) = state.lights.iter_mut().find(|l| l.id == id) else {
                return false;
            };
            if !matches!(light.kind, LightKind::Directional | LightKind::Spot) {
                return false;
            }
            light.target = Some(target);
            state.clone()
        };
        self.broadcast_lights(&snapshot);
        self.notify(&snapshot);
        true
    }

    pub fn toggle_light(&self, id: &str) -> bool {
        let snapshot = {
            let mut state = self.lock_state();
            let Some(light) = state.lights.iter_mut().find(|l| l.id == id) else {
                return false;
            };
            light.enabled = !light.enabled;
            state.clone()
        };
        self.broadcast_lights(&snapshot);
        self.notify(&snapshot);
        true
    }

    // -- local scalar actions ----------------------------------------------

    /// Applies the given model fields and broadcasts the complete model slice
    /// (receivers always see all three values).
    pub fn update_model_config(&self, patch: &ModelSlice) {
        let snapshot = {
            let mut state = self.lock_state();
            if let Some(scale) = patch.model_scale {
                state.model_scale = scale;
            }
            if let Some(auto_rotate) = patch.model_auto_rotate {
                state.model_auto_rotate = auto_rotate;
            }
            if let Some(float) = patch.model_float_animation {
                state.model_float_animation = float;
            }
            state.clone()
        };
        self.sync.sync_model_config(&ModelSlice {
            model_scale: Some(snapshot.model_scale),
            model_auto_rotate: Some(snapshot.model_auto_rotate),
            model_float_animation: Some(snapshot.model_float_animation),
        });
        self.notify(&snapshot);
    }

    pub fn update_camera_config(&self, patch: &CameraSlice) {
        let snapshot = {
            let mut state = self.lock_state();
            if let Some(distance) = patch.camera_distance {
                state.camera_distance = distance;
            }
            if let Some(fov) = patch.camera_fov {
                state.camera_fov = fov;
            }
            state.clone()
        };
        self.sync.sync_camera_config(&CameraSlice {
            camera_distance: Some(snapshot.camera_distance),
            camera_fov: Some(snapshot.camera_fov),
        });
        self.notify(&snapshot);
    }

    pub fn update_background(&self, color: &str) {
        let snapshot = {
            let mut state = self.lock_state();
            state.background_color = color.to_string();
            state.clone()
        };
        self.sync.sync_background_config(&BackgroundSlice {
            background_color: snapshot.background_color.clone(),
        });
        self.notify(&snapshot);
    }

    pub fn update_rotation_speed(&self, speed: f64) {
        let snapshot = {
            let mut state = self.lock_state();
            state.rotation_speed = speed;
            state.clone()
        };
        self.sync.sync_animation_config(&AnimationSlice {
            rotation_speed: snapshot.rotation_speed,
        });
        self.notify(&snapshot);
    }

    // -- persistence and lifecycle ------------------------------------------

    /// Serializes the full state under `modelConfig` and broadcasts a full
    /// sync.
    pub fn save_to_storage(&self) {
        let snapshot = self.state();
        match serde_json::to_value(&snapshot) {
            Ok(value) => self.storage.set(MODEL_CONFIG_KEY, value),
            Err(e) => log::warn!("Failed to serialize config for storage: {e}"),
        }
        self.sync.sync_full_config(&snapshot);
    }

    /// Loads the persisted record, migrating the legacy single-light schema
    /// on the way in. Returns false (keeping defaults) when nothing is stored
    /// or the record does not parse; a successful load flips the phase to
    /// `Synced` and broadcasts a full sync.
    pub fn load_from_storage(&self) -> bool {
        let Some(mut value) = self.storage.get(MODEL_CONFIG_KEY) else {
            return false;
        };
        migrate_legacy_config(&mut value);
        coerce_numeric_fields(&mut value);
        let patch: StatePatch = match serde_json::from_value(value) {
            Ok(patch) => patch,
            Err(e) => {
                log::warn!("Stored config did not parse, keeping defaults: {e}");
                return false;
            }
        };
        let snapshot = {
            let mut state = self.lock_state();
            apply_state_patch(&mut state, patch);
            state.clone()
        };
        self.set_phase(SyncPhase::Synced);
        self.sync.sync_full_config(&snapshot);
        self.notify(&snapshot);
        true
    }

    /// Back to hardcoded defaults (and the `Defaulted` phase), broadcast as a
    /// full sync so the peer follows.
    pub fn reset_to_defaults(&self) {
        let snapshot = {
            let mut state = self.lock_state();
            *state = ConfigState::default();
            state.clone()
        };
        self.set_phase(SyncPhase::Defaulted);
        self.sync.sync_full_config(&snapshot);
        self.notify(&snapshot);
    }

    // -- inbound wiring -----------------------------------------------------

    /// Subscribes the per-topic apply handlers and registers this window as a
    /// catch-up responder. Inbound application never broadcasts; that is what
    /// keeps the two-window exchange convergent.
    pub fn init_sync(self: &Arc<Self>) {
        let mut guards = Vec::new();

        let store = Arc::downgrade(self);
        guards.push(self.sync.on_config_update(
            ConfigTopic::Light,
            Arc::new(move |payload| {
                apply_inbound(&store, payload, |state, slice: LightSlice| {
                    state.lights = slice.lights;
                });
            }),
        ));

        let store = Arc::downgrade(self);
        guards.push(self.sync.on_config_update(
            ConfigTopic::Model,
            Arc::new(move |payload| {
                apply_inbound(&store, payload, |state, slice: ModelSlice| {
                    if let Some(scale) = slice.model_scale {
                        state.model_scale = scale;
                    }
                    if let Some(auto_rotate) = slice.model_auto_rotate {
                        state.model_auto_rotate = auto_rotate;
                    }
                    if let Some(float) = slice.model_float_animation {
                        state.model_float_animation = float;
                    }
                });
            }),
        ));

        let store = Arc::downgrade(self);
        guards.push(self.sync.on_config_update(
            ConfigTopic::Camera,
            Arc::new(move |payload| {
                apply_inbound(&store, payload, |state, slice: CameraSlice| {
                    if let Some(distance) = slice.camera_distance {
                        state.camera_distance = distance;
                    }
                    if let Some(fov) = slice.camera_fov {
                        state.camera_fov = fov;
                    }
                });
            }),
        ));

        let store = Arc::downgrade(self);
        guards.push(self.sync.on_config_update(
            ConfigTopic::Background,
            Arc::new(move |payload| {
                apply_inbound(&store, payload, |state, slice: BackgroundSlice| {
                    state.background_color = slice.background_color;
                });
            }),
        ));

        let store = Arc::downgrade(self);
        guards.push(self.sync.on_config_update(
            ConfigTopic::Animation,
            Arc::new(move |payload| {
                apply_inbound(&store, payload, |state, slice: AnimationSlice| {
                    state.rotation_speed = slice.rotation_speed;
                });
            }),
        ));

        // Full sync additionally marks the window caught up.
        let store = Arc::downgrade(self);
        guards.push(self.sync.on_config_update(
            ConfigTopic::FullSync,
            Arc::new(move |payload| {
                let Some(store) = store.upgrade() else { return };
                let patch: StatePatch = match serde_json::from_value(payload.clone()) {
                    Ok(patch) => patch,
                    Err(e) => {
                        log::warn!("Discarding malformed full sync: {e}");
                        return;
                    }
                };
                let snapshot = {
                    let mut state = store.lock_state();
                    apply_state_patch(&mut state, patch);
                    state.clone()
                };
                store.set_phase(SyncPhase::Synced);
                store.notify(&snapshot);
            }),
        ));

        let store = Arc::downgrade(self);
        self.sync.on_config_request(Arc::new(move || {
            store
                .upgrade()
                .map(|s| s.state())
                .unwrap_or_default()
        }));

        if let Ok(mut held) = self.guards.lock() {
            held.extend(guards);
        }
    }

    /// Unsubscribes the inbound handlers. Idempotent; for window teardown.
    pub fn dispose(&self) {
        if let Ok(mut held) = self.guards.lock() {
            for guard in held.drain(..) {
                guard.unsubscribe();
            }
        }
    }
}

/// Shared shape of the slice handlers: parse, mutate under the lock, notify.
/// Never broadcasts.
fn apply_inbound<S, F>(store: &Weak<ConfigStore>, payload: &serde_json::Value, apply: F)
where
    S: serde::de::DeserializeOwned,
    F: FnOnce(&mut ConfigState, S),
{
    let Some(store) = store.upgrade() else { return };
    let slice: S = match serde_json::from_value(payload.clone()) {
        Ok(slice) => slice,
        Err(e) => {
            log::warn!("Discarding malformed config slice: {e}");
            return;
        }
    };
    let snapshot = {
        let mut state = store.lock_state();
        apply(&mut state, slice);
        state.clone()
    };
    store.notify(&snapshot);
}

fn apply_state_patch(state: &mut ConfigState, patch: StatePatch) {
    if let Some(lights) = patch.lights {
        state.lights = lights;
    }
    if let Some(scale) = patch.model_scale {
        state.model_scale = scale;
    }
    if let Some(auto_rotate) = patch.model_auto_rotate {
        state.model_auto_rotate = auto_rotate;
    }
    if let Some(float) = patch.model_float_animation {
        state.model_float_animation = float;
    }
    if let Some(distance) = patch.camera_distance {
        state.camera_distance = distance;
    }
    if let Some(fov) = patch.camera_fov {
        state.camera_fov = fov;
    }
    if let Some(background) = patch.background_color {
        state.background_color = background;
    }
    if let Some(speed) = patch.rotation_speed {
        state.rotation_speed = speed;
    }
}
