//! Typed IPC between webview and host: JSON envelope, single entry point, no string dispatch.
//!
//! The UI sends `{ id, name, ...args }`; the host returns `{ id, ok? | err? }`.
//! Invalid messages are ignored (no panic). Every command runs against the
//! window's own [`WindowContext`]; config mutations flow through the store so
//! each one is broadcast to the peer window.

use serde::{Deserialize, Serialize};

use crate::context::WindowContext;
use crate::store::{CameraSlice, LightKind, LightPatch, ModelSlice, SyncPhase, Vec3};

/// Incoming message: `id` (correlation) + flattened command (`name` + args).
#[derive(Debug, Clone, Deserialize)]
pub struct IpcEnvelope {
    pub id: String,
    #[serde(flatten)]
    pub command: Command,
}

/// Commands the UI can send. Tagged with `name` for deserialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "name")]
pub enum Command {
    Ping,
    GetVersion,
    /// Current state snapshot plus sync phase.
    ReadConfig,
    AddLight {
        kind: LightKind,
    },
    RemoveLight {
        id: String,
    },
    UpdateLight {
        id: String,
        patch: LightPatch,
    },
    UpdateLightPosition {
        id: String,
        position: Vec3,
    },
    UpdateLightTarget {
        id: String,
        target: Vec3,
    },
    ToggleLight {
        id: String,
    },
    UpdateModelConfig {
        config: ModelSlice,
    },
    UpdateCameraConfig {
        config: CameraSlice,
    },
    UpdateBackground {
        color: String,
    },
    UpdateRotationSpeed {
        speed: f64,
    },
    ResetConfig,
    SaveConfig,
    LoadConfig,
    /// Pull current config from the peer window (late-joiner catch-up).
    RequestSync,
    ShowConfigWindow,
    OpenModelDialog,
}

/// Outgoing response correlated by `id`. Exactly one of `ok` or `err` is set.
#[derive(Debug, Clone, Serialize)]
pub struct IpcResponse {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ok: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub err: Option<String>,
}

impl IpcResponse {
    #[must_use]
    pub fn ok(id: String, data: serde_json::Value) -> Self {
        Self {
            id,
            ok: Some(data),
            err: None,
        }
    }

    #[must_use]
    pub fn err(id: String, message: String) -> Self {
        Self {
            id,
            ok: None,
            err: Some(message),
        }
    }
}

/// True for commands that may block (dialogs). Run these on a worker thread.
#[must_use]
pub fn is_blocking_command(command: &Command) -> bool {
    matches!(command, Command::OpenModelDialog)
}

/// Parses a raw IPC message. Invalid JSON or missing required fields return
/// `None` (ignored safely).
#[must_use]
pub fn parse_message(raw: &str) -> Option<IpcEnvelope> {
    serde_json::from_str(raw).ok()
}

fn state_json(ctx: &WindowContext) -> Result<serde_json::Value, String> {
    serde_json::to_value(ctx.store.state()).map_err(|e| e.to_string())
}

/// Handles one command synchronously. Returns a JSON-serializable value on
/// success or an error string.
pub fn handle_command(ctx: &WindowContext, command: &Command) -> Result<serde_json::Value, String> {
    match command {
        Command::Ping => Ok(serde_json::json!({ "pong": true })),
        Command::GetVersion => Ok(serde_json::json!({ "version": env!("CARGO_PKG_VERSION") })),
        Command::ReadConfig => {
            let phase = match ctx.store.phase() {
                SyncPhase::Defaulted => "defaulted",
                SyncPhase::Synced => "synced",
            };
            let enabled = ctx
                .store
                .enabled_lights()
                .iter()
                .map(|l| l.id.clone())
                .collect::<Vec<_>>();
            Ok(serde_json::json!({
                "config": state_json(ctx)?,
                "phase": phase,
                "lightsCount": ctx.store.lights_count(),
                "enabledLights": enabled,
            }))
        }
        Command::AddLight { kind } => {
            let id = ctx.store.add_light(*kind);
            Ok(serde_json::json!({ "id": id, "config": state_json(ctx)? }))
        }
        Command::RemoveLight { id } => {
            let removed = ctx.store.remove_light(id);
            Ok(serde_json::json!({ "removed": removed }))
        }
        Command::UpdateLight { id, patch } => {
            let updated = ctx.store.update_light(id, patch);
            Ok(serde_json::json!({ "updated": updated }))
        }
        Command::UpdateLightPosition { id, position } => {
            let updated = ctx.store.update_light_position(id, *position);
            Ok(serde_json::json!({ "updated": updated }))
        }
        Command::UpdateLightTarget { id, target } => {
            let updated = ctx.store.update_light_target(id, *target);
            Ok(serde_json::json!({ "updated": updated }))
        }
        Command::ToggleLight { id } => {
            let toggled = ctx.store.toggle_light(id);
            Ok(serde_json::json!({ "toggled": toggled }))
        }
        Command::UpdateModelConfig { config } => {
            ctx.store.update_model_config(config);
            Ok(serde_json::json!({ "updated": true }))
        }
        Command::UpdateCameraConfig { config } => {
            ctx.store.update_camera_config(config);
            Ok(serde_json::json!({ "updated": true }))
        }
        Command::UpdateBackground { color } => {
            ctx.store.update_background(color);
            Ok(serde_json::json!({ "updated": true }))
        }
        Command::UpdateRotationSpeed { speed } => {
            ctx.store.update_rotation_speed(*speed);
            Ok(serde_json::json!({ "updated": true }))
        }
        Command::ResetConfig => {
            ctx.store.reset_to_defaults();
            Ok(serde_json::json!({ "config": state_json(ctx)? }))
        }
        Command::SaveConfig => {
            ctx.store.save_to_storage();
            Ok(serde_json::json!({ "saved": true }))
        }
        Command::LoadConfig => {
            let loaded = ctx.store.load_from_storage();
            Ok(serde_json::json!({ "loaded": loaded, "config": state_json(ctx)? }))
        }
        Command::RequestSync => {
            let requested = ctx.coordinator.sync_from_other_window();
            Ok(serde_json::json!({ "requested": requested }))
        }
        Command::ShowConfigWindow => {
            ctx.coordinator.focus_config_window();
            Ok(serde_json::json!({ "shown": true }))
        }
        Command::OpenModelDialog => {
            let path = rfd::FileDialog::new()
                .add_filter("3D models", &["glb", "gltf", "obj", "fbx"])
                .pick_file();
            Ok(serde_json::json!({
                "path": path.map(|p| p.display().to_string())
            }))
        }
    }
}
