//! Unit tests for protocol serving and IPC parsing.

use crate::config::UI;
use crate::ipc::{is_blocking_command, parse_message, Command};
use crate::protocol::{serve, ServeResult};

#[test]
fn serves_index_for_root_path() {
    match serve(&UI, "/") {
        ServeResult::Found { mime_type, body } => {
            assert_eq!(mime_type, "text/html");
            assert!(!body.is_empty());
        }
        ServeResult::NotFound => panic!("expected index.html"),
    }
}

#[test]
fn serves_config_page() {
    assert!(matches!(
        serve(&UI, "/config.html"),
        ServeResult::Found {
            mime_type: "text/html",
            ..
        }
    ));
}

#[test]
fn unknown_path_is_not_found() {
    assert!(matches!(serve(&UI, "/missing.js"), ServeResult::NotFound));
}

#[test]
fn rejects_path_traversal() {
    assert!(matches!(
        serve(&UI, "/../Cargo.toml"),
        ServeResult::NotFound
    ));
}

#[test]
fn parse_message_valid_ping() {
    let raw = r#"{"id":"abc-123","name":"Ping"}"#;
    let env = parse_message(raw).expect("valid");
    assert_eq!(env.id, "abc-123");
    assert!(matches!(env.command, Command::Ping));
}

#[test]
fn parse_message_add_light() {
    let raw = r#"{"id":"1","name":"AddLight","kind":"spot"}"#;
    let env = parse_message(raw).expect("valid");
    assert!(matches!(
        env.command,
        Command::AddLight {
            kind: crate::store::LightKind::Spot
        }
    ));
}

#[test]
fn parse_message_camera_update_with_partial_slice() {
    let raw = r#"{"id":"2","name":"UpdateCameraConfig","config":{"cameraFov":60}}"#;
    let env = parse_message(raw).expect("valid");
    match env.command {
        Command::UpdateCameraConfig { config } => {
            assert_eq!(config.camera_fov, Some(60.0));
            assert_eq!(config.camera_distance, None);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn parse_message_invalid_returns_none() {
    assert!(parse_message("").is_none());
    assert!(parse_message("{}").is_none());
    assert!(parse_message("not json").is_none());
    assert!(parse_message(r#"{"id":"x","name":"NoSuchCommand"}"#).is_none());
}

#[test]
fn only_dialogs_are_blocking() {
    assert!(is_blocking_command(&Command::OpenModelDialog));
    assert!(!is_blocking_command(&Command::Ping));
    assert!(!is_blocking_command(&Command::ReadConfig));
    assert!(!is_blocking_command(&Command::RequestSync));
    assert!(!is_blocking_command(&Command::SaveConfig));
}
