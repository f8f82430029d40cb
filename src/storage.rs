//! Persistent app state (JSON in the user data dir).
//!
//! One `config.json` holds per-window bounds plus a flat key→value map; the
//! sync layer uses exactly one key, `modelConfig`. Writes are read-merge-write
//! with no locking: both windows share the file by convention and the last
//! writer wins, which the sync protocol tolerates because full syncs overwrite
//! stale partial merges. A corrupt file is logged and treated as empty.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

const STORAGE_FILENAME: &str = "config.json";

/// Window bounds for persistence (physical position and size).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowBounds {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StorageFile {
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    windows: HashMap<String, WindowBounds>,
    #[serde(flatten)]
    data: HashMap<String, serde_json::Value>,
}

/// File-backed key-value store shared by both windows.
pub struct Storage {
    path: PathBuf,
}

impl Storage {
    #[must_use]
    pub fn new(dir: PathBuf) -> Self {
        Self {
            path: dir.join(STORAGE_FILENAME),
        }
    }

    fn load(&self) -> StorageFile {
        let Ok(content) = fs::read_to_string(&self.path) else {
            return StorageFile::default();
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            log::warn!("Corrupt storage file, starting empty: {e}");
            StorageFile::default()
        })
    }

    fn save(&self, file: &StorageFile) {
        if let Some(parent) = self.path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        match serde_json::to_string_pretty(file) {
            Ok(json) => {
                if let Err(e) = fs::write(&self.path, json) {
                    log::warn!("Failed to write storage file: {e}");
                }
            }
            Err(e) => log::warn!("Failed to serialize storage file: {e}"),
        }
    }

    /// Reads one key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        let mut file = self.load();
        file.data.remove(key)
    }

    /// Writes one key, replacing any previous value.
    pub fn set(&self, key: &str, value: serde_json::Value) {
        let mut file = self.load();
        file.data.insert(key.to_string(), value);
        self.save(&file);
    }

    /// Merges the top-level fields of `partial` into the object stored under
    /// `key` (read-merge-write, not transactional). Non-object values replace
    /// the record wholesale.
    pub fn merge(&self, key: &str, partial: &serde_json::Value) {
        let mut file = self.load();
        let entry = file
            .data
            .entry(key.to_string())
            .or_insert_with(|| serde_json::json!({}));
        match (entry.as_object_mut(), partial.as_object()) {
            (Some(existing), Some(incoming)) => {
                for (k, v) in incoming {
                    existing.insert(k.clone(), v.clone());
                }
            }
            _ => *entry = partial.clone(),
        }
        self.save(&file);
    }

    /// Saves one window's bounds and persists.
    pub fn save_window_bounds(&self, label: &str, bounds: WindowBounds) {
        let mut file = self.load();
        file.windows.insert(label.to_string(), bounds);
        self.save(&file);
    }

    /// Returns saved bounds for one window, if any.
    #[must_use]
    pub fn load_window_bounds(&self, label: &str) -> Option<WindowBounds> {
        self.load().windows.get(label).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_storage(name: &str) -> Storage {
        let dir = std::env::temp_dir().join(format!(
            "modelview-storage-{name}-{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        Storage::new(dir)
    }

    #[test]
    fn set_then_get_roundtrips() {
        let storage = temp_storage("roundtrip");
        storage.set("modelConfig", serde_json::json!({"modelScale": 3.0}));
        let value = storage.get("modelConfig").expect("stored");
        assert_eq!(value["modelScale"], 3.0);
    }

    #[test]
    fn merge_updates_only_named_fields() {
        let storage = temp_storage("merge");
        storage.set(
            "modelConfig",
            serde_json::json!({"modelScale": 3.0, "cameraFov": 45.0}),
        );
        storage.merge("modelConfig", &serde_json::json!({"cameraFov": 60.0}));
        let value = storage.get("modelConfig").expect("stored");
        assert_eq!(value["modelScale"], 3.0);
        assert_eq!(value["cameraFov"], 60.0);
    }

    #[test]
    fn merge_into_missing_key_creates_record() {
        let storage = temp_storage("merge-missing");
        storage.merge("modelConfig", &serde_json::json!({"rotationSpeed": 0.01}));
        let value = storage.get("modelConfig").expect("stored");
        assert_eq!(value["rotationSpeed"], 0.01);
    }

    #[test]
    fn corrupt_file_reads_as_empty() {
        let storage = temp_storage("corrupt");
        if let Some(parent) = storage.path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&storage.path, "{not json").unwrap();
        assert!(storage.get("modelConfig").is_none());
        // And a subsequent write recovers the file.
        storage.set("modelConfig", serde_json::json!({"cameraFov": 45.0}));
        assert!(storage.get("modelConfig").is_some());
    }

    #[test]
    fn window_bounds_roundtrip_per_label() {
        let storage = temp_storage("bounds");
        storage.save_window_bounds(
            "main",
            WindowBounds {
                x: 10,
                y: 20,
                width: 800,
                height: 600,
            },
        );
        assert!(storage.load_window_bounds("model_config_window").is_none());
        let bounds = storage.load_window_bounds("main").expect("saved");
        assert_eq!((bounds.x, bounds.y), (10, 20));
        assert_eq!((bounds.width, bounds.height), (800, 600));
    }
}
