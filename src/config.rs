//! Application configuration and compile-time constants.
//!
//! Centralizes window labels and dimensions, sync channel names, IPC limits,
//! and the embedded UI path so the rest of the crate stays decoupled from
//! concrete values.

use include_dir::include_dir;

/// Label of the model viewer window. Window role is determined by exact
/// label match, never negotiated.
pub const VIEWER_LABEL: &str = "main";

/// Label of the configuration window.
pub const CONFIG_LABEL: &str = "model_config_window";

/// Shared channel every cross-window broadcast rides on. Addressed delivery
/// uses per-window channels instead (see `bridge`).
pub const BROADCAST_CHANNEL: &str = "ipc-bridge:broadcast";

/// The single storage key holding the persisted model configuration.
pub const MODEL_CONFIG_KEY: &str = "modelConfig";

/// Default trailing-debounce delay for per-topic config sync, in milliseconds.
/// Slider drags coalesce to one broadcast per quiescent period.
pub const SYNC_DEBOUNCE_MS: u64 = 100;

/// Max pending IPC responses before dropping new ones (backpressure).
/// Also bounds IPC queue memory per window.
pub const MAX_PENDING_IPC: usize = 256;

/// Number of worker threads for blocking IPC commands (file dialogs).
pub const IPC_WORKER_POOL_SIZE: usize = 2;

/// Viewer window initial size (logical).
pub const VIEWER_WIDTH: f64 = 800.0;
pub const VIEWER_HEIGHT: f64 = 600.0;

/// Config window initial size (logical).
pub const CONFIG_WIDTH: f64 = 900.0;
pub const CONFIG_HEIGHT: f64 = 700.0;

/// Minimum window size (logical), both windows.
pub const WINDOW_MIN_WIDTH: f64 = 400.0;
pub const WINDOW_MIN_HEIGHT: f64 = 300.0;

/// Seconds to wait before showing a window if its first page load never fires.
pub const SHOW_WINDOW_FALLBACK_SECS: u64 = 3;

/// Env var: set to `"1"` to enable WebView DevTools.
pub const ENV_DEVTOOLS: &str = "MODELVIEW_DEVTOOLS";

/// Embedded UI directory (viewer `index.html` and config `config.html`).
pub static UI: include_dir::Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/ui/dist");
