//! Window roles and the catch-up trigger.
//!
//! Two well-known labels exist; role is an exact label match, never a
//! handshake. When a window of either role becomes active it pulls the
//! current config from its peer, which is how a late joiner catches up
//! without a persisted source of truth.

use std::sync::Arc;

use crate::config::{CONFIG_LABEL, VIEWER_LABEL};
use crate::sync::ConfigSyncManager;
use crate::transport::EventTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowRole {
    Viewer,
    Config,
    Unknown,
}

#[must_use]
pub fn role_for_label(label: &str) -> WindowRole {
    if label == VIEWER_LABEL {
        WindowRole::Viewer
    } else if label == CONFIG_LABEL {
        WindowRole::Config
    } else {
        WindowRole::Unknown
    }
}

pub struct WindowStateCoordinator {
    transport: EventTransport,
    sync: Arc<ConfigSyncManager>,
}

impl WindowStateCoordinator {
    #[must_use]
    pub fn new(transport: EventTransport, sync: Arc<ConfigSyncManager>) -> Self {
        Self { transport, sync }
    }

    #[must_use]
    pub fn current_role(&self) -> WindowRole {
        role_for_label(self.transport.label())
    }

    /// Sends an addressed config request to `label` if that window currently
    /// exists. Returns whether a request went out.
    pub fn request_config_from(&self, label: &str) -> bool {
        if !self.transport.window_exists(label) {
            return false;
        }
        self.sync.request_current_config(Some(label));
        true
    }

    /// Pulls current config from the peer window: the viewer asks the config
    /// window and vice versa. Unknown roles do nothing.
    pub fn sync_from_other_window(&self) -> bool {
        match self.current_role() {
            WindowRole::Viewer => self.request_config_from(CONFIG_LABEL),
            WindowRole::Config => self.request_config_from(VIEWER_LABEL),
            WindowRole::Unknown => false,
        }
    }

    /// Shows and focuses the configuration window (tray and viewer-UI entry
    /// point). Warns and no-ops when the window is not live.
    pub fn focus_config_window(&self) {
        self.transport.focus_window(CONFIG_LABEL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_match_exact_labels_only() {
        assert_eq!(role_for_label("main"), WindowRole::Viewer);
        assert_eq!(role_for_label("model_config_window"), WindowRole::Config);
        assert_eq!(role_for_label("Main"), WindowRole::Unknown);
        assert_eq!(role_for_label(""), WindowRole::Unknown);
    }
}
