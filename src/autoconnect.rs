// src/autoconnect.rs
use std::sync::Arc;

use log::{error, info};

use crate::notices::{Level, NoticeLog};
use crate::storage::history::IngestOutcome;
use crate::storage::settings::{SettingsError, SettingsFile};

/// Anything interested in the transitions produced by a batch or push.
pub trait TransitionObserver: Send + Sync {
    fn observe(&self, outcome: &IngestOutcome);
}

/// One-shot hand-off: the first server seen switching to the unavailable map
/// while auto-connect is armed is announced with its connect URL, then the
/// flag is disarmed and persisted.
pub struct AutoConnect {
    settings: Arc<SettingsFile>,
    notices: Arc<NoticeLog>,
}

impl AutoConnect {
    pub fn new(settings: Arc<SettingsFile>, notices: Arc<NoticeLog>) -> Self {
        Self { settings, notices }
    }

    pub fn armed(&self) -> bool {
        self.settings.get().auto_connect
    }

    pub fn set_armed(&self, armed: bool) -> Result<(), SettingsError> {
        info!("Auto-connect {}", if armed { "armed" } else { "disarmed" });
        self.settings.update(|settings| settings.auto_connect = armed)
    }
}

impl TransitionObserver for AutoConnect {
    fn observe(&self, outcome: &IngestOutcome) {
        if !self.armed() {
            return;
        }
        let target = match outcome.became_unavailable.iter().find(|s| !s.addr.is_empty()) {
            Some(server) => server,
            None => return,
        };

        self.notices.push(
            Level::Success,
            format!(
                "Auto-connect to {}: steam://connect/{}",
                target.display_name(),
                target.addr
            ),
        );
        if let Err(e) = self.set_armed(false) {
            error!("Failed to persist auto-connect state: {}", e);
        }
    }
}
