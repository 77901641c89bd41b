// src/notices.rs
use std::collections::VecDeque;

use log::{error, info, warn};
use parking_lot::Mutex;
use serde::Serialize;

use crate::storage::history::IngestOutcome;
use crate::utils::now_iso;

const NOTICE_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Success,
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct Notice {
    pub level: Level,
    pub message: String,
    pub at: String,
}

/// Bounded log of display events for the presentation layer.
pub struct NoticeLog {
    entries: Mutex<VecDeque<Notice>>,
    capacity: usize,
}

impl Default for NoticeLog {
    fn default() -> Self {
        Self::with_capacity(NOTICE_CAPACITY)
    }
}

impl NoticeLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&self, level: Level, message: impl Into<String>) {
        let message = message.into();
        match level {
            Level::Error => error!("{}", message),
            Level::Warning => warn!("{}", message),
            Level::Success | Level::Info => info!("{}", message),
        }

        let mut entries = self.entries.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(Notice {
            level,
            message,
            at: now_iso(),
        });
    }

    /// Newest first.
    pub fn recent(&self) -> Vec<Notice> {
        self.entries.lock().iter().rev().cloned().collect()
    }

    pub fn report_transitions(&self, outcome: &IngestOutcome, unavailable_map: &str) {
        if !outcome.became_unavailable.is_empty() {
            self.push(
                Level::Warning,
                format!(
                    "{} servers switched to {}",
                    outcome.became_unavailable.len(),
                    unavailable_map
                ),
            );
        }
        if !outcome.returned.is_empty() {
            self.push(
                Level::Success,
                format!(
                    "{} servers returned from {}",
                    outcome.returned.len(),
                    unavailable_map
                ),
            );
        }
    }
}
