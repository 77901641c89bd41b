// src/storage/settings.rs
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::selection::SelectionPersist;

/// Operator settings that survive restarts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_key: Option<String>,
    pub region: String,
    pub max_threads: usize,
    pub auto_connect: bool,
    pub selected_maps: Option<Vec<String>>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: None,
            region: "44".to_string(),
            max_threads: 50,
            auto_connect: false,
            selected_maps: None,
        }
    }
}

#[derive(Debug)]
pub enum SettingsError {
    Io(io::Error),
    Json(serde_json::Error),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "settings file I/O failed: {}", e),
            Self::Json(e) => write!(f, "settings could not be encoded: {}", e),
        }
    }
}

impl std::error::Error for SettingsError {}

impl From<io::Error> for SettingsError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for SettingsError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

/// JSON-file backed settings. Every update rewrites the whole file.
pub struct SettingsFile {
    path: PathBuf,
    current: Mutex<Settings>,
}

impl SettingsFile {
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let current = match fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<Settings>(&text) {
                Ok(settings) => settings,
                Err(e) => {
                    warn!("Ignoring unreadable settings in {}: {}", path.display(), e);
                    Settings::default()
                }
            },
            Err(e) => {
                debug!("No settings at {} ({}), using defaults", path.display(), e);
                Settings::default()
            }
        };

        Self {
            path,
            current: Mutex::new(current),
        }
    }

    pub fn get(&self) -> Settings {
        self.current.lock().clone()
    }

    pub fn update<F>(&self, change: F) -> Result<(), SettingsError>
    where
        F: FnOnce(&mut Settings),
    {
        let mut current = self.current.lock();
        let mut next = current.clone();
        change(&mut next);
        let text = serde_json::to_string_pretty(&next)?;
        fs::write(&self.path, text)?;
        *current = next;
        Ok(())
    }
}

impl SelectionPersist for SettingsFile {
    fn persist(&self, maps: &[String]) -> Result<(), SettingsError> {
        self.update(|settings| settings.selected_maps = Some(maps.to_vec()))
    }
}
