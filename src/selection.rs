// src/selection.rs
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use lazy_static::lazy_static;
use log::{error, info};
use serde::Serialize;

use crate::storage::settings::SettingsError;

/// Every map the tool knows how to scan, in display order.
pub const MAP_CATALOG: &[&str] = &[
    // Premier / competitive
    "de_ancient",
    "de_dust2",
    "de_inferno",
    "de_mirage",
    "de_nuke",
    "de_overpass",
    "de_train",
    "de_vertigo",
    "de_anubis",
    "de_grail",
    "de_jura",
    // Wingman
    "de_brewery",
    "de_dogtown",
    // Legacy
    "de_cache",
    "de_dust",
    "de_office",
    "de_italy",
    "de_cobblestone",
    "de_aztec",
];

pub const POPULAR_MAPS: &[&str] = &[
    "de_dust2",
    "de_mirage",
    "de_inferno",
    "de_nuke",
    "de_overpass",
    "de_ancient",
    "de_vertigo",
    "de_train",
    "de_anubis",
    "de_grail",
    "de_jura",
    "de_brewery",
    "de_dogtown",
];

lazy_static! {
    static ref CATALOG: HashSet<&'static str> = MAP_CATALOG.iter().copied().collect();
}

pub fn is_catalog_map(map: &str) -> bool {
    CATALOG.contains(map)
}

pub trait SelectionPersist: Send + Sync {
    fn persist(&self, maps: &[String]) -> Result<(), SettingsError>;
}

pub trait SelectionPropagate: Send + Sync {
    fn propagate(&self, maps: &[String]);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Coverage {
    None,
    Partial,
    All,
}

#[derive(Debug, Clone, Serialize)]
pub struct SelectionStats {
    pub total: usize,
    pub selected: usize,
    pub percentage: u32,
    pub status: Coverage,
}

/// The operator's set of maps to scan. Every mutation is persisted and then
/// pushed to the scanner, even when it changes nothing.
pub struct MapSelection {
    maps: BTreeSet<String>,
    persist: Arc<dyn SelectionPersist>,
    propagate: Arc<dyn SelectionPropagate>,
}

impl MapSelection {
    pub fn new(
        initial: Option<Vec<String>>,
        persist: Arc<dyn SelectionPersist>,
        propagate: Arc<dyn SelectionPropagate>,
    ) -> Self {
        let maps = match initial {
            Some(maps) => maps.into_iter().collect(),
            None => MAP_CATALOG.iter().map(|m| m.to_string()).collect(),
        };
        Self {
            maps,
            persist,
            propagate,
        }
    }

    pub fn maps(&self) -> Vec<String> {
        self.maps.iter().cloned().collect()
    }

    pub fn contains(&self, map: &str) -> bool {
        self.maps.contains(map)
    }

    pub fn select_all(&mut self) -> Result<(), SettingsError> {
        self.maps = MAP_CATALOG.iter().map(|m| m.to_string()).collect();
        info!("Selected all {} maps", self.maps.len());
        self.commit()
    }

    pub fn select_none(&mut self) -> Result<(), SettingsError> {
        self.maps.clear();
        info!("Cleared map selection");
        self.commit()
    }

    pub fn select_popular(&mut self) -> Result<(), SettingsError> {
        self.maps = POPULAR_MAPS.iter().map(|m| m.to_string()).collect();
        info!("Selected {} popular maps", self.maps.len());
        self.commit()
    }

    /// Flips one map. Returns whether it is selected afterwards.
    pub fn toggle(&mut self, map: &str) -> Result<bool, SettingsError> {
        let selected = if self.maps.remove(map) {
            false
        } else {
            self.maps.insert(map.to_string());
            true
        };
        info!("Map {} {}", map, if selected { "selected" } else { "deselected" });
        self.commit().map(|_| selected)
    }

    pub fn stats(&self) -> SelectionStats {
        let total = MAP_CATALOG.len();
        let selected = self.maps.len();
        let percentage = if total == 0 {
            0
        } else {
            ((selected as f64 / total as f64) * 100.0).round() as u32
        };
        let status = match selected {
            0 => Coverage::None,
            n if n == total => Coverage::All,
            _ => Coverage::Partial,
        };
        SelectionStats {
            total,
            selected,
            percentage,
            status,
        }
    }

    fn commit(&self) -> Result<(), SettingsError> {
        let maps = self.maps();
        let saved = self.persist.persist(&maps);
        if let Err(e) = &saved {
            error!("Failed to persist map selection: {}", e);
        }
        self.propagate.propagate(&maps);
        saved
    }
}
