// src/storage/history.rs
use std::collections::{HashMap, HashSet};

use log::{debug, info};
use parking_lot::RwLock;
use serde::Serialize;

use crate::models::messages::StatePush;
use crate::models::server::ServerRecord;
use crate::storage::classifier::{classify, dedupe, Transition};
use crate::utils::now_iso;

/// The three live collections plus per-server transition counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Tracked {
    pub history: HashMap<String, ServerRecord>,
    pub unavailable: HashMap<String, ServerRecord>,
    pub visible: HashMap<String, ServerRecord>,
    pub transition_counts: HashMap<String, u32>,
}

impl Tracked {
    /// Unavailable servers, most recent disappearance first.
    pub fn unavailable_newest_first(&self) -> Vec<ServerRecord> {
        let mut servers: Vec<ServerRecord> = self.unavailable.values().cloned().collect();
        servers.sort_by(|a, b| b.disappeared_at.cmp(&a.disappeared_at));
        servers
    }

    /// Visible servers, most recently updated first.
    pub fn visible_newest_first(&self) -> Vec<ServerRecord> {
        let mut servers: Vec<ServerRecord> = self.visible.values().cloned().collect();
        servers.sort_by(|a, b| b.last_update.cmp(&a.last_update).then_with(|| a.steamid.cmp(&b.steamid)));
        servers
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestOutcome {
    pub new: Vec<ServerRecord>,
    pub became_unavailable: Vec<ServerRecord>,
    pub returned: Vec<ServerRecord>,
}

impl IngestOutcome {
    pub fn has_transitions(&self) -> bool {
        !self.became_unavailable.is_empty() || !self.returned.is_empty()
    }
}

pub struct HistoryStore {
    state: RwLock<Tracked>,
    unavailable_map: String,
}

impl HistoryStore {
    pub fn new(unavailable_map: &str) -> Self {
        Self {
            state: RwLock::new(Tracked::default()),
            unavailable_map: unavailable_map.to_string(),
        }
    }

    pub fn unavailable_map(&self) -> &str {
        &self.unavailable_map
    }

    /// Classifies a locally observed batch and applies it under one write lock.
    pub fn ingest(&self, records: Vec<ServerRecord>) -> IngestOutcome {
        let mut state = self.state.write();
        let classified = classify(
            &state.history,
            &state.unavailable,
            records,
            &self.unavailable_map,
        );
        let now = now_iso();
        let mut outcome = IngestOutcome::default();

        for item in classified {
            let id = item.record.steamid.clone();
            if item.is_new {
                debug!("New server tracked: {} on {}", item.record.display_name(), item.record.map);
                outcome.new.push(item.record.clone());
            }
            state
                .history
                .insert(id.clone(), item.record.clone().without_disappeared_at());

            if item.record.is_on_map(&self.unavailable_map) {
                state.visible.remove(&id);
                let mut record = item.record;
                match state.unavailable.get(&id) {
                    Some(existing) => record.disappeared_at = existing.disappeared_at.clone(),
                    None => {
                        record.disappeared_at = record.disappeared_at.or_else(|| Some(now.clone()));
                    }
                }
                if item.transition == Transition::BecameUnavailable {
                    *state.transition_counts.entry(id.clone()).or_insert(0) += 1;
                    outcome.became_unavailable.push(record.clone());
                }
                state.unavailable.insert(id, record);
            } else {
                state.unavailable.remove(&id);
                let record = item.record.without_disappeared_at();
                if item.transition == Transition::Returned {
                    outcome.returned.push(record.clone());
                }
                state.visible.insert(id, record);
            }
        }

        info!(
            "Ingested batch: {} new, {} became unavailable, {} returned ({} tracked, {} unavailable)",
            outcome.new.len(),
            outcome.became_unavailable.len(),
            outcome.returned.len(),
            state.history.len(),
            state.unavailable.len()
        );
        outcome
    }

    /// Replaces the collections named in an authoritative push from the
    /// scanner. Transitions are derived by comparing against the previous
    /// collections rather than by classifying records.
    pub fn apply_push(&self, push: StatePush) -> IngestOutcome {
        let mut state = self.state.write();
        let now = now_iso();
        let mut outcome = IngestOutcome::default();
        let previously_unavailable: HashSet<String> = state.unavailable.keys().cloned().collect();
        let unavailable_replaced = push.unavailable.is_some();

        if let Some(list) = push.unavailable {
            let mut next = HashMap::with_capacity(list.len());
            for mut record in dedupe(list) {
                let id = record.steamid.clone();
                if !state.history.contains_key(&id) {
                    outcome.new.push(record.clone());
                }
                state
                    .history
                    .insert(id.clone(), record.clone().without_disappeared_at());

                let known_since = state
                    .unavailable
                    .get(&id)
                    .and_then(|existing| existing.disappeared_at.clone());
                record.disappeared_at = record
                    .disappeared_at
                    .or(known_since)
                    .or_else(|| Some(now.clone()));

                if !previously_unavailable.contains(&id) {
                    *state.transition_counts.entry(id.clone()).or_insert(0) += 1;
                    outcome.became_unavailable.push(record.clone());
                }
                state.visible.remove(&id);
                next.insert(id, record);
            }
            state.unavailable = next;
        }

        if let Some(list) = push.visible {
            let mut next = HashMap::with_capacity(list.len());
            for record in dedupe(list) {
                let id = record.steamid.clone();
                // The unavailable list in the same push wins a conflict.
                if unavailable_replaced && state.unavailable.contains_key(&id) {
                    continue;
                }
                let record = record.without_disappeared_at();
                if !state.history.contains_key(&id) {
                    outcome.new.push(record.clone());
                }
                state.history.insert(id.clone(), record.clone());
                if state.unavailable.remove(&id).is_some() || previously_unavailable.contains(&id) {
                    outcome.returned.push(record.clone());
                }
                next.insert(id, record);
            }
            state.visible = next;
        }

        info!(
            "Applied scanner state: {} unavailable, {} visible, {} tracked",
            state.unavailable.len(),
            state.visible.len(),
            state.history.len()
        );
        outcome
    }

    /// Operator reset of the unavailable collection. History is untouched.
    pub fn clear_unavailable(&self) -> usize {
        let mut state = self.state.write();
        let removed = state.unavailable.len();
        state.unavailable.clear();
        info!("Cleared {} unavailable servers", removed);
        removed
    }

    pub fn snapshot(&self) -> Tracked {
        self.state.read().clone()
    }

    pub fn transition_count(&self, steamid: &str) -> u32 {
        self.state
            .read()
            .transition_counts
            .get(steamid)
            .copied()
            .unwrap_or(0)
    }

    pub fn counts(&self) -> (usize, usize, usize) {
        let state = self.state.read();
        (state.history.len(), state.unavailable.len(), state.visible.len())
    }
}
