// src/storage/classifier.rs
use std::collections::HashMap;

use crate::models::server::ServerRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    BecameUnavailable,
    Returned,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classified {
    pub record: ServerRecord,
    /// First time this identifier has been seen. Independent of `transition`.
    pub is_new: bool,
    pub transition: Transition,
}

/// Collapses duplicate identifiers, keeping the last-seen record at the
/// position of the first occurrence.
pub fn dedupe(batch: Vec<ServerRecord>) -> Vec<ServerRecord> {
    let mut index: HashMap<String, usize> = HashMap::with_capacity(batch.len());
    let mut out: Vec<ServerRecord> = Vec::with_capacity(batch.len());

    for record in batch {
        match index.get(&record.steamid) {
            Some(&at) => out[at] = record,
            None => {
                index.insert(record.steamid.clone(), out.len());
                out.push(record);
            }
        }
    }
    out
}

/// Classifies a batch against what is already known. Pure: the caller applies
/// the result.
pub fn classify(
    history: &HashMap<String, ServerRecord>,
    unavailable: &HashMap<String, ServerRecord>,
    batch: Vec<ServerRecord>,
    unavailable_map: &str,
) -> Vec<Classified> {
    dedupe(batch)
        .into_iter()
        .map(|record| {
            let is_new = !history.contains_key(&record.steamid);
            let was_unavailable = unavailable.contains_key(&record.steamid);
            let transition = match (record.is_on_map(unavailable_map), was_unavailable) {
                (true, false) => Transition::BecameUnavailable,
                (false, true) => Transition::Returned,
                _ => Transition::Unchanged,
            };
            Classified {
                record,
                is_new,
                transition,
            }
        })
        .collect()
}
