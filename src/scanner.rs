// src/scanner.rs
//
// Fallback path: poll the listing API directly, one request per map, in
// sequential chunks of at most `concurrency` requests.
use std::fmt;

use futures_util::stream::{FuturesUnordered, StreamExt};
use log::{debug, error, info};
use serde::Serialize;

use crate::models::server::ServerRecord;

#[derive(Debug)]
pub enum ScanError {
    Http(reqwest::Error),
    Status(u16),
    Body(String),
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(e) => write!(f, "request failed: {}", e),
            Self::Status(code) => write!(f, "listing API answered {}", code),
            Self::Body(reason) => write!(f, "unreadable listing response: {}", reason),
        }
    }
}

impl std::error::Error for ScanError {}

impl From<reqwest::Error> for ScanError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ListingQuery<'a> {
    pub map: &'a str,
    pub api_key: &'a str,
    pub region: &'a str,
}

/// Anything that can list the servers currently on one map.
#[allow(async_fn_in_trait)]
pub trait ServerListSource {
    async fn fetch_map(&self, query: ListingQuery<'_>) -> Result<Vec<ServerRecord>, ScanError>;
}

#[derive(Debug, Clone)]
pub struct ScanPlan {
    pub maps: Vec<String>,
    pub api_key: String,
    pub region: String,
    pub concurrency: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanProgress {
    pub processed: usize,
    pub total: usize,
    pub map: String,
}

/// Runs the plan to completion and returns every record found, in map order.
/// A failed map contributes nothing and does not stop the scan.
pub async fn scan_maps<S, F>(source: &S, plan: &ScanPlan, mut on_progress: F) -> Vec<ServerRecord>
where
    S: ServerListSource,
    F: FnMut(ScanProgress),
{
    let total = plan.maps.len();
    let chunk_size = plan.concurrency.max(1);
    let mut processed = 0;
    let mut collected = Vec::new();

    for (chunk_index, chunk) in plan.maps.chunks(chunk_size).enumerate() {
        debug!("Scanning chunk {} ({} maps)", chunk_index + 1, chunk.len());

        let mut in_flight: FuturesUnordered<_> = chunk
            .iter()
            .enumerate()
            .map(|(position, map)| async move {
                let query = ListingQuery {
                    map,
                    api_key: &plan.api_key,
                    region: &plan.region,
                };
                (position, map, source.fetch_map(query).await)
            })
            .collect();

        let mut settled: Vec<(usize, Vec<ServerRecord>)> = Vec::with_capacity(chunk.len());
        while let Some((position, map, result)) = in_flight.next().await {
            processed += 1;
            let records = match result {
                Ok(records) => {
                    debug!("Map {}: {} servers", map, records.len());
                    records
                }
                Err(e) => {
                    error!("Failed to scan map {}: {}", map, e);
                    Vec::new()
                }
            };
            on_progress(ScanProgress {
                processed,
                total,
                map: map.clone(),
            });
            settled.push((position, records));
        }

        settled.sort_by_key(|(position, _)| *position);
        collected.extend(settled.into_iter().flat_map(|(_, records)| records));
    }

    info!("Scan finished: {} maps, {} servers", total, collected.len());
    collected
}
