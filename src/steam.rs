// src/steam.rs
use std::fmt;

use log::{debug, error, info};
use serde_json::Value;

use crate::config::Config;
use crate::models::server::ServerRecord;
use crate::scanner::{ListingQuery, ScanError, ServerListSource};
use crate::utils::mask_key;

const MIN_KEY_LENGTH: usize = 10;
const PROBE_STEAM_ID: &str = "76561198000000000";

#[derive(Debug)]
pub enum KeyError {
    TooShort,
    Rejected(u16),
    Unreachable(reqwest::Error),
}

impl fmt::Display for KeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort => write!(f, "key must be at least {} characters", MIN_KEY_LENGTH),
            Self::Rejected(code) => write!(f, "key rejected by the API ({})", code),
            Self::Unreachable(e) => write!(f, "could not reach the API: {}", e),
        }
    }
}

impl std::error::Error for KeyError {}

/// HTTP client for the public listing API.
#[derive(Clone)]
pub struct SteamClient {
    http: reqwest::Client,
    base_url: String,
    app_id: u32,
}

impl SteamClient {
    pub fn new(config: &Config) -> Self {
        let http = match reqwest::Client::builder().timeout(config.http_timeout()).build() {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to build HTTP client with timeout, using defaults: {}", e);
                reqwest::Client::new()
            }
        };
        Self {
            http,
            base_url: config.listing_base_url.trim_end_matches('/').to_string(),
            app_id: config.app_id,
        }
    }

    pub fn listing_filter(&self, map: &str, region: &str) -> String {
        format!("appid\\{}\\map\\{}\\region\\{}", self.app_id, map, region)
    }

    /// Checks a key against a cheap authenticated endpoint.
    pub async fn validate_key(&self, key: &str) -> Result<(), KeyError> {
        if key.len() < MIN_KEY_LENGTH {
            return Err(KeyError::TooShort);
        }

        let url = format!("{}/ISteamUser/GetPlayerSummaries/v2/", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("key", key), ("steamids", PROBE_STEAM_ID)])
            .send()
            .await
            .map_err(KeyError::Unreachable)?;

        if response.status().is_success() {
            info!("API key {} accepted", mask_key(key));
            Ok(())
        } else {
            error!("API key {} rejected with {}", mask_key(key), response.status());
            Err(KeyError::Rejected(response.status().as_u16()))
        }
    }
}

impl ServerListSource for SteamClient {
    async fn fetch_map(&self, query: ListingQuery<'_>) -> Result<Vec<ServerRecord>, ScanError> {
        let url = format!("{}/IGameServersService/GetServerList/v1/", self.base_url);
        let filter = self.listing_filter(query.map, query.region);

        let response = self
            .http
            .get(&url)
            .query(&[("key", query.api_key), ("filter", filter.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ScanError::Status(response.status().as_u16()));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ScanError::Body(e.to_string()))?;
        Ok(servers_from_listing(&body))
    }
}

/// Pulls `response.servers` out of a listing envelope. Any other shape means
/// no servers; records that don't parse are skipped.
pub fn servers_from_listing(body: &Value) -> Vec<ServerRecord> {
    let servers = match body
        .get("response")
        .and_then(|r| r.get("servers"))
        .and_then(Value::as_array)
    {
        Some(servers) => servers,
        None => {
            debug!("Listing response has no servers array");
            return Vec::new();
        }
    };

    servers
        .iter()
        .filter_map(|server| serde_json::from_value(server.clone()).ok())
        .collect()
}
