// src/models/server.rs
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One observation of a game server as reported by the listing API or the
/// scanner. Superseded wholesale by the next observation of the same `steamid`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerRecord {
    pub steamid: String,
    #[serde(default)]
    pub addr: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub map: String,
    #[serde(default)]
    pub players: i32,
    #[serde(default)]
    pub bots: i32,
    #[serde(default)]
    pub max_players: i32,
    #[serde(default, deserialize_with = "string_or_number")]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disappeared_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<String>,
    /// Listing fields we don't interpret (gameport, region, os, ...), kept so
    /// records round-trip to the display client unchanged.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl ServerRecord {
    pub fn new(steamid: &str, map: &str) -> Self {
        Self {
            steamid: steamid.to_string(),
            addr: String::new(),
            name: String::new(),
            map: map.to_string(),
            players: 0,
            bots: 0,
            max_players: 0,
            version: String::new(),
            disappeared_at: None,
            last_update: None,
            extra: serde_json::Map::new(),
        }
    }

    pub fn is_on_map(&self, map: &str) -> bool {
        self.map == map
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.addr
        } else {
            &self.name
        }
    }

    pub fn without_disappeared_at(mut self) -> Self {
        self.disappeared_at = None;
        self
    }
}

/// A server the scanner persisted because it changes maps often.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedServer {
    pub ip: String,
    #[serde(deserialize_with = "string_or_number")]
    pub port: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub map_changes_count: u32,
    #[serde(default)]
    pub last_map_change: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapChange {
    #[serde(rename = "from")]
    pub from_map: String,
    #[serde(rename = "to")]
    pub to_map: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapChangeStats {
    #[serde(default)]
    pub changes_count: u32,
    #[serde(default)]
    pub last_change: Option<String>,
    #[serde(default)]
    pub server_name: Option<String>,
    #[serde(default)]
    pub changes_history: Vec<MapChange>,
}

/// `[steam_id, stats]` pair as produced by the scanner's top list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangingServer(pub String, pub MapChangeStats);

/// Aggregate counters the scanner attaches to full-state pushes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanStats {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disappeared_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returned_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_current: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tracked: Option<u64>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        other => Ok(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn listing_record_keeps_unknown_fields() {
        let raw = json!({
            "steamid": "90071992547409920",
            "addr": "203.0.113.7:27015",
            "gameport": 27015,
            "name": "community #1",
            "map": "de_mirage",
            "players": 12,
            "bots": 2,
            "max_players": 20,
            "version": "1.40.2.1"
        });
        let record: ServerRecord = serde_json::from_value(raw).unwrap();
        assert_eq!((record.players, record.bots), (12, 2));
        assert_eq!(record.extra.get("gameport"), Some(&json!(27015)));
        assert!(record.disappeared_at.is_none());

        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back["gameport"], json!(27015));
        assert!(back.get("disappeared_at").is_none());
    }

    #[test]
    fn saved_server_accepts_numeric_port() {
        let saved: SavedServer =
            serde_json::from_value(json!({"ip": "203.0.113.7", "port": 27015, "name": "x"})).unwrap();
        assert_eq!(saved.port, "27015");
        assert_eq!(saved.map_changes_count, 0);
    }

    #[test]
    fn changing_server_reads_pair() {
        let pair: ChangingServer =
            serde_json::from_value(json!(["42", {"changes_count": 7, "last_change": null}])).unwrap();
        assert_eq!(pair.0, "42");
        assert_eq!(pair.1.changes_count, 7);
    }
}
