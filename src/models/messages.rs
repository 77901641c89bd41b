// src/models/messages.rs
//
// Wire contract with the companion scanner. Every frame is a JSON object
// tagged by `type`.
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::models::server::{ChangingServer, MapChangeStats, SavedServer, ScanStats, ServerRecord};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
    #[default]
    #[serde(other)]
    Unknown,
}

impl Status {
    pub fn is_success(self) -> bool {
        self == Status::Success
    }
}

/// Raw server lists in either of the shapes the scanner uses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StateLists {
    #[serde(default, deserialize_with = "lenient_records")]
    pub disappeared_servers: Option<Vec<ServerRecord>>,
    #[serde(default, deserialize_with = "lenient_records")]
    pub game_servers: Option<Vec<ServerRecord>>,
    #[serde(default, deserialize_with = "lenient_records")]
    pub servers: Option<Vec<ServerRecord>>,
    #[serde(default)]
    pub stats: Option<ScanStats>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Inbound {
    ApiKeySet {
        #[serde(default)]
        status: Status,
        #[serde(default)]
        message: Option<String>,
    },
    InitialState(StateLists),
    ScanComplete(StateLists),
    EmptyServersUpdate {
        #[serde(default, deserialize_with = "lenient_records")]
        empty_servers: Option<Vec<ServerRecord>>,
    },
    GameServersUpdate {
        #[serde(default, deserialize_with = "lenient_records")]
        game_servers: Option<Vec<ServerRecord>>,
    },
    SavedServersUpdate {
        #[serde(default)]
        saved_servers: Option<Vec<SavedServer>>,
    },
    ScanStarted {
        #[serde(default)]
        message: Option<String>,
    },
    ForceUpdate {
        #[serde(default)]
        message: Option<String>,
    },
    Error {
        #[serde(default)]
        message: String,
    },
    MapChangesStats {
        #[serde(default)]
        request_id: Option<String>,
        #[serde(default)]
        status: Status,
        #[serde(default)]
        stats: Option<MapChangeStats>,
    },
    TopChangingServers {
        #[serde(default)]
        request_id: Option<String>,
        #[serde(default)]
        servers: Vec<ChangingServer>,
    },
    AutoSaveThresholdUpdated {
        #[serde(default)]
        request_id: Option<String>,
        #[serde(default)]
        status: Status,
        #[serde(default)]
        threshold: Option<u32>,
    },
    AutoSaveThreshold {
        #[serde(default)]
        request_id: Option<String>,
        #[serde(default)]
        threshold: Option<u32>,
    },
    #[serde(other)]
    Unknown,
}

/// Response tags that answer a correlated query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplyKind {
    MapChangesStats,
    TopChangingServers,
    AutoSaveThresholdUpdated,
    AutoSaveThreshold,
}

impl Inbound {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// The reply kind and echoed correlation id, if this frame answers a query.
    pub fn reply(&self) -> Option<(ReplyKind, Option<&str>)> {
        match self {
            Inbound::MapChangesStats { request_id, .. } => {
                Some((ReplyKind::MapChangesStats, request_id.as_deref()))
            }
            Inbound::TopChangingServers { request_id, .. } => {
                Some((ReplyKind::TopChangingServers, request_id.as_deref()))
            }
            Inbound::AutoSaveThresholdUpdated { request_id, .. } => {
                Some((ReplyKind::AutoSaveThresholdUpdated, request_id.as_deref()))
            }
            Inbound::AutoSaveThreshold { request_id, .. } => {
                Some((ReplyKind::AutoSaveThreshold, request_id.as_deref()))
            }
            _ => None,
        }
    }

    /// Normalises every state-carrying frame into one canonical push.
    pub fn into_state_push(self, unavailable_map: &str) -> Option<StatePush> {
        match self {
            Inbound::InitialState(lists) | Inbound::ScanComplete(lists) => {
                Some(StatePush::from_lists(lists, unavailable_map))
            }
            Inbound::GameServersUpdate { game_servers } => Some(StatePush {
                unavailable: None,
                visible: Some(game_servers.unwrap_or_default()),
                stats: None,
            }),
            Inbound::EmptyServersUpdate { empty_servers } => Some(StatePush {
                unavailable: Some(
                    empty_servers
                        .unwrap_or_default()
                        .into_iter()
                        .filter(|s| s.is_on_map(unavailable_map))
                        .collect(),
                ),
                visible: None,
                stats: None,
            }),
            _ => None,
        }
    }
}

/// Authoritative replacement of one or both live collections.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatePush {
    pub unavailable: Option<Vec<ServerRecord>>,
    pub visible: Option<Vec<ServerRecord>>,
    pub stats: Option<ScanStats>,
}

impl StatePush {
    pub fn from_lists(lists: StateLists, unavailable_map: &str) -> Self {
        let StateLists {
            disappeared_servers,
            game_servers,
            servers,
            stats,
        } = lists;

        match (disappeared_servers, servers) {
            (Some(unavailable), _) => Self {
                unavailable: Some(unavailable),
                visible: game_servers,
                stats,
            },
            (None, Some(combined)) => {
                let (unavailable, visible): (Vec<_>, Vec<_>) = combined
                    .into_iter()
                    .partition(|s| s.is_on_map(unavailable_map));
                Self {
                    unavailable: Some(unavailable),
                    visible: Some(visible),
                    stats,
                }
            }
            (None, None) => Self {
                unavailable: None,
                visible: game_servers,
                stats,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outbound {
    SetApiKey { api_key: String },
    StartScan,
    GetEmptyServers,
    GetGameServers,
    GetSavedServers,
    GetInitialState,
    ForceUpdate,
    UpdateMaps { maps: Vec<String> },
    DeleteSavedServer { ip: String, port: String },
    GetMapChangesStats { steam_id: String, request_id: String },
    GetTopChangingServers { limit: u32, request_id: String },
    SetAutoSaveThreshold { threshold: u32, request_id: String },
    GetAutoSaveThreshold { request_id: String },
}

impl Outbound {
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Outbound::SetApiKey { .. } => "set_api_key",
            Outbound::StartScan => "start_scan",
            Outbound::GetEmptyServers => "get_empty_servers",
            Outbound::GetGameServers => "get_game_servers",
            Outbound::GetSavedServers => "get_saved_servers",
            Outbound::GetInitialState => "get_initial_state",
            Outbound::ForceUpdate => "force_update",
            Outbound::UpdateMaps { .. } => "update_maps",
            Outbound::DeleteSavedServer { .. } => "delete_saved_server",
            Outbound::GetMapChangesStats { .. } => "get_map_changes_stats",
            Outbound::GetTopChangingServers { .. } => "get_top_changing_servers",
            Outbound::SetAutoSaveThreshold { .. } => "set_auto_save_threshold",
            Outbound::GetAutoSaveThreshold { .. } => "get_auto_save_threshold",
        }
    }
}

// A single bad record must not sink the whole frame.
fn lenient_records<'de, D>(deserializer: D) -> Result<Option<Vec<ServerRecord>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<Value>> = Option::deserialize(deserializer)?;
    Ok(raw.map(|items| {
        items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect()
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SENTINEL: &str = "graphics_settings";

    #[test]
    fn combined_list_is_partitioned_by_sentinel() {
        let frame = json!({
            "type": "scan_complete",
            "servers": [
                {"steamid": "1", "map": "graphics_settings"},
                {"steamid": "2", "map": "de_nuke"},
                {"map": "de_nuke"}
            ],
            "stats": {"disappeared_count": 1}
        });
        let inbound = Inbound::parse(&frame.to_string()).unwrap();
        let push = inbound.into_state_push(SENTINEL).unwrap();
        let unavailable = push.unavailable.unwrap();
        let visible = push.visible.unwrap();
        assert_eq!(unavailable.len(), 1);
        assert_eq!(unavailable[0].steamid, "1");
        assert_eq!(visible.len(), 1);
        assert_eq!(push.stats.unwrap().disappeared_count, Some(1));
    }

    #[test]
    fn pre_split_lists_map_directly() {
        let frame = json!({
            "type": "initial_state",
            "disappeared_servers": [{"steamid": "1", "map": "graphics_settings", "disappeared_at": "2024-05-01T10:00:00"}],
            "game_servers": [{"steamid": "2", "map": "de_nuke"}]
        });
        let push = Inbound::parse(&frame.to_string())
            .unwrap()
            .into_state_push(SENTINEL)
            .unwrap();
        assert_eq!(push.unavailable.as_ref().unwrap()[0].disappeared_at.as_deref(), Some("2024-05-01T10:00:00"));
        assert_eq!(push.visible.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn game_servers_update_only_touches_visible() {
        let frame = json!({"type": "game_servers_update", "game_servers": []});
        let push = Inbound::parse(&frame.to_string())
            .unwrap()
            .into_state_push(SENTINEL)
            .unwrap();
        assert!(push.unavailable.is_none());
        assert_eq!(push.visible, Some(vec![]));
    }

    #[test]
    fn empty_servers_update_only_touches_unavailable() {
        let frame = json!({
            "type": "empty_servers_update",
            "empty_servers": [
                {"steamid": "1", "map": "graphics_settings"},
                {"steamid": "2", "map": "de_nuke"}
            ]
        });
        let push = Inbound::parse(&frame.to_string())
            .unwrap()
            .into_state_push(SENTINEL)
            .unwrap();
        assert!(push.visible.is_none());
        let unavailable = push.unavailable.unwrap();
        assert_eq!(unavailable.len(), 1);
        assert_eq!(unavailable[0].steamid, "1");
    }

    #[test]
    fn unknown_type_parses_as_unknown() {
        let inbound = Inbound::parse(r#"{"type": "maps_updated", "status": "success"}"#).unwrap();
        assert!(matches!(inbound, Inbound::Unknown));
    }

    #[test]
    fn reply_exposes_request_id() {
        let inbound =
            Inbound::parse(r#"{"type": "auto_save_threshold", "threshold": 4, "request_id": "abc"}"#).unwrap();
        assert_eq!(inbound.reply(), Some((ReplyKind::AutoSaveThreshold, Some("abc"))));
    }

    #[test]
    fn outbound_frames_carry_type_tag() {
        let text = Outbound::UpdateMaps {
            maps: vec!["de_nuke".into()],
        }
        .to_text()
        .unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value, json!({"type": "update_maps", "maps": ["de_nuke"]}));

        let text = Outbound::StartScan.to_text().unwrap();
        assert_eq!(text, r#"{"type":"start_scan"}"#);
    }
}
