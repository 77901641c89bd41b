// src/channel/manager.rs
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, oneshot};
use tokio::time::sleep;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;

use crate::autoconnect::TransitionObserver;
use crate::channel::machine::{ConnectionState, LinkAction, LinkMachine};
use crate::config::Config;
use crate::models::messages::{Inbound, Outbound, ReplyKind, StatePush};
use crate::models::server::{ChangingServer, MapChangeStats, SavedServer, ScanStats};
use crate::notices::{Level, NoticeLog};
use crate::selection::SelectionPropagate;
use crate::storage::history::HistoryStore;

pub const DEFAULT_AUTO_SAVE_THRESHOLD: u32 = 3;

struct Pending {
    kind: ReplyKind,
    seq: u64,
    reply: oneshot::Sender<Inbound>,
}

/// Owns the realtime connection to the companion scanner: lifecycle,
/// inbound dispatch and request/response correlation.
pub struct ChannelManager {
    url: String,
    machine: Mutex<LinkMachine>,
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
    pending: DashMap<String, Pending>,
    next_seq: AtomicU64,
    store: Arc<HistoryStore>,
    notices: Arc<NoticeLog>,
    saved_servers: RwLock<Vec<SavedServer>>,
    last_stats: RwLock<Option<ScanStats>>,
    observer: RwLock<Option<Arc<dyn TransitionObserver>>>,
}

impl ChannelManager {
    pub fn new(
        config: &Config,
        api_key: Option<String>,
        store: Arc<HistoryStore>,
        notices: Arc<NoticeLog>,
    ) -> Arc<Self> {
        Arc::new(Self {
            url: config.scanner_ws_url.clone(),
            machine: Mutex::new(LinkMachine::new(
                config.use_realtime,
                config.reconnect_delay(),
                api_key,
            )),
            outbound: Mutex::new(None),
            pending: DashMap::new(),
            next_seq: AtomicU64::new(0),
            store,
            notices,
            saved_servers: RwLock::new(Vec::new()),
            last_stats: RwLock::new(None),
            observer: RwLock::new(None),
        })
    }

    pub fn set_observer(&self, observer: Arc<dyn TransitionObserver>) {
        *self.observer.write() = Some(observer);
    }

    pub fn state(&self) -> ConnectionState {
        self.machine.lock().state()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn use_realtime(&self) -> bool {
        self.machine.lock().use_realtime()
    }

    pub fn saved_servers(&self) -> Vec<SavedServer> {
        self.saved_servers.read().clone()
    }

    pub fn last_stats(&self) -> Option<ScanStats> {
        self.last_stats.read().clone()
    }

    pub fn pending_queries(&self) -> usize {
        self.pending.len()
    }

    pub fn start(self: &Arc<Self>) {
        let actions = self.machine.lock().start();
        self.execute(actions);
    }

    pub fn set_api_key(self: &Arc<Self>, key: &str) {
        let actions = self.machine.lock().set_api_key(key.to_string());
        self.execute(actions);
    }

    pub fn set_use_realtime(self: &Arc<Self>, enabled: bool) {
        let actions = self.machine.lock().set_use_realtime(enabled);
        self.execute(actions);
    }

    /// Fire-and-forget send. Returns false when nothing was sent.
    pub fn send(&self, message: Outbound) -> bool {
        let text = match message.to_text() {
            Ok(text) => text,
            Err(e) => {
                error!("Failed to encode {} message: {}", message.kind(), e);
                return false;
            }
        };

        if !self.is_connected() {
            debug!("Not connected, {} not sent", message.kind());
            return false;
        }
        match self.outbound.lock().as_ref() {
            Some(tx) => {
                let sent = tx.send(text).is_ok();
                if sent {
                    debug!("Sent {} to scanner", message.kind());
                }
                sent
            }
            None => false,
        }
    }

    pub fn start_scan(&self) -> bool {
        self.send(Outbound::StartScan)
    }

    pub fn force_update(&self) -> bool {
        self.send(Outbound::ForceUpdate)
    }

    pub fn request_saved_servers(&self) -> bool {
        self.send(Outbound::GetSavedServers)
    }

    pub fn request_game_servers(&self) -> bool {
        self.send(Outbound::GetGameServers)
    }

    pub fn request_empty_servers(&self) -> bool {
        self.send(Outbound::GetEmptyServers)
    }

    pub fn delete_saved_server(&self, ip: &str, port: &str) -> bool {
        self.send(Outbound::DeleteSavedServer {
            ip: ip.to_string(),
            port: port.to_string(),
        })
    }

    pub async fn map_changes_stats(&self, steam_id: &str) -> Option<MapChangeStats> {
        let reply = self
            .query(ReplyKind::MapChangesStats, |request_id| {
                Outbound::GetMapChangesStats {
                    steam_id: steam_id.to_string(),
                    request_id,
                }
            })
            .await;
        match reply {
            Some(Inbound::MapChangesStats { status, stats, .. }) if status.is_success() => stats,
            _ => None,
        }
    }

    pub async fn top_changing_servers(&self, limit: u32) -> Vec<ChangingServer> {
        let reply = self
            .query(ReplyKind::TopChangingServers, |request_id| {
                Outbound::GetTopChangingServers { limit, request_id }
            })
            .await;
        match reply {
            Some(Inbound::TopChangingServers { servers, .. }) => servers,
            _ => Vec::new(),
        }
    }

    pub async fn set_auto_save_threshold(&self, threshold: u32) -> bool {
        let reply = self
            .query(ReplyKind::AutoSaveThresholdUpdated, |request_id| {
                Outbound::SetAutoSaveThreshold {
                    threshold,
                    request_id,
                }
            })
            .await;
        matches!(
            reply,
            Some(Inbound::AutoSaveThresholdUpdated { status, .. }) if status.is_success()
        )
    }

    pub async fn auto_save_threshold(&self) -> u32 {
        let reply = self
            .query(ReplyKind::AutoSaveThreshold, |request_id| {
                Outbound::GetAutoSaveThreshold { request_id }
            })
            .await;
        match reply {
            Some(Inbound::AutoSaveThreshold {
                threshold: Some(threshold),
                ..
            }) if threshold > 0 => threshold,
            _ => DEFAULT_AUTO_SAVE_THRESHOLD,
        }
    }

    /// Sends a request tagged with a fresh id and waits for its reply. Returns
    /// None without sending when disconnected, or when the connection drops
    /// before the reply arrives.
    async fn query<F>(&self, kind: ReplyKind, request: F) -> Option<Inbound>
    where
        F: FnOnce(String) -> Outbound,
    {
        if !self.is_connected() {
            return None;
        }

        let request_id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.pending.insert(
            request_id.clone(),
            Pending {
                kind,
                seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
                reply: tx,
            },
        );

        if !self.send(request(request_id.clone())) {
            self.pending.remove(&request_id);
            return None;
        }
        rx.await.ok()
    }

    /// Routes a reply to its pending query. A reply without an id goes to the
    /// oldest pending query of the same kind; one with an unknown id is dropped.
    fn resolve(&self, inbound: Inbound) -> Result<(), Inbound> {
        let (kind, echoed) = match inbound.reply() {
            Some((kind, id)) => (kind, id.map(str::to_owned)),
            None => return Err(inbound),
        };

        let key = match echoed {
            Some(id) => Some(id),
            None => self
                .pending
                .iter()
                .filter(|entry| entry.value().kind == kind)
                .min_by_key(|entry| entry.value().seq)
                .map(|entry| entry.key().clone()),
        };

        match key.and_then(|key| self.pending.remove(&key)) {
            Some((_, pending)) => {
                if pending.reply.send(inbound).is_err() {
                    debug!("Query for {:?} was abandoned before its reply", kind);
                }
            }
            None => debug!("Dropping unsolicited {:?} reply", kind),
        }
        Ok(())
    }

    pub fn on_opened(self: &Arc<Self>, outbound: mpsc::UnboundedSender<String>) {
        *self.outbound.lock() = Some(outbound);
        let actions = self.machine.lock().opened();
        if self.is_connected() {
            info!("Scanner connection established");
        }
        self.execute(actions);
    }

    pub fn on_closed(self: &Arc<Self>, reason: &str) {
        self.outbound.lock().take();
        let actions = self.machine.lock().closed(reason);
        info!("Scanner connection closed: {}", reason);
        self.execute(actions);
    }

    fn on_reconnect_due(self: &Arc<Self>) {
        let actions = self.machine.lock().reconnect_due();
        self.execute(actions);
    }

    /// Handles one text frame from the scanner.
    pub fn on_frame(self: &Arc<Self>, text: &str) {
        let inbound = match Inbound::parse(text) {
            Ok(inbound) => inbound,
            Err(e) => {
                warn!("Dropping malformed scanner message: {}", e);
                return;
            }
        };

        if let Err(inbound) = self.resolve(inbound) {
            self.dispatch(inbound);
        }
    }

    fn dispatch(self: &Arc<Self>, inbound: Inbound) {
        match inbound {
            Inbound::ApiKeySet { status, message } => {
                let actions = self.machine.lock().authenticated(status.is_success(), message);
                self.execute(actions);
            }
            Inbound::SavedServersUpdate { saved_servers } => {
                if let Some(saved) = saved_servers {
                    debug!("Scanner reports {} saved servers", saved.len());
                    *self.saved_servers.write() = saved;
                }
            }
            Inbound::ScanStarted { .. } => self.notices.push(Level::Success, "Scan started"),
            Inbound::ForceUpdate { .. } => self.notices.push(Level::Success, "Data refreshed"),
            Inbound::Error { message } => {
                self.notices
                    .push(Level::Error, format!("Scanner error: {}", message))
            }
            Inbound::Unknown => debug!("Ignoring scanner message of unknown type"),
            other => match other.into_state_push(self.store.unavailable_map()) {
                Some(push) => self.apply_push(push),
                None => debug!("Ignoring reply with no pending query"),
            },
        }
    }

    fn apply_push(&self, push: StatePush) {
        if let Some(stats) = &push.stats {
            *self.last_stats.write() = Some(stats.clone());
        }
        let outcome = self.store.apply_push(push);
        self.notices
            .report_transitions(&outcome, self.store.unavailable_map());
        if let Some(observer) = self.observer.read().as_ref() {
            observer.observe(&outcome);
        }
    }

    fn execute(self: &Arc<Self>, actions: Vec<LinkAction>) {
        for action in actions {
            match action {
                LinkAction::Open => {
                    let manager = Arc::clone(self);
                    tokio::spawn(async move { manager.run_connection().await });
                }
                LinkAction::Close => {
                    self.outbound.lock().take();
                }
                LinkAction::Send(message) => {
                    self.send(message);
                }
                LinkAction::ScheduleReconnect(delay) => {
                    info!("Reconnecting to scanner in {:?}", delay);
                    let manager = Arc::clone(self);
                    tokio::spawn(async move {
                        sleep(delay).await;
                        manager.on_reconnect_due();
                    });
                }
                LinkAction::DropPending => {
                    if !self.pending.is_empty() {
                        debug!("Abandoning {} pending queries", self.pending.len());
                    }
                    self.pending.clear();
                }
                LinkAction::Notify(level, message) => self.notices.push(level, message),
            }
        }
    }

    async fn run_connection(self: Arc<Self>) {
        info!("Connecting to scanner at {}", self.url);
        let socket = match connect_async(self.url.as_str()).await {
            Ok((socket, _response)) => socket,
            Err(e) => {
                self.on_closed(&e.to_string());
                return;
            }
        };

        let (mut sink, mut stream) = socket.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        self.on_opened(tx);

        let reason = loop {
            tokio::select! {
                outgoing = rx.recv() => match outgoing {
                    Some(text) => {
                        if let Err(e) = sink.send(Message::Text(text)).await {
                            break format!("send failed: {}", e);
                        }
                    }
                    None => {
                        let _ = sink.send(Message::Close(None)).await;
                        break "closed locally".to_string();
                    }
                },
                incoming = stream.next() => match incoming {
                    Some(Ok(Message::Text(text))) => self.on_frame(&text),
                    Some(Ok(Message::Close(_))) | None => break "closed by scanner".to_string(),
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => break e.to_string(),
                },
            }
        };

        self.on_closed(&reason);
    }
}

impl SelectionPropagate for ChannelManager {
    fn propagate(&self, maps: &[String]) {
        if !self.send(Outbound::UpdateMaps {
            maps: maps.to_vec(),
        }) {
            debug!("Map selection not propagated, scanner offline");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    const SENTINEL: &str = "graphics_settings";

    fn manager(use_realtime: bool) -> Arc<ChannelManager> {
        let config = Config {
            use_realtime,
            ..Config::default()
        };
        ChannelManager::new(
            &config,
            Some("KEY1234567".into()),
            Arc::new(HistoryStore::new(SENTINEL)),
            Arc::new(NoticeLog::default()),
        )
    }

    fn connect(manager: &Arc<ChannelManager>) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        manager.on_opened(tx);
        rx
    }

    async fn next_frame(rx: &mut mpsc::UnboundedReceiver<String>) -> Value {
        serde_json::from_str(&rx.recv().await.unwrap()).unwrap()
    }

    #[tokio::test]
    async fn queries_while_disconnected_use_defaults() {
        let manager = manager(false);
        assert_eq!(manager.map_changes_stats("1").await, None);
        assert!(manager.top_changing_servers(5).await.is_empty());
        assert!(!manager.set_auto_save_threshold(4).await);
        assert_eq!(manager.auto_save_threshold().await, DEFAULT_AUTO_SAVE_THRESHOLD);
        assert_eq!(manager.pending_queries(), 0);
    }

    #[tokio::test]
    async fn open_after_realtime_disabled_drops_the_link() {
        let manager = manager(false);
        let mut rx = connect(&manager);
        assert!(rx.recv().await.is_none());
        assert!(!manager.is_connected());
        assert!(!manager.start_scan());
    }

    #[tokio::test]
    async fn open_sends_api_key_then_auth_requests_state() {
        let manager = manager(true);
        let mut rx = connect(&manager);
        assert_eq!(
            next_frame(&mut rx).await,
            json!({"type": "set_api_key", "api_key": "KEY1234567"})
        );

        manager.on_frame(r#"{"type": "api_key_set", "status": "success"}"#);
        assert_eq!(next_frame(&mut rx).await, json!({"type": "get_initial_state"}));
    }

    #[tokio::test]
    async fn state_push_primes_the_store() {
        let manager = manager(true);
        let _rx = connect(&manager);
        manager.on_frame(
            &json!({
                "type": "initial_state",
                "disappeared_servers": [{"steamid": "1", "map": SENTINEL}],
                "game_servers": [{"steamid": "2", "map": "de_nuke"}],
                "stats": {"total_tracked": 2}
            })
            .to_string(),
        );
        let (tracked, unavailable, visible) = manager.store.counts();
        assert_eq!((tracked, unavailable, visible), (2, 1, 1));
        assert_eq!(manager.last_stats().unwrap().total_tracked, Some(2));
    }

    #[tokio::test]
    async fn malformed_frames_are_dropped() {
        let manager = manager(true);
        let _rx = connect(&manager);
        manager.on_frame("not json at all");
        manager.on_frame(r#"{"no_type": true}"#);
        assert_eq!(manager.store.counts(), (0, 0, 0));
        assert!(manager.is_connected());
    }

    #[tokio::test]
    async fn reply_is_routed_by_request_id() {
        let manager = manager(true);
        let mut rx = connect(&manager);
        let _key = next_frame(&mut rx).await;

        let first = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.auto_save_threshold().await })
        };
        let first_id = next_frame(&mut rx).await["request_id"].as_str().unwrap().to_string();

        let second = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.auto_save_threshold().await })
        };
        let second_id = next_frame(&mut rx).await["request_id"].as_str().unwrap().to_string();
        assert_ne!(first_id, second_id);

        // Answer out of order; each query still gets its own reply.
        manager.on_frame(
            &json!({"type": "auto_save_threshold", "threshold": 9, "request_id": second_id}).to_string(),
        );
        manager.on_frame(
            &json!({"type": "auto_save_threshold", "threshold": 4, "request_id": first_id}).to_string(),
        );

        assert_eq!(first.await.unwrap(), 4);
        assert_eq!(second.await.unwrap(), 9);
    }

    #[tokio::test]
    async fn replies_without_id_resolve_in_order() {
        let manager = manager(true);
        let mut rx = connect(&manager);
        let _key = next_frame(&mut rx).await;

        let first = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.top_changing_servers(3).await })
        };
        let _ = next_frame(&mut rx).await;
        let second = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.top_changing_servers(3).await })
        };
        let _ = next_frame(&mut rx).await;

        manager.on_frame(
            &json!({"type": "top_changing_servers", "servers": [["a", {"changes_count": 5}]]}).to_string(),
        );
        manager.on_frame(&json!({"type": "top_changing_servers", "servers": []}).to_string());

        assert_eq!(first.await.unwrap()[0].0, "a");
        assert!(second.await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reply_with_unknown_id_is_dropped() {
        let manager = manager(true);
        let mut rx = connect(&manager);
        let _key = next_frame(&mut rx).await;

        let query = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.auto_save_threshold().await })
        };
        let request_id = next_frame(&mut rx).await["request_id"].as_str().unwrap().to_string();

        manager.on_frame(
            &json!({"type": "auto_save_threshold", "threshold": 9, "request_id": "stale-id"}).to_string(),
        );
        assert_eq!(manager.pending_queries(), 1);

        manager.on_frame(
            &json!({"type": "auto_save_threshold", "threshold": 6, "request_id": request_id}).to_string(),
        );
        assert_eq!(query.await.unwrap(), 6);
    }

    #[tokio::test]
    async fn list_refresh_requests_reach_the_scanner() {
        let manager = manager(true);
        assert!(!manager.request_game_servers());
        assert!(!manager.request_empty_servers());

        let mut rx = connect(&manager);
        let _key = next_frame(&mut rx).await;
        assert!(manager.request_game_servers());
        assert_eq!(next_frame(&mut rx).await, json!({"type": "get_game_servers"}));
        assert!(manager.request_empty_servers());
        assert_eq!(next_frame(&mut rx).await, json!({"type": "get_empty_servers"}));
    }

    #[tokio::test]
    async fn unsolicited_push_is_not_swallowed_by_pending_query() {
        let manager = manager(true);
        let mut rx = connect(&manager);
        let _key = next_frame(&mut rx).await;

        let query = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.map_changes_stats("7").await })
        };
        let _ = next_frame(&mut rx).await;

        manager.on_frame(
            &json!({"type": "scan_complete", "servers": [{"steamid": "7", "map": SENTINEL}]}).to_string(),
        );
        manager.on_frame(
            &json!({"type": "map_changes_stats", "status": "success", "stats": {"changes_count": 2}}).to_string(),
        );

        assert_eq!(query.await.unwrap().unwrap().changes_count, 2);
        assert_eq!(manager.store.counts().1, 1);
    }

    #[tokio::test]
    async fn close_resolves_pending_queries_to_defaults() {
        let manager = manager(true);
        let mut rx = connect(&manager);
        let _key = next_frame(&mut rx).await;

        let query = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.set_auto_save_threshold(5).await })
        };
        let _ = next_frame(&mut rx).await;
        manager.on_closed("reset");

        assert!(!query.await.unwrap());
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(!manager.start_scan());
    }

    #[tokio::test]
    async fn selection_changes_are_pushed_when_connected() {
        let manager = manager(true);
        manager.propagate(&["de_nuke".to_string()]);

        let mut rx = connect(&manager);
        let _key = next_frame(&mut rx).await;
        manager.propagate(&["de_nuke".to_string()]);
        assert_eq!(
            next_frame(&mut rx).await,
            json!({"type": "update_maps", "maps": ["de_nuke"]})
        );
    }
}
