// src/context.rs
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{error, info, warn};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use crate::autoconnect::{AutoConnect, TransitionObserver};
use crate::channel::{ChannelManager, ConnectionState};
use crate::config::Config;
use crate::notices::{Level, NoticeLog};
use crate::scanner::{scan_maps, ScanPlan, ScanProgress, ServerListSource};
use crate::selection::MapSelection;
use crate::steam::SteamClient;
use crate::storage::history::{HistoryStore, IngestOutcome};
use crate::storage::settings::SettingsFile;
use crate::utils::{mask_key, ApiError};

#[derive(Debug, PartialEq, Eq)]
pub enum LoadError {
    AlreadyLoading,
    MissingApiKey,
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyLoading => write!(f, "a load is already in flight"),
            Self::MissingApiKey => write!(f, "no API key configured"),
        }
    }
}

impl std::error::Error for LoadError {}

impl From<LoadError> for ApiError {
    fn from(e: LoadError) -> Self {
        match e {
            LoadError::AlreadyLoading => ApiError::ScanInProgress,
            LoadError::MissingApiKey => ApiError::MissingApiKey,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum LoadOutcome {
    /// The scanner was asked to scan; results arrive as a state push.
    Delegated,
    /// Scanned locally through the listing API.
    Scanned {
        maps: usize,
        records: usize,
        new: usize,
        became_unavailable: usize,
        returned: usize,
    },
}

#[derive(Debug, Serialize)]
pub struct Status {
    pub connection: ConnectionState,
    pub use_realtime: bool,
    pub loading: bool,
    pub progress: Option<ScanProgress>,
    pub has_api_key: bool,
    pub auto_connect: bool,
    pub tracked: usize,
    pub unavailable: usize,
    pub visible: usize,
}

/// Clears the loading flag however the load ends.
struct LoadGuard<'a>(&'a AtomicBool);

impl<'a> LoadGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Everything a request handler can reach. Built once in `main` and shared
/// through `web::Data`.
pub struct AppContext {
    pub config: Config,
    pub store: Arc<HistoryStore>,
    pub notices: Arc<NoticeLog>,
    pub channel: Arc<ChannelManager>,
    pub settings: Arc<SettingsFile>,
    pub auto_connect: Arc<AutoConnect>,
    selection: Mutex<MapSelection>,
    listing: SteamClient,
    loading: AtomicBool,
    progress: RwLock<Option<ScanProgress>>,
}

impl AppContext {
    pub fn new(config: Config) -> Arc<Self> {
        let settings = Arc::new(SettingsFile::open(&config.settings_path));
        let stored = settings.get();
        let store = Arc::new(HistoryStore::new(&config.unavailable_map));
        let notices = Arc::new(NoticeLog::default());
        let channel = ChannelManager::new(
            &config,
            stored.api_key.clone(),
            Arc::clone(&store),
            Arc::clone(&notices),
        );
        let auto_connect = Arc::new(AutoConnect::new(Arc::clone(&settings), Arc::clone(&notices)));
        channel.set_observer(auto_connect.clone());

        let selection = MapSelection::new(stored.selected_maps, settings.clone(), channel.clone());
        let listing = SteamClient::new(&config);

        Arc::new(Self {
            config,
            store,
            notices,
            channel,
            settings,
            auto_connect,
            selection: Mutex::new(selection),
            listing,
            loading: AtomicBool::new(false),
            progress: RwLock::new(None),
        })
    }

    /// Opens the scanner channel when realtime mode is on.
    pub fn start(&self) {
        match self.settings.get().api_key {
            Some(key) => info!("Using stored API key {}", mask_key(&key)),
            None => warn!("No API key stored, scans are disabled until one is set"),
        }
        self.channel.start();
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    pub fn status(&self) -> Status {
        let (tracked, unavailable, visible) = self.store.counts();
        let settings = self.settings.get();
        Status {
            connection: self.channel.state(),
            use_realtime: self.channel.use_realtime(),
            loading: self.is_loading(),
            progress: self.progress.read().clone(),
            has_api_key: settings.api_key.is_some(),
            auto_connect: settings.auto_connect,
            tracked,
            unavailable,
            visible,
        }
    }

    /// Runs `f` against the map selection under its lock.
    pub fn with_selection<R>(&self, f: impl FnOnce(&mut MapSelection) -> R) -> R {
        f(&mut self.selection.lock())
    }

    pub async fn load_servers(&self) -> Result<LoadOutcome, LoadError> {
        self.load_servers_with(&self.listing).await
    }

    /// Single-flight load: delegates to the scanner when it is connected,
    /// otherwise scans the listing API and ingests the result as one batch.
    pub async fn load_servers_with<S: ServerListSource>(
        &self,
        source: &S,
    ) -> Result<LoadOutcome, LoadError> {
        let _guard = LoadGuard::acquire(&self.loading).ok_or(LoadError::AlreadyLoading)?;
        let settings = self.settings.get();
        let api_key = settings.api_key.ok_or(LoadError::MissingApiKey)?;

        if self.channel.use_realtime() && self.channel.is_connected() && self.channel.start_scan() {
            info!("Scan delegated to scanner");
            return Ok(LoadOutcome::Delegated);
        }

        let mut maps = self.with_selection(|selection| selection.maps());
        let sentinel = self.store.unavailable_map().to_string();
        if !maps.contains(&sentinel) {
            maps.push(sentinel);
        }
        let plan = ScanPlan {
            maps,
            api_key,
            region: settings.region,
            concurrency: settings.max_threads,
        };
        info!(
            "Scanning {} maps through the listing API ({} at a time)",
            plan.maps.len(),
            plan.concurrency.max(1)
        );

        let records = scan_maps(source, &plan, |progress| {
            *self.progress.write() = Some(progress);
        })
        .await;
        self.progress.write().take();

        let record_count = records.len();
        let outcome = self.store.ingest(records);
        self.report(&outcome);

        Ok(LoadOutcome::Scanned {
            maps: plan.maps.len(),
            records: record_count,
            new: outcome.new.len(),
            became_unavailable: outcome.became_unavailable.len(),
            returned: outcome.returned.len(),
        })
    }

    fn report(&self, outcome: &IngestOutcome) {
        self.notices
            .report_transitions(outcome, self.store.unavailable_map());
        self.auto_connect.observe(outcome);
    }

    /// Validates a key upstream, then stores it and hands it to the scanner.
    pub async fn submit_api_key(&self, key: &str) -> Result<(), ApiError> {
        let key = key.trim();
        if let Err(e) = self.listing.validate_key(key).await {
            self.notices
                .push(Level::Error, format!("API key not accepted: {}", e));
            return Err(ApiError::InvalidApiKey(e.to_string()));
        }

        self.settings
            .update(|settings| settings.api_key = Some(key.to_string()))
            .map_err(|e| {
                error!("Failed to persist API key: {}", e);
                ApiError::Settings(e.to_string())
            })?;
        self.channel.set_api_key(key);
        self.notices.push(Level::Success, "API key saved");
        Ok(())
    }
}
