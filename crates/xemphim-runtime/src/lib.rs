mod db;

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use xemphim_api::BackendClient;
use xemphim_core::config::AppConfig;
use xemphim_core::models::{
    CatalogPage, CategorySummary, ColorScheme, EpisodeRecord, Notification, NotificationPage,
    NotificationTarget, ServerOption, ThemePreference,
};
use xemphim_core::notifications::{NotificationStore, UnreadState};
use xemphim_core::player::PlayerEmbed;
use xemphim_core::servers::{ServerListState, ServerSelector};
use xemphim_core::storage::{KeyValueStore, DEVICE_TOKEN_KEY};
use xemphim_core::theme::{system_color_scheme, ThemeStore};

pub use db::StorageHandle;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("config error: {0}")]
    Config(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("api error: {0}")]
    Api(String),
    #[error("not found: {0}")]
    NotFound(String),
}

/// Page size used when scanning history for one notification.
const HISTORY_SCAN_LIMIT: u32 = 50;

/// Application services with their collaborators wired in.
pub struct Runtime {
    config: Arc<RwLock<AppConfig>>,
    storage: StorageHandle,
    backend: RwLock<BackendClient<StorageHandle>>,
    theme: ThemeStore<StorageHandle>,
    notifications: NotificationStore,
    /// Ids already counted off the badge this session.
    marked_read: Mutex<HashSet<String>>,
    player: Mutex<ServerSelector>,
}

impl Runtime {
    /// Load config from disk and open the default database.
    pub fn new() -> Result<Self, RuntimeError> {
        let config = AppConfig::load().map_err(|e| RuntimeError::Config(e.to_string()))?;
        let db_path =
            AppConfig::ensure_db_path().map_err(|e| RuntimeError::Config(e.to_string()))?;
        let storage = StorageHandle::open(&db_path)
            .ok_or_else(|| RuntimeError::Storage("failed to open database".into()))?;
        Self::with_parts(config, storage)
    }

    pub fn with_parts(config: AppConfig, storage: StorageHandle) -> Result<Self, RuntimeError> {
        let backend = BackendClient::new(&config.api, storage.clone())
            .map_err(|e| RuntimeError::Config(e.to_string()))?;

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            theme: ThemeStore::new(storage.clone()),
            storage,
            backend: RwLock::new(backend),
            notifications: NotificationStore::new(),
            marked_read: Mutex::new(HashSet::new()),
            player: Mutex::new(ServerSelector::new()),
        })
    }

    /// Load the theme and sync the unread badge concurrently.
    pub async fn initialize(&self) -> (ThemePreference, UnreadState) {
        futures::future::join(self.load_theme(), self.refresh_unread()).await
    }

    pub async fn get_config(&self) -> AppConfig {
        self.config.read().await.clone()
    }

    pub async fn update_config(&self, new_config: AppConfig) -> Result<(), RuntimeError> {
        let backend = BackendClient::new(&new_config.api, self.storage.clone())
            .map_err(|e| RuntimeError::Config(e.to_string()))?;
        new_config
            .save()
            .map_err(|e| RuntimeError::Config(e.to_string()))?;
        *self.backend.write().await = backend;
        *self.config.write().await = new_config;
        Ok(())
    }

    async fn backend(&self) -> BackendClient<StorageHandle> {
        self.backend.read().await.clone()
    }

    // ── Theme ───────────────────────────────────────────────────

    pub async fn load_theme(&self) -> ThemePreference {
        self.theme.load().await
    }

    pub fn theme_preference(&self) -> ThemePreference {
        self.theme.preference()
    }

    pub fn theme_loading(&self) -> bool {
        self.theme.is_loading()
    }

    /// Effective scheme against the live OS signal.
    pub fn color_scheme(&self) -> ColorScheme {
        self.theme.color_scheme(system_color_scheme())
    }

    pub async fn set_theme(&self, pref: ThemePreference) -> Result<(), RuntimeError> {
        self.theme
            .set_preference(pref)
            .await
            .map_err(|e| RuntimeError::Storage(e.to_string()))
    }

    pub async fn toggle_theme(&self) -> Result<ThemePreference, RuntimeError> {
        self.theme
            .toggle()
            .await
            .map_err(|e| RuntimeError::Storage(e.to_string()))
    }

    pub async fn reset_theme(&self) -> Result<(), RuntimeError> {
        self.theme
            .reset()
            .await
            .map_err(|e| RuntimeError::Storage(e.to_string()))
    }

    // ── Notifications ───────────────────────────────────────────

    /// Handle for badge surfaces; shares state with the runtime.
    pub fn notification_store(&self) -> NotificationStore {
        self.notifications.clone()
    }

    pub fn unread_state(&self) -> UnreadState {
        self.notifications.snapshot()
    }

    /// Re-sync the unread count from the backend. Failures are recorded in
    /// the returned state, never raised.
    pub async fn refresh_unread(&self) -> UnreadState {
        let backend = self.backend().await;
        self.notifications.fetch_unread_count(&backend).await;
        self.notifications.snapshot()
    }

    /// A notification arrived while the app is in the foreground.
    pub fn on_notification_received(&self) {
        self.notifications.increment_unread();
    }

    /// Mark an unread notification as read: decrement locally, tell the
    /// backend, then re-sync the count once the backend has accepted it.
    ///
    /// Notifications that are already read, or were already marked this
    /// session, are left alone. The local decrement stays if the request fails.
    pub async fn mark_notification_read(
        &self,
        notification: &Notification,
    ) -> Result<(), RuntimeError> {
        let id = notification.id.as_str();
        if notification.is_read || !self.remember_read(id) {
            tracing::debug!(notification_id = id, "Already read, not decrementing");
            return Ok(());
        }

        self.notifications.decrement_unread();
        let sent = self
            .backend()
            .await
            .mark_as_read(id)
            .await
            .map_err(|e| {
                tracing::warn!(notification_id = id, "Error marking notification as read: {e}");
                RuntimeError::Api(e.to_string())
            })?;

        if sent {
            self.refresh_unread().await;
        }
        Ok(())
    }

    /// Mark the notification read and return where it leads.
    pub async fn open_notification(
        &self,
        notification: &Notification,
    ) -> Result<Option<NotificationTarget>, RuntimeError> {
        self.mark_notification_read(notification).await?;
        Ok(notification.target())
    }

    /// Look a notification up by id, walking the history page by page.
    pub async fn find_notification(&self, id: &str) -> Result<Option<Notification>, RuntimeError> {
        let mut page = 1;
        loop {
            let result = self.notifications(page, HISTORY_SCAN_LIMIT).await?;
            if let Some(found) = result.data.iter().find(|n| n.id == id) {
                return Ok(Some(found.clone()));
            }
            match result.next_page() {
                Some(next) if next > page => page = next,
                _ => return Ok(None),
            }
        }
    }

    fn remember_read(&self, id: &str) -> bool {
        let mut marked = self.marked_read.lock().unwrap_or_else(|e| e.into_inner());
        marked.insert(id.to_string())
    }

    pub fn mark_all_read_locally(&self) {
        self.notifications.reset_unread();
    }

    pub async fn notifications(
        &self,
        page: u32,
        limit: u32,
    ) -> Result<NotificationPage, RuntimeError> {
        self.backend()
            .await
            .notifications(page, limit)
            .await
            .map_err(|e| RuntimeError::Api(e.to_string()))
    }

    pub async fn save_device_token(&self, token: &str) -> Result<(), RuntimeError> {
        self.storage
            .set(DEVICE_TOKEN_KEY, token)
            .await
            .map_err(|e| RuntimeError::Storage(e.to_string()))
    }

    pub async fn device_token(&self) -> Option<String> {
        self.backend().await.device_token().await
    }

    /// Poll the unread count on the configured interval until aborted.
    pub fn spawn_unread_poller(self: &Arc<Self>) -> JoinHandle<()> {
        let runtime = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                let state = runtime.refresh_unread().await;
                tracing::debug!(unread = state.unread_count, "Unread poll");

                let interval = runtime.get_config().await.notifications.poll_interval_secs;
                tokio::time::sleep(Duration::from_secs(interval.max(1))).await;
            }
        })
    }

    // ── Playback ────────────────────────────────────────────────

    /// Navigate to an episode and load its servers.
    ///
    /// Responses for an episode the user has already left are dropped.
    pub async fn open_episode(&self, slug: &str) -> ServerListState {
        self.with_player(|p| p.navigate(slug));

        let result = self.backend().await.episode(slug).await;

        self.with_player(|p| {
            match result {
                Ok(mut record) => {
                    // Key by the requested slug; the payload may echo a canonical one.
                    record.slug = slug.to_string();
                    p.apply_episode(&record);
                }
                Err(e) => {
                    tracing::warn!(slug, "Failed to load episode: {e}");
                    p.apply_error(slug, e.to_string());
                }
            }
            p.state()
        })
    }

    /// Loaded record for the episode on screen.
    pub fn current_episode(&self) -> Option<EpisodeRecord> {
        self.with_player(|p| p.record().cloned())
    }

    /// Follow the current episode's "next" link. `None` when there is none.
    pub async fn open_next_episode(&self) -> Option<ServerListState> {
        let slug = self.current_episode()?.next_episode.filter(|s| !s.is_empty())?;
        Some(self.open_episode(&slug).await)
    }

    /// Follow the current episode's "previous" link. `None` when there is none.
    pub async fn open_previous_episode(&self) -> Option<ServerListState> {
        let slug = self.current_episode()?.prev_episode.filter(|s| !s.is_empty())?;
        Some(self.open_episode(&slug).await)
    }

    /// Choose a server by id. Unknown ids leave the selection alone.
    pub fn select_server(&self, id: &str) -> Option<ServerOption> {
        self.with_player(|p| p.select(id).cloned())
    }

    pub fn servers(&self) -> Vec<ServerOption> {
        self.with_player(|p| p.servers().to_vec())
    }

    pub fn active_server(&self) -> Option<ServerOption> {
        self.with_player(|p| p.active().cloned())
    }

    pub fn server_state(&self) -> ServerListState {
        self.with_player(|p| p.state())
    }

    /// Player page for the active server, or `None` when nothing is playable.
    pub async fn player_embed(&self) -> Option<PlayerEmbed> {
        let url = self.active_server().map(|s| s.url);
        let config = self.get_config().await;
        PlayerEmbed::build(url.as_deref(), &config.player)
    }

    // ── Catalog ─────────────────────────────────────────────────

    pub async fn latest(&self) -> Result<CatalogPage, RuntimeError> {
        self.backend()
            .await
            .latest()
            .await
            .map_err(|e| RuntimeError::Api(e.to_string()))
    }

    pub async fn search(&self, query: &str) -> Result<Vec<CategorySummary>, RuntimeError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        self.backend()
            .await
            .search(query)
            .await
            .map_err(|e| RuntimeError::Api(e.to_string()))
    }

    pub async fn series(&self, slug: &str) -> Result<CategorySummary, RuntimeError> {
        self.backend()
            .await
            .category(slug)
            .await
            .map_err(|e| RuntimeError::Api(e.to_string()))
    }

    fn with_player<T>(&self, f: impl FnOnce(&mut ServerSelector) -> T) -> T {
        let mut player = self.player.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut player)
    }
}
