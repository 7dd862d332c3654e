pub mod gateway;
pub mod identity;
pub mod paging;
pub mod resolver;
pub mod tags;
pub mod webhook;

use crate::config::{InstanceConfiguration, PlexConfig, ResourceRef, SeriesType, SonarrInstance};
use crate::error::{Result, SonarrError};
use crate::http::Transport;
use crate::models::{
    ConnectionTestResult, Guid, Item, ItemStatus, QualityProfile, RootFolder, SeriesStatus, Tag,
};
use chrono::{DateTime, Utc};
use gateway::Gateway;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tags::TagCache;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use webhook::{Notification, WebhookState, PLEX_IMPLEMENTATION, WEBHOOK_NAME};

/// Pause before the first webhook check so freshly saved credentials can settle.
pub const STARTUP_DELAY: Duration = Duration::from_secs(1);

/// The owning application's externally reachable address, plus a signal raised once it
/// accepts connections.
#[derive(Debug, Clone)]
pub struct AppEndpoint {
    pub base_url: String,
    pub port: u16,
    listening: watch::Receiver<bool>,
}

impl AppEndpoint {
    pub fn new(base_url: impl Into<String>, port: u16, listening: watch::Receiver<bool>) -> Self {
        Self {
            base_url: base_url.into(),
            port,
            listening,
        }
    }

    /// An endpoint that is already accepting connections.
    pub fn listening(base_url: impl Into<String>, port: u16) -> Self {
        let (_ready, listening) = watch::channel(true);
        Self::new(base_url, port, listening)
    }

    pub fn is_listening(&self) -> bool {
        *self.listening.borrow()
    }
}

/// Per-call choices that take precedence over the instance configuration.
#[derive(Debug, Clone, Default)]
pub struct AddOverrides {
    pub root_folder: Option<String>,
    pub quality_profile: Option<ResourceRef>,
    pub tags: Option<Vec<ResourceRef>>,
    pub search_on_add: Option<bool>,
    pub season_monitoring: Option<String>,
    pub series_type: Option<SeriesType>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SonarrSeries {
    id: i32,
    title: String,
    imdb_id: Option<String>,
    #[serde(default)]
    tvdb_id: i32,
    #[serde(default)]
    ended: bool,
    added: Option<DateTime<Utc>>,
    #[serde(default)]
    seasons: Vec<SonarrSeason>,
}

#[derive(Debug, Deserialize)]
struct SonarrSeason {
    statistics: Option<SeasonStatistics>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeasonStatistics {
    #[serde(default)]
    episode_file_count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImportListExclusion {
    #[serde(default)]
    tvdb_id: i32,
    #[serde(default)]
    title: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SonarrPost {
    title: String,
    tvdb_id: i32,
    quality_profile_id: i32,
    root_folder_path: String,
    add_options: SonarrAddOptions,
    language_profile_id: Option<i32>,
    monitored: bool,
    monitor_new_items: String,
    tags: Vec<i32>,
    series_type: SeriesType,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SonarrAddOptions {
    monitor: String,
    search_for_cutoff_unmet_episodes: bool,
    search_for_missing_episodes: bool,
}

#[derive(Debug, Serialize)]
struct NewTag<'a> {
    label: &'a str,
}

impl From<SonarrSeries> for Item {
    fn from(series: SonarrSeries) -> Self {
        let has_episodes = series.seasons.iter().any(|season| {
            season
                .statistics
                .as_ref()
                .is_some_and(|s| s.episode_file_count > 0)
        });

        let mut guids = vec![Guid::Sonarr(series.id)];
        if let Some(imdb_id) = series.imdb_id.filter(|id| !id.is_empty()) {
            guids.push(Guid::Imdb(imdb_id));
        }
        if series.tvdb_id > 0 {
            guids.push(Guid::Tvdb(series.tvdb_id));
        }

        Item {
            title: series.title,
            guids: guids.into_iter().collect(),
            added: series.added,
            status: if has_episodes {
                ItemStatus::Grabbed
            } else {
                ItemStatus::Requested
            },
            series_status: Some(if series.ended {
                SeriesStatus::Ended
            } else {
                SeriesStatus::Continuing
            }),
        }
    }
}

impl From<ImportListExclusion> for Item {
    fn from(exclusion: ImportListExclusion) -> Self {
        let guids = (exclusion.tvdb_id > 0).then_some(Guid::Tvdb(exclusion.tvdb_id));
        Item::new(exclusion.title, guids)
    }
}

#[derive(Debug)]
struct ClientState {
    instance_id: Option<i32>,
    name: String,
    config: Arc<InstanceConfiguration>,
}

pub struct SonarrClient {
    http: Arc<dyn Transport>,
    app: AppEndpoint,
    state: RwLock<Option<Arc<ClientState>>>,
    webhook_initialized: Mutex<bool>,
    tags: Arc<TagCache>,
    startup_delay: Duration,
}

impl SonarrClient {
    pub fn new(http: Arc<dyn Transport>, app: AppEndpoint) -> Self {
        Self {
            http,
            app,
            state: RwLock::new(None),
            webhook_initialized: Mutex::new(false),
            tags: Arc::new(TagCache::new()),
            startup_delay: STARTUP_DELAY,
        }
    }

    /// Shares a tag cache between clients. Entries stay separated by instance ID.
    pub fn with_tag_cache(mut self, tags: Arc<TagCache>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_startup_delay(mut self, delay: Duration) -> Self {
        self.startup_delay = delay;
        self
    }

    async fn state(&self) -> Result<Arc<ClientState>> {
        self.state
            .read()
            .await
            .clone()
            .ok_or_else(|| SonarrError::Configuration("Sonarr service not initialized".to_string()))
    }

    fn gateway<'a>(&'a self, config: &'a InstanceConfiguration) -> Gateway<'a> {
        Gateway::new(self.http.as_ref(), &config.base_url, &config.api_key)
    }

    /// Loads `instance` and, unless its credentials are placeholders, makes sure the
    /// callback webhook is registered. When the application is not listening yet, the
    /// webhook check waits for it in the background.
    #[instrument(skip(self, instance), fields(instance = %instance.name))]
    pub async fn initialize(self: &Arc<Self>, instance: &SonarrInstance) -> Result<()> {
        self.configure(instance).await?;

        if instance.has_placeholder_credentials() {
            info!("Basic initialization only for {} (placeholder credentials)", instance.name);
            return Ok(());
        }

        info!("Successfully initialized base Sonarr service for {}", instance.name);

        if self.app.is_listening() {
            return self.setup_webhook().await;
        }

        debug!("Application not listening yet, deferring webhook setup for {}", instance.name);
        let client = Arc::clone(self);
        let mut listening = self.app.listening.clone();
        let name = instance.name.clone();
        tokio::spawn(async move {
            if listening.wait_for(|ready| *ready).await.is_err() {
                warn!("Application stopped before webhook setup for instance {}", name);
                return;
            }
            if let Err(e) = client.setup_webhook().await {
                error!(
                    "Failed to setup webhook for instance {} after server start for Sonarr: {}",
                    name, e
                );
            }
        });

        Ok(())
    }

    /// Loads `instance` without touching the server. Operations work afterwards, but the
    /// webhook is only checked by [`SonarrClient::initialize`].
    pub async fn configure(&self, instance: &SonarrInstance) -> Result<()> {
        let config = match InstanceConfiguration::from_instance(instance) {
            Ok(config) => Arc::new(config),
            Err(e) => {
                error!("Failed to initialize Sonarr service for instance {}: {}", instance.name, e);
                return Err(e);
            }
        };

        *self.state.write().await = Some(Arc::new(ClientState {
            instance_id: instance.id,
            name: instance.name.clone(),
            config,
        }));
        Ok(())
    }

    async fn setup_webhook(&self) -> Result<()> {
        let mut initialized = self.webhook_initialized.lock().await;
        if *initialized {
            return Ok(());
        }

        sleep(self.startup_delay).await;

        let state = self.state().await?;
        let expected_url =
            webhook::callback_url(&self.app.base_url, self.app.port, &state.config.base_url)?;
        info!(
            "Credentials verified, attempting to setup webhook with URL for Sonarr: {}",
            expected_url
        );

        match webhook::ensure_webhook(&self.gateway(&state.config), &expected_url).await {
            Ok(outcome) => {
                debug!("Webhook for {} was {:?}", state.name, outcome);
                *initialized = true;
                Ok(())
            }
            Err(e) => {
                error!("Failed to setup webhook for Sonarr: {}", e);
                Err(e)
            }
        }
    }

    /// Checks that `base_url` answers as a Servarr application and that its notification
    /// API is usable with `api_key`. Never fails; problems are reported in the result.
    #[instrument(skip(self, api_key))]
    pub async fn test_connection(&self, base_url: &str, api_key: &str) -> ConnectionTestResult {
        if base_url.is_empty() || api_key.is_empty() {
            return ConnectionTestResult::failed("Base URL and API key are required");
        }

        let gateway = Gateway::new(self.http.as_ref(), base_url, api_key);

        let status: Value = match gateway.get("system/status").await {
            Ok(status) => status,
            Err(SonarrError::RemoteApi { status_text, .. }) => {
                return ConnectionTestResult::failed(format!("Connection failed: {}", status_text));
            }
            Err(SonarrError::Decode(_)) => {
                return ConnectionTestResult::failed("Failed to parse response from server");
            }
            Err(e) => {
                error!("Connection test error: {}", e);
                return ConnectionTestResult::failed("Connection failed: unable to reach server");
            }
        };

        if !status.is_object() {
            return ConnectionTestResult::failed("Invalid response from server");
        }

        let is_servarr = status
            .get("appName")
            .and_then(Value::as_str)
            .is_some_and(|name| name.to_lowercase().contains("arr"));
        if !is_servarr {
            return ConnectionTestResult::failed(
                "Connected service does not appear to be a valid Servarr application",
            );
        }

        match gateway.get::<Vec<Notification>>("notification").await {
            Ok(_) => ConnectionTestResult::ok("Connection successful and webhook API accessible"),
            Err(e) => {
                debug!("Notification API check failed: {}", e);
                ConnectionTestResult::failed(
                    "Connected to Sonarr but cannot access notification API. Check API key permissions.",
                )
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn fetch_quality_profiles(&self) -> Result<Vec<QualityProfile>> {
        let state = self.state().await?;
        self.gateway(&state.config)
            .get("qualityprofile")
            .await
            .inspect_err(|e| error!("Error fetching quality profiles: {}", e))
    }

    #[instrument(skip(self))]
    pub async fn fetch_root_folders(&self) -> Result<Vec<RootFolder>> {
        let state = self.state().await?;
        self.gateway(&state.config)
            .get("rootfolder")
            .await
            .inspect_err(|e| error!("Error fetching root folders: {}", e))
    }

    /// Every series in Sonarr, plus the import-list exclusions unless `bypass_exclusions`.
    #[instrument(skip(self))]
    pub async fn fetch_series(&self, bypass_exclusions: bool) -> Result<HashSet<Item>> {
        let state = self.state().await?;
        let shows: Vec<SonarrSeries> = self
            .gateway(&state.config)
            .get("series")
            .await
            .inspect_err(|e| error!("Error fetching series: {}", e))?;

        let mut items: HashSet<Item> = shows.into_iter().map(Item::from).collect();
        if !bypass_exclusions {
            items.extend(self.fetch_exclusions(paging::DEFAULT_PAGE_SIZE).await?);
        }
        Ok(items)
    }

    #[instrument(skip(self))]
    pub async fn fetch_exclusions(&self, page_size: usize) -> Result<HashSet<Item>> {
        let state = self.state().await?;
        let exclusions = paging::fetch_all(
            &self.gateway(&state.config),
            "importlistexclusion/paged",
            "title",
            page_size,
            |record: ImportListExclusion| Item::from(record),
        )
        .await
        .inspect_err(|e| error!("Error fetching exclusions: {}", e))?;

        info!("Fetched all show {} exclusions", exclusions.len());
        Ok(exclusions.into_iter().collect())
    }

    async fn resolve_root_folder(
        &self,
        config: &InstanceConfiguration,
        override_folder: Option<&str>,
    ) -> Result<String> {
        let explicit = resolver::prefer(
            override_folder.filter(|f| !f.is_empty()),
            config.root_folder.as_deref(),
        );
        if let Some(path) = explicit {
            return Ok(path.to_string());
        }

        let folders = self.fetch_root_folders().await?;
        resolver::first_root_folder(&folders)
    }

    async fn resolve_quality_profile(
        &self,
        config: &InstanceConfiguration,
        override_profile: Option<&ResourceRef>,
    ) -> Result<i32> {
        let reference = resolver::prefer(override_profile, config.quality_profile.as_ref());
        if let Some(id) = reference.and_then(ResourceRef::as_id) {
            return Ok(id);
        }

        let profiles = self.fetch_quality_profiles().await?;
        resolver::quality_profile_id(reference, &profiles)
    }

    async fn resolve_tags(
        &self,
        config: &InstanceConfiguration,
        overrides: Option<&[ResourceRef]>,
    ) -> Result<Vec<i32>> {
        if resolver::selected_tags(overrides, &config.tags).is_empty() {
            return Ok(Vec::new());
        }

        let existing = self.get_tags().await?;
        Ok(resolver::tag_ids(overrides, &config.tags, &existing))
    }

    #[instrument(skip(self, item, overrides), fields(title = %item.title))]
    pub async fn add_series(&self, item: &Item, overrides: &AddOverrides) -> Result<()> {
        let state = self.state().await?;
        let config = &state.config;

        let should_search = resolver::prefer(overrides.search_on_add, Some(config.search_on_add))
            .unwrap_or(true);
        let monitor = resolver::season_monitoring(
            overrides.season_monitoring.as_deref(),
            config.season_monitoring.as_deref(),
        );

        let root_folder_path = self
            .resolve_root_folder(config, overrides.root_folder.as_deref())
            .await?;
        let quality_profile_id = self
            .resolve_quality_profile(config, overrides.quality_profile.as_ref())
            .await?;
        let tags = self.resolve_tags(config, overrides.tags.as_deref()).await?;
        let series_type = resolver::series_type(overrides.series_type, config.series_type);

        let show = SonarrPost {
            title: item.title.clone(),
            tvdb_id: item.tvdb_id().unwrap_or(0),
            quality_profile_id,
            root_folder_path: root_folder_path.clone(),
            add_options: SonarrAddOptions {
                monitor,
                search_for_cutoff_unmet_episodes: should_search,
                search_for_missing_episodes: should_search,
            },
            language_profile_id: None,
            monitored: true,
            monitor_new_items: config.monitor_new_items.clone(),
            tags: tags.clone(),
            series_type,
        };

        match self.gateway(config).post::<Value, _>("series", &show).await {
            Ok(_) => {
                let tag_list = if tags.is_empty() {
                    "none".to_string()
                } else {
                    tags.iter().map(i32::to_string).collect::<Vec<_>>().join(", ")
                };
                info!(
                    "Sent {} to Sonarr (Quality Profile: {}, Root Folder: {}, Tags: {}, Series Type: {})",
                    item.title, quality_profile_id, root_folder_path, tag_list, series_type
                );
                Ok(())
            }
            Err(e) => {
                error!("Failed to add series '{}': {}", item.title, e);
                Err(e)
            }
        }
    }

    #[instrument(skip(self, item), fields(title = %item.title))]
    pub async fn delete_series(&self, item: &Item, delete_files: bool) -> Result<()> {
        let state = self.state().await?;

        let sonarr_id = identity::resolve_remote_id(item, || self.fetch_series(true))
            .await
            .inspect_err(|e| error!("Error deleting from Sonarr: {}", e))?;

        self.gateway(&state.config)
            .delete_with_query(
                &format!("series/{}", sonarr_id),
                &[
                    ("deleteFiles", delete_files.to_string()),
                    ("addImportListExclusion", "false".to_string()),
                ],
            )
            .await
            .inspect_err(|e| error!("Error deleting from Sonarr: {}", e))?;

        info!("Deleted {} from Sonarr", item.title);
        Ok(())
    }

    /// Tags known to Sonarr, served from the instance's cache while it is fresh.
    pub async fn get_tags(&self) -> Result<Vec<Tag>> {
        let state = self.state().await?;
        let gateway = self.gateway(&state.config);
        self.tags
            .get_or_refresh(state.instance_id, || gateway.get("tag"))
            .await
    }

    pub async fn invalidate_tags_cache(&self) -> Result<()> {
        let state = self.state().await?;
        self.tags.invalidate(state.instance_id).await;
        Ok(())
    }

    /// Creates `label`, or returns the existing tag when Sonarr reports a conflict.
    #[instrument(skip(self))]
    pub async fn create_tag(&self, label: &str) -> Result<Tag> {
        let state = self.state().await?;

        match self.gateway(&state.config).post::<Tag, _>("tag", &NewTag { label }).await {
            Ok(tag) => {
                self.tags.invalidate(state.instance_id).await;
                Ok(tag)
            }
            Err(e) if e.status() == Some(409) => {
                debug!("Tag \"{}\" already exists in Sonarr, skipping creation", label);
                self.tags.invalidate(state.instance_id).await;
                match self.get_tags().await?.into_iter().find(|t| t.label == label) {
                    Some(existing) => Ok(existing),
                    None => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self))]
    pub async fn delete_tag(&self, tag_id: i32) -> Result<()> {
        let state = self.state().await?;
        self.gateway(&state.config)
            .delete(&format!("tag/{}", tag_id))
            .await?;
        self.tags.invalidate(state.instance_id).await;
        Ok(())
    }

    /// Replaces the tags on a series, keeping every other field Sonarr holds for it.
    #[instrument(skip(self))]
    pub async fn update_series_tags(&self, series_id: i32, tag_ids: &[i32]) -> Result<()> {
        let state = self.state().await?;
        self.put_series_tags(&self.gateway(&state.config), series_id, tag_ids)
            .await
            .inspect_err(|e| error!("Failed to update tags for series {}: {}", series_id, e))
    }

    async fn put_series_tags(
        &self,
        gateway: &Gateway<'_>,
        series_id: i32,
        tag_ids: &[i32],
    ) -> Result<()> {
        let path = format!("series/{}", series_id);
        let mut series: Value = gateway.get(&path).await?;

        let mut unique: Vec<i32> = Vec::with_capacity(tag_ids.len());
        for id in tag_ids {
            if !unique.contains(id) {
                unique.push(*id);
            }
        }
        let record = series.as_object_mut().ok_or_else(|| {
            SonarrError::Decode(serde::de::Error::custom(format!(
                "series {} is not a JSON object",
                series_id
            )))
        })?;
        record.insert("tags".to_string(), json!(unique));

        gateway.put::<Value, _>(&path, &series).await?;
        debug!("Updated tags for series ID {}: {:?}", series_id, unique);
        Ok(())
    }

    #[instrument(skip(self, plex))]
    pub async fn configure_plex_notification(&self, plex: &PlexConfig) -> Result<()> {
        let state = self.state().await?;
        webhook::replace_plex_notification(&self.gateway(&state.config), plex)
            .await
            .inspect_err(|e| error!("Error configuring Plex notification for Sonarr: {}", e))?;
        info!("Successfully configured Plex notification for Sonarr");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn remove_plex_notification(&self) -> Result<()> {
        let state = self.state().await?;
        let removed = webhook::remove_notification(&self.gateway(&state.config), |n| {
            n.implementation == PLEX_IMPLEMENTATION
        })
        .await
        .inspect_err(|e| error!("Error removing Plex notification from Sonarr: {}", e))?;

        if removed {
            info!("Successfully removed Plex notification from Sonarr");
        } else {
            info!("No Plex notification found to remove from Sonarr");
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn remove_webhook(&self) -> Result<()> {
        let state = self.state().await?;
        let removed = webhook::remove_notification(&self.gateway(&state.config), |n| {
            n.name == WEBHOOK_NAME
        })
        .await
        .inspect_err(|e| error!("Failed to remove webhook for Sonarr: {}", e))?;

        if removed {
            info!("Successfully removed {} webhook for Sonarr", WEBHOOK_NAME);
        }
        Ok(())
    }

    /// Current webhook state without changing anything on the server.
    pub async fn webhook_state(&self) -> Result<WebhookState> {
        let state = self.state().await?;
        let expected_url =
            webhook::callback_url(&self.app.base_url, self.app.port, &state.config.base_url)?;
        let existing: Vec<Notification> = self.gateway(&state.config).get("notification").await?;
        Ok(webhook::classify(&existing, WEBHOOK_NAME, &expected_url))
    }
}
