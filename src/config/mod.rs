use crate::error::{Result, SonarrError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// API key used by instances that were created before real credentials were entered.
pub const PLACEHOLDER_API_KEY: &str = "placeholder";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Configuration {
    pub app: AppConfig,
    #[serde(default)]
    pub sonarr: Vec<SonarrInstance>,
    pub plex: Option<PlexConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(rename = "baseUrl")]
    pub base_url: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SonarrInstance {
    pub id: Option<i32>,
    pub name: String,
    #[serde(rename = "baseUrl")]
    pub base_url: String,
    #[serde(rename = "apiKey")]
    pub api_key: String,
    #[serde(rename = "qualityProfile")]
    pub quality_profile: Option<ResourceRef>,
    #[serde(rename = "rootFolder")]
    pub root_folder: Option<String>,
    #[serde(default)]
    pub tags: Vec<ResourceRef>,
    #[serde(rename = "seasonMonitoring")]
    pub season_monitoring: Option<String>,
    #[serde(rename = "seriesType")]
    pub series_type: Option<SeriesType>,
    #[serde(rename = "searchOnAdd")]
    pub search_on_add: Option<bool>,
    #[serde(rename = "monitorNewItems")]
    pub monitor_new_items: Option<String>,
    #[serde(rename = "bypassIgnored")]
    pub bypass_ignored: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlexConfig {
    pub host: String,
    pub port: u16,
    #[serde(rename = "useSsl", default)]
    pub use_ssl: bool,
    pub token: String,
}

/// A configuration-level pointer at a remote resource: either its numeric ID or its
/// human-friendly name.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ResourceRef {
    Id(i32),
    Name(String),
}

impl ResourceRef {
    /// Numeric ID for literal numbers and for strings made only of digits.
    pub fn as_id(&self) -> Option<i32> {
        match self {
            ResourceRef::Id(id) => Some(*id),
            ResourceRef::Name(name) => {
                if !name.is_empty() && name.chars().all(|c| c.is_ascii_digit()) {
                    name.parse().ok()
                } else {
                    None
                }
            }
        }
    }
}

impl From<&str> for ResourceRef {
    fn from(value: &str) -> Self {
        ResourceRef::Name(value.to_string())
    }
}

impl From<i32> for ResourceRef {
    fn from(value: i32) -> Self {
        ResourceRef::Id(value)
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceRef::Id(id) => write!(f, "{}", id),
            ResourceRef::Name(name) => write!(f, "{}", name),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesType {
    #[default]
    Standard,
    Anime,
    Daily,
}

impl fmt::Display for SeriesType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SeriesType::Standard => "standard",
            SeriesType::Anime => "anime",
            SeriesType::Daily => "daily",
        };
        f.write_str(name)
    }
}

/// Settings a client holds between initializations. Never mutated in place; a
/// re-initialization replaces the whole value.
#[derive(Debug, Clone)]
pub struct InstanceConfiguration {
    pub base_url: String,
    pub api_key: String,
    pub quality_profile: Option<ResourceRef>,
    pub root_folder: Option<String>,
    pub tags: Vec<ResourceRef>,
    pub season_monitoring: Option<String>,
    pub series_type: Option<SeriesType>,
    pub search_on_add: bool,
    pub monitor_new_items: String,
}

impl InstanceConfiguration {
    pub fn from_instance(instance: &SonarrInstance) -> Result<Self> {
        if instance.base_url.trim().is_empty() || instance.api_key.trim().is_empty() {
            return Err(SonarrError::Configuration(
                "Invalid Sonarr configuration: baseUrl and apiKey are required".to_string(),
            ));
        }

        Ok(Self {
            base_url: instance.base_url.clone(),
            api_key: instance.api_key.clone(),
            quality_profile: instance.quality_profile.clone(),
            root_folder: instance.root_folder.clone().filter(|f| !f.is_empty()),
            tags: instance.tags.clone(),
            season_monitoring: instance.season_monitoring.clone().filter(|s| !s.is_empty()),
            series_type: instance.series_type,
            search_on_add: instance.search_on_add.unwrap_or(true),
            monitor_new_items: instance
                .monitor_new_items
                .clone()
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| "all".to_string()),
        })
    }
}

impl SonarrInstance {
    pub fn has_placeholder_credentials(&self) -> bool {
        self.api_key == PLACEHOLDER_API_KEY
    }
}

impl Configuration {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Configuration = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn instance(&self, name: &str) -> Option<&SonarrInstance> {
        self.sonarr.iter().find(|i| i.name == name)
    }
}
