use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// One identifier under which a series is known.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Guid {
    /// ID assigned by the Sonarr server itself.
    Sonarr(i32),
    /// TheTVDB catalog ID.
    Tvdb(i32),
    Imdb(String),
    Other(String),
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Guid::Sonarr(id) => write!(f, "sonarr:{}", id),
            Guid::Tvdb(id) => write!(f, "tvdb:{}", id),
            Guid::Imdb(id) => f.write_str(id),
            Guid::Other(raw) => f.write_str(raw),
        }
    }
}

impl Guid {
    /// Parses the prefixed string form; anything unrecognised is kept as `Other`.
    pub fn parse(s: &str) -> Guid {
        let parsed = if let Some(id) = s.strip_prefix("sonarr:") {
            id.parse().ok().map(Guid::Sonarr)
        } else if let Some(id) = s.strip_prefix("tvdb:") {
            id.parse().ok().map(Guid::Tvdb)
        } else if s.starts_with("tt") {
            Some(Guid::Imdb(s.to_string()))
        } else {
            None
        };
        parsed.unwrap_or_else(|| Guid::Other(s.to_string()))
    }
}

impl FromStr for Guid {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Guid::parse(s))
    }
}

impl Serialize for Guid {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Guid {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Guid::parse(&raw))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Requested,
    Grabbed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesStatus {
    Ended,
    Continuing,
}

/// A series as tracked across the local catalog and Sonarr. Two items are the same
/// item when they carry the same identifier set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub title: String,
    pub guids: BTreeSet<Guid>,
    pub added: Option<DateTime<Utc>>,
    pub status: ItemStatus,
    pub series_status: Option<SeriesStatus>,
}

impl Item {
    pub fn new(title: impl Into<String>, guids: impl IntoIterator<Item = Guid>) -> Self {
        Self {
            title: title.into(),
            guids: guids.into_iter().collect(),
            added: None,
            status: ItemStatus::Requested,
            series_status: None,
        }
    }

    pub fn sonarr_id(&self) -> Option<i32> {
        self.guids.iter().find_map(|g| match g {
            Guid::Sonarr(id) => Some(*id),
            _ => None,
        })
    }

    pub fn tvdb_id(&self) -> Option<i32> {
        self.guids.iter().find_map(|g| match g {
            Guid::Tvdb(id) => Some(*id),
            _ => None,
        })
    }
}

impl PartialEq for Item {
    fn eq(&self, other: &Self) -> bool {
        self.guids == other.guids
    }
}

impl Eq for Item {}

impl Hash for Item {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.guids.hash(state);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityProfile {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootFolder {
    pub id: i32,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i32,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionTestResult {
    pub success: bool,
    pub message: String,
}

impl ConnectionTestResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self { success: true, message: message.into() }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self { success: false, message: message.into() }
    }
}
