//! Sonarr integration for a media catalog: resolves configured profiles, folders and
//! tags against the live server, keeps a single callback webhook registered, caches tag
//! listings per instance and maps catalog items back to Sonarr IDs.

pub mod config;
pub mod error;
pub mod http;
pub mod models;
pub mod sonarr;

pub use error::{Result, SonarrError};
pub use sonarr::{AddOverrides, AppEndpoint, SonarrClient};
