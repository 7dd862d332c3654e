use thiserror::Error;

#[derive(Error, Debug)]
pub enum SonarrError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Sonarr API error: {status_text}")]
    RemoteApi { status: u16, status_text: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to decode Sonarr response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("No root folders configured in Sonarr")]
    NoRootFolder,

    #[error("No quality profiles configured in Sonarr")]
    NoQualityProfile,

    #[error("Unable to resolve Sonarr ID: {0}")]
    IdentityNotFound(String),

    #[error("Failed to set up webhook: {0}")]
    WebhookSetup(#[source] Box<SonarrError>),
}

impl SonarrError {
    /// HTTP status of a remote failure, if this error carries one.
    pub fn status(&self) -> Option<u16> {
        match self {
            SonarrError::RemoteApi { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SonarrError>;
