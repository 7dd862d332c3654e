use crate::config::PlexConfig;
use crate::error::{Result, SonarrError};
use crate::sonarr::gateway::Gateway;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error, info};
use url::Url;

/// Name the callback registration is kept under on the Sonarr side.
pub const WEBHOOK_NAME: &str = "Arrsync";
pub const WEBHOOK_PATH: &str = "/v1/notifications/webhook";
pub const PLEX_IMPLEMENTATION: &str = "PlexServer";

#[derive(Debug, Clone, Deserialize)]
pub struct Notification {
    pub id: i32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub implementation: String,
    #[serde(default)]
    pub fields: Vec<NotificationField>,
}

impl Notification {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationField {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub order: Option<i32>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub label: Option<String>,
    #[serde(default)]
    pub value: Value,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none", default)]
    pub field_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub advanced: Option<bool>,
}

impl NotificationField {
    fn plain(name: &str, value: Value) -> Self {
        Self {
            order: None,
            name: name.to_string(),
            label: None,
            value,
            field_type: None,
            advanced: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvents {
    pub on_grab: bool,
    pub on_download: bool,
    pub on_upgrade: bool,
    pub on_import_complete: bool,
    pub on_rename: bool,
    pub on_series_add: bool,
    pub on_series_delete: bool,
    pub on_episode_file_delete: bool,
    pub on_episode_file_delete_for_upgrade: bool,
    pub on_health_issue: bool,
    pub include_health_warnings: bool,
    pub on_health_restored: bool,
    pub on_application_update: bool,
    pub on_manual_interaction_required: bool,
}

/// Body of a notification create request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationDefinition {
    pub name: String,
    #[serde(flatten)]
    pub events: NotificationEvents,
    pub fields: Vec<NotificationField>,
    pub implementation_name: String,
    pub implementation: String,
    pub config_contract: String,
    pub info_link: String,
    pub tags: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookState {
    Absent,
    PresentCorrect,
    PresentStale { id: i32 },
}

/// Where Sonarr should call us back.
///
/// The application address is parsed as a URL, with `http://` assumed when it has no
/// scheme. A port is only added when the address has none and is not `https`. The
/// query carries the Sonarr base URL minus its scheme and every non-alphanumeric
/// character, which is how incoming calls are attributed to an instance.
pub fn callback_url(app_base_url: &str, port: u16, sonarr_base_url: &str) -> Result<String> {
    let mut url = match Url::parse(app_base_url) {
        Ok(url) if !url.cannot_be_a_base() => url,
        _ => Url::parse(&format!("http://{}", app_base_url))?,
    };

    if url.port().is_none() && url.scheme() != "https" {
        url.set_port(Some(port)).map_err(|_| {
            SonarrError::Configuration(format!("Cannot set port on application URL {}", app_base_url))
        })?;
    }

    url.set_path(WEBHOOK_PATH);
    url.query_pairs_mut()
        .append_pair("instanceId", &instance_identifier(sonarr_base_url));

    Ok(url.to_string())
}

pub fn instance_identifier(sonarr_base_url: &str) -> String {
    let scheme = ["https://", "http://"]
        .iter()
        .filter_map(|prefix| sonarr_base_url.find(prefix).map(|at| (at, prefix.len())))
        .min();

    let stripped = match scheme {
        Some((at, len)) => format!("{}{}", &sonarr_base_url[..at], &sonarr_base_url[at + len..]),
        None => sonarr_base_url.to_string(),
    };

    stripped.chars().filter(char::is_ascii_alphanumeric).collect()
}

pub fn classify(existing: &[Notification], name: &str, expected_url: &str) -> WebhookState {
    match existing.iter().find(|n| n.name == name) {
        None => WebhookState::Absent,
        Some(hook) if hook.field("url").and_then(Value::as_str) == Some(expected_url) => {
            WebhookState::PresentCorrect
        }
        Some(hook) => WebhookState::PresentStale { id: hook.id },
    }
}

pub fn webhook_definition(url: &str) -> NotificationDefinition {
    NotificationDefinition {
        name: WEBHOOK_NAME.to_string(),
        events: NotificationEvents {
            on_download: true,
            on_upgrade: true,
            on_import_complete: true,
            ..Default::default()
        },
        fields: vec![
            NotificationField {
                order: Some(0),
                name: "url".to_string(),
                label: Some("Webhook URL".to_string()),
                value: json!(url),
                field_type: Some("url".to_string()),
                advanced: Some(false),
            },
            NotificationField {
                order: Some(1),
                name: "method".to_string(),
                label: Some("Method".to_string()),
                // 1 = POST
                value: json!(1),
                field_type: Some("select".to_string()),
                advanced: Some(false),
            },
        ],
        implementation_name: "Webhook".to_string(),
        implementation: "Webhook".to_string(),
        config_contract: "WebhookSettings".to_string(),
        info_link: "https://wiki.servarr.com/sonarr/supported#webhook".to_string(),
        tags: Vec::new(),
    }
}

pub fn plex_definition(plex: &PlexConfig) -> NotificationDefinition {
    NotificationDefinition {
        name: "Plex Media Server".to_string(),
        events: NotificationEvents {
            on_download: true,
            on_upgrade: true,
            on_rename: true,
            on_series_delete: true,
            on_episode_file_delete: true,
            on_episode_file_delete_for_upgrade: true,
            ..Default::default()
        },
        fields: vec![
            NotificationField::plain("host", json!(plex.host)),
            NotificationField::plain("port", json!(plex.port)),
            NotificationField::plain("useSsl", json!(plex.use_ssl)),
            NotificationField::plain("authToken", json!(plex.token)),
            NotificationField::plain("updateLibrary", json!(true)),
        ],
        implementation_name: "Plex Media Server".to_string(),
        implementation: PLEX_IMPLEMENTATION.to_string(),
        config_contract: "PlexServerSettings".to_string(),
        info_link: "https://wiki.servarr.com/sonarr/supported#plexserver".to_string(),
        tags: Vec::new(),
    }
}

/// Brings the named callback registration in line with `expected_url`: created when
/// absent, replaced when it points elsewhere, left alone when it already matches.
pub async fn ensure_webhook(gateway: &Gateway<'_>, expected_url: &str) -> Result<WebhookState> {
    let existing: Vec<Notification> = gateway.get("notification").await?;
    let state = classify(&existing, WEBHOOK_NAME, expected_url);

    match &state {
        WebhookState::PresentCorrect => {
            info!("{} Sonarr webhook exists with correct URL", WEBHOOK_NAME);
            return Ok(state);
        }
        WebhookState::PresentStale { id } => {
            info!("{} webhook URL mismatch, recreating webhook for Sonarr", WEBHOOK_NAME);
            delete_notification(gateway, *id).await?;
        }
        WebhookState::Absent => {}
    }

    let definition = webhook_definition(expected_url);
    match gateway.post::<Value, _>("notification", &definition).await {
        Ok(response) => {
            info!("Successfully created {} webhook with URL for Sonarr: {}", WEBHOOK_NAME, expected_url);
            debug!("Webhook creation response: {}", response);
            Ok(state)
        }
        Err(e) => {
            error!(
                "Error creating webhook for Sonarr. Full config: {}",
                serde_json::to_string(&definition).unwrap_or_default()
            );
            error!("Creation error details for Sonarr: {}", e);
            Err(SonarrError::WebhookSetup(Box::new(e)))
        }
    }
}

/// Deletes the first notification `select` picks. Returns whether one was found.
pub async fn remove_notification(
    gateway: &Gateway<'_>,
    select: impl Fn(&Notification) -> bool,
) -> Result<bool> {
    let existing: Vec<Notification> = gateway.get("notification").await?;
    match existing.iter().find(|n| select(n)) {
        Some(notification) => {
            delete_notification(gateway, notification.id).await?;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Replaces any Plex server notification with one built from `plex`.
pub async fn replace_plex_notification(gateway: &Gateway<'_>, plex: &PlexConfig) -> Result<()> {
    remove_notification(gateway, |n| n.implementation == PLEX_IMPLEMENTATION).await?;
    gateway
        .post::<Value, _>("notification", &plex_definition(plex))
        .await?;
    Ok(())
}

async fn delete_notification(gateway: &Gateway<'_>, id: i32) -> Result<()> {
    gateway.delete(&format!("notification/{}", id)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hook(id: i32, name: &str, url: &str) -> Notification {
        Notification {
            id,
            name: name.to_string(),
            implementation: "Webhook".to_string(),
            fields: vec![NotificationField::plain("url", json!(url))],
        }
    }

    #[test]
    fn https_target_omits_port() {
        let url = callback_url("https://example.com", 3003, "http://sonarr:8989").unwrap();
        assert_eq!(
            url,
            "https://example.com/v1/notifications/webhook?instanceId=sonarr8989"
        );
    }

    #[test]
    fn http_target_includes_configured_port() {
        let url = callback_url("http://example.com", 3000, "https://tv.example.org/sonarr").unwrap();
        assert_eq!(
            url,
            "http://example.com:3000/v1/notifications/webhook?instanceId=tvexampleorgsonarr"
        );
    }

    #[test]
    fn explicit_port_is_kept() {
        let url = callback_url("http://example.com:8080/base", 3000, "http://sonarr").unwrap();
        assert_eq!(url, "http://example.com:8080/v1/notifications/webhook?instanceId=sonarr");
    }

    #[test]
    fn bare_host_is_treated_as_http() {
        let url = callback_url("arrsync.lan", 3003, "http://192.168.1.10:8989").unwrap();
        assert_eq!(
            url,
            "http://arrsync.lan:3003/v1/notifications/webhook?instanceId=1921681108989"
        );
    }

    #[test]
    fn identifier_strips_scheme_and_punctuation() {
        assert_eq!(instance_identifier("https://sonarr.example.com:443/"), "sonarrexamplecom443");
        assert_eq!(instance_identifier("sonarr_local"), "sonarrlocal");
    }

    #[test]
    fn classifies_registrations_by_name_and_url() {
        let expected = "http://example.com:3000/v1/notifications/webhook?instanceId=x";
        assert_eq!(classify(&[], WEBHOOK_NAME, expected), WebhookState::Absent);
        assert_eq!(
            classify(&[hook(3, "Other", expected)], WEBHOOK_NAME, expected),
            WebhookState::Absent
        );
        assert_eq!(
            classify(&[hook(3, WEBHOOK_NAME, expected)], WEBHOOK_NAME, expected),
            WebhookState::PresentCorrect
        );
        assert_eq!(
            classify(&[hook(3, WEBHOOK_NAME, "http://old")], WEBHOOK_NAME, expected),
            WebhookState::PresentStale { id: 3 }
        );
    }

    #[test]
    fn webhook_definition_serializes_sonarr_shape() {
        let body = serde_json::to_value(webhook_definition("http://x/")).unwrap();
        assert_eq!(body["name"], WEBHOOK_NAME);
        assert_eq!(body["onDownload"], true);
        assert_eq!(body["onGrab"], false);
        assert_eq!(body["configContract"], "WebhookSettings");
        assert_eq!(body["fields"][0]["value"], "http://x/");
        assert_eq!(body["fields"][1]["type"], "select");
    }
}
