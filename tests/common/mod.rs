#![allow(dead_code)]

use arrsync::config::{ResourceRef, SonarrInstance};
use arrsync::http::{ApiRequest, ApiResponse, Transport};
use arrsync::{AppEndpoint, SonarrClient};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

pub const APP_URL: &str = "http://arrsync.local";
pub const APP_PORT: u16 = 3003;
pub const SONARR_URL: &str = "http://sonarr:8989";
pub const EXPECTED_WEBHOOK: &str =
    "http://arrsync.local:3003/v1/notifications/webhook?instanceId=sonarr8989";

/// Scripted Sonarr. Each route answers from a queue; the last answer repeats.
#[derive(Default)]
pub struct FakeTransport {
    routes: Mutex<HashMap<(Method, String), VecDeque<(u16, String)>>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn on(&self, method: Method, path: &str, status: u16, body: Value) -> &Self {
        let raw = if body.is_null() {
            String::new()
        } else {
            body.to_string()
        };
        self.on_raw(method, path, status, &raw)
    }

    pub fn on_raw(&self, method: Method, path: &str, status: u16, body: &str) -> &Self {
        self.routes
            .lock()
            .unwrap()
            .entry((method, path.to_string()))
            .or_default()
            .push_back((status, body.to_string()));
        self
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self, method: Method, path: &str) -> Vec<ApiRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && api_path(r) == path)
            .collect()
    }

    pub fn count(&self, method: Method, path: &str) -> usize {
        self.calls(method, path).len()
    }

    pub fn mutations(&self) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.method != Method::GET)
            .count()
    }
}

pub fn api_path(request: &ApiRequest) -> String {
    request
        .url
        .path()
        .trim_start_matches("/api/v3/")
        .to_string()
}

#[async_trait::async_trait]
impl Transport for FakeTransport {
    async fn execute(&self, request: ApiRequest) -> arrsync::Result<ApiResponse> {
        let key = (request.method.clone(), api_path(&request));
        self.requests.lock().unwrap().push(request);

        let mut routes = self.routes.lock().unwrap();
        let (status, body) = match routes.get_mut(&key) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => queue.front().cloned().unwrap_or((404, String::new())),
            None => (404, String::new()),
        };

        Ok(ApiResponse {
            status: StatusCode::from_u16(status).unwrap(),
            body,
        })
    }
}

pub fn instance(api_key: &str) -> SonarrInstance {
    SonarrInstance {
        id: Some(1),
        name: "main".to_string(),
        base_url: SONARR_URL.to_string(),
        api_key: api_key.to_string(),
        quality_profile: None,
        root_folder: None,
        tags: Vec::new(),
        season_monitoring: None,
        series_type: None,
        search_on_add: None,
        monitor_new_items: None,
        bypass_ignored: None,
    }
}

pub fn configured_instance() -> SonarrInstance {
    SonarrInstance {
        quality_profile: Some(ResourceRef::from("HD-1080p")),
        root_folder: Some("/tv".to_string()),
        ..instance("placeholder")
    }
}

pub fn client(fake: &Arc<FakeTransport>) -> Arc<SonarrClient> {
    let app = AppEndpoint::listening(APP_URL, APP_PORT);
    Arc::new(SonarrClient::new(fake.clone(), app).with_startup_delay(Duration::ZERO))
}

pub fn deferred_client(fake: &Arc<FakeTransport>) -> (Arc<SonarrClient>, watch::Sender<bool>) {
    let (ready, listening) = watch::channel(false);
    let app = AppEndpoint::new(APP_URL, APP_PORT, listening);
    let client = Arc::new(SonarrClient::new(fake.clone(), app).with_startup_delay(Duration::ZERO));
    (client, ready)
}

/// Client holding `instance` without any webhook setup.
pub async fn configured_client(fake: &Arc<FakeTransport>, instance: SonarrInstance) -> Arc<SonarrClient> {
    let client = client(fake);
    client.configure(&instance).await.unwrap();
    client
}

/// Client initialized with placeholder credentials, so no webhook traffic happens.
pub async fn ready_client(fake: &Arc<FakeTransport>, instance: SonarrInstance) -> Arc<SonarrClient> {
    let client = client(fake);
    client.initialize(&instance).await.unwrap();
    client
}

pub async fn wait_for_calls(fake: &FakeTransport, method: Method, path: &str, expected: usize) {
    for _ in 0..100 {
        if fake.count(method.clone(), path) >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("expected {} {} {} calls", expected, method, path);
}
