mod common;

use arrsync::config::PlexConfig;
use arrsync::models::{Guid, Item};
use arrsync::sonarr::webhook::WebhookState;
use arrsync::SonarrError;
use common::*;
use reqwest::Method;
use serde_json::json;

fn registered(id: i32, name: &str, url: &str) -> serde_json::Value {
    json!({
        "id": id,
        "name": name,
        "implementation": "Webhook",
        "fields": [{ "name": "url", "value": url }, { "name": "method", "value": 1 }]
    })
}

#[tokio::test]
async fn creates_webhook_when_absent() {
    let fake = FakeTransport::new();
    fake.on(Method::GET, "notification", 200, json!([]))
        .on(Method::POST, "notification", 201, json!({ "id": 11 }));

    let client = client(&fake);
    client.initialize(&instance("secret")).await.unwrap();

    let posts = fake.calls(Method::POST, "notification");
    assert_eq!(posts.len(), 1);
    assert_eq!(fake.count(Method::DELETE, "notification/11"), 0);
    let body = posts[0].body.as_ref().unwrap();
    assert_eq!(body["name"], "Arrsync");
    assert_eq!(body["fields"][0]["value"], EXPECTED_WEBHOOK);
    assert_eq!(posts[0].api_key, "secret");
}

#[tokio::test]
async fn recreates_stale_webhook() {
    let fake = FakeTransport::new();
    fake.on(
        Method::GET,
        "notification",
        200,
        json!([registered(7, "Arrsync", "http://old-host:3003/v1/notifications/webhook")]),
    )
    .on(Method::DELETE, "notification/7", 200, serde_json::Value::Null)
    .on(Method::POST, "notification", 201, json!({ "id": 8 }));

    let client = client(&fake);
    client.initialize(&instance("secret")).await.unwrap();

    assert_eq!(fake.count(Method::DELETE, "notification/7"), 1);
    assert_eq!(fake.count(Method::POST, "notification"), 1);
    assert_eq!(fake.mutations(), 2);

    let order: Vec<Method> = fake
        .requests()
        .into_iter()
        .filter(|r| r.method != Method::GET)
        .map(|r| r.method)
        .collect();
    assert_eq!(order, vec![Method::DELETE, Method::POST]);
}

#[tokio::test]
async fn leaves_matching_webhook_alone() {
    let fake = FakeTransport::new();
    fake.on(
        Method::GET,
        "notification",
        200,
        json!([
            registered(2, "Something else", "http://elsewhere"),
            registered(7, "Arrsync", EXPECTED_WEBHOOK)
        ]),
    );

    let client = client(&fake);
    client.initialize(&instance("secret")).await.unwrap();

    assert_eq!(fake.mutations(), 0);
    assert_eq!(client.webhook_state().await.unwrap(), WebhookState::PresentCorrect);
}

#[tokio::test]
async fn second_initialize_does_not_repeat_setup() {
    let fake = FakeTransport::new();
    fake.on(Method::GET, "notification", 200, json!([]))
        .on(Method::POST, "notification", 201, json!({ "id": 11 }));

    let client = client(&fake);
    client.initialize(&instance("secret")).await.unwrap();
    let after_first = fake.requests().len();
    client.initialize(&instance("secret")).await.unwrap();

    assert_eq!(fake.requests().len(), after_first);
    assert_eq!(fake.count(Method::POST, "notification"), 1);
}

#[tokio::test]
async fn placeholder_credentials_never_contact_sonarr() {
    let fake = FakeTransport::new();
    let client = client(&fake);
    client.initialize(&instance("placeholder")).await.unwrap();
    assert!(fake.requests().is_empty());
}

#[tokio::test]
async fn missing_credentials_fail_initialization() {
    let fake = FakeTransport::new();
    let client = client(&fake);
    let result = client.initialize(&instance("")).await;
    assert!(matches!(result, Err(SonarrError::Configuration(_))));
    assert!(fake.requests().is_empty());
}

#[tokio::test]
async fn failed_create_is_a_setup_error() {
    let fake = FakeTransport::new();
    fake.on(Method::GET, "notification", 200, json!([]))
        .on(Method::POST, "notification", 400, json!({ "message": "bad" }));

    let client = client(&fake);
    let result = client.initialize(&instance("secret")).await;
    match result {
        Err(SonarrError::WebhookSetup(cause)) => {
            assert!(matches!(*cause, SonarrError::RemoteApi { status: 400, .. }));
        }
        other => panic!("expected webhook setup error, got {:?}", other),
    }
}

#[tokio::test]
async fn waits_for_listener_before_setup() {
    let fake = FakeTransport::new();
    fake.on(Method::GET, "notification", 200, json!([]))
        .on(Method::POST, "notification", 201, json!({ "id": 11 }));

    let (client, ready) = deferred_client(&fake);
    client.initialize(&instance("secret")).await.unwrap();
    tokio::task::yield_now().await;
    assert!(fake.requests().is_empty());

    ready.send(true).unwrap();
    wait_for_calls(&fake, Method::POST, "notification", 1).await;
    assert_eq!(fake.count(Method::POST, "notification"), 1);
}

#[tokio::test]
async fn removes_webhook_by_name() {
    let fake = FakeTransport::new();
    fake.on(
        Method::GET,
        "notification",
        200,
        json!([registered(4, "Arrsync", EXPECTED_WEBHOOK)]),
    )
    .on(Method::DELETE, "notification/4", 200, serde_json::Value::Null);

    let client = ready_client(&fake, instance("placeholder")).await;
    client.remove_webhook().await.unwrap();
    assert_eq!(fake.count(Method::DELETE, "notification/4"), 1);
}

#[tokio::test]
async fn replaces_existing_plex_notification() {
    let fake = FakeTransport::new();
    fake.on(
        Method::GET,
        "notification",
        200,
        json!([{ "id": 9, "name": "Plex", "implementation": "PlexServer", "fields": [] }]),
    )
    .on(Method::DELETE, "notification/9", 200, serde_json::Value::Null)
    .on(Method::POST, "notification", 201, json!({ "id": 10 }));

    let client = ready_client(&fake, instance("placeholder")).await;
    let plex = PlexConfig {
        host: "plex.lan".to_string(),
        port: 32400,
        use_ssl: false,
        token: "plex-token".to_string(),
    };
    client.configure_plex_notification(&plex).await.unwrap();

    assert_eq!(fake.count(Method::DELETE, "notification/9"), 1);
    let posts = fake.calls(Method::POST, "notification");
    assert_eq!(posts.len(), 1);
    let body = posts[0].body.as_ref().unwrap();
    assert_eq!(body["implementation"], "PlexServer");
    assert_eq!(body["fields"][1]["value"], 32400);
}

#[tokio::test]
async fn removing_absent_plex_notification_is_not_an_error() {
    let fake = FakeTransport::new();
    fake.on(Method::GET, "notification", 200, json!([]));

    let client = ready_client(&fake, instance("placeholder")).await;
    client.remove_plex_notification().await.unwrap();
    assert_eq!(fake.mutations(), 0);
}

#[tokio::test]
async fn configure_leaves_webhooks_untouched() {
    let fake = FakeTransport::new();
    fake.on(Method::GET, "notification", 200, json!([]))
        .on(Method::POST, "notification", 201, json!({ "id": 11 }))
        .on(Method::DELETE, "series/5", 200, serde_json::Value::Null);

    let client = configured_client(&fake, instance("secret")).await;
    client.remove_webhook().await.unwrap();
    client
        .delete_series(&Item::new("Show", [Guid::Sonarr(5)]), false)
        .await
        .unwrap();

    assert_eq!(fake.count(Method::POST, "notification"), 0);
    assert_eq!(fake.mutations(), 1);
    assert_eq!(fake.count(Method::DELETE, "series/5"), 1);
}

#[tokio::test]
async fn configure_rejects_missing_credentials() {
    let fake = FakeTransport::new();
    let result = client(&fake).configure(&instance("")).await;
    assert!(matches!(result, Err(SonarrError::Configuration(_))));
}
