#![allow(clippy::unwrap_used)]
// Integration tests for `JsonClient` using wiremock.

use std::time::Duration;

use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use hs3_api::{DeviceValue, JsonClient, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, JsonClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&server.uri()).unwrap();
    let client = JsonClient::with_client(
        reqwest::Client::new(),
        &base_url,
        "user",
        SecretString::from("pass".to_string()),
    )
    .unwrap();
    (server, client)
}

// ── Snapshot tests ──────────────────────────────────────────────────

#[tokio::test]
async fn test_get_status_with_basic_auth() {
    let (server, client) = setup().await;

    let body = json!({
        "Name": "HomeSeer Devices",
        "Version": "1.0",
        "Devices": [
            {
                "ref": 5,
                "name": "Porch Light",
                "location": "Outside",
                "location2": "Front",
                "device_type_string": "Z-Wave Switch",
                "value": 0
            },
            {
                "ref": 12,
                "name": "Kitchen Temp",
                "location": "Kitchen",
                "location2": "Main",
                "device_type_string": "Z-Wave Temperature",
                "value": 70.5
            }
        ]
    });

    Mock::given(method("GET"))
        .and(path("/JSON"))
        .and(query_param("request", "getstatus"))
        .and(header("authorization", "Basic dXNlcjpwYXNz"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let devices = client.get_status().await.unwrap();

    assert_eq!(devices.len(), 2);
    assert_eq!(devices[0].reference, 5);
    assert_eq!(devices[0].name, "Porch Light");
    assert_eq!(devices[0].value, DeviceValue::Integer(0));
    assert_eq!(devices[1].device_type_string, "Z-Wave Temperature");
    assert_eq!(devices[1].value, DeviceValue::Fractional(70.5));
}

#[tokio::test]
async fn test_get_control() {
    let (server, client) = setup().await;

    let body = json!({
        "Devices": [{
            "ref": 5,
            "ControlPairs": [
                { "ControlUse": 1, "ControlValue": 255, "Label": "On" },
                { "ControlUse": 2, "ControlValue": 0, "Label": "Off" }
            ]
        }]
    });

    Mock::given(method("GET"))
        .and(path("/JSON"))
        .and(query_param("request", "getcontrol"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let controls = client.get_control().await.unwrap();

    assert_eq!(controls.len(), 1);
    assert_eq!(controls[0].control_pairs[0].control_use, 1);
    assert_eq!(
        controls[0].control_pairs[0].control_value,
        DeviceValue::Integer(255)
    );
}

#[tokio::test]
async fn test_get_events() {
    let (server, client) = setup().await;

    let body = json!({
        "Events": [
            { "Group": "Lighting", "Name": "All Off", "id": 1 },
            { "Group": "Security", "Name": "Arm Away", "id": 2 }
        ]
    });

    Mock::given(method("GET"))
        .and(path("/JSON"))
        .and(query_param("request", "getevents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let events = client.get_events().await.unwrap();

    assert_eq!(events.len(), 2);
    assert_eq!(events[1].group, "Security");
    assert_eq!(events[1].name, "Arm Away");
}

// ── Action tests ────────────────────────────────────────────────────

#[tokio::test]
async fn test_control_device_by_value_query() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/JSON"))
        .and(query_param("request", "controldevicebyvalue"))
        .and(query_param("ref", "5"))
        .and(query_param("value", "255"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Devices": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let result = client
        .control_device_by_value(5, DeviceValue::Integer(255))
        .await;
    assert!(result.is_some());
}

#[tokio::test]
async fn test_run_event_posts_body() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/JSON"))
        .and(body_json(json!({
            "action": "runevent",
            "group": "Lighting",
            "name": "All Off"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Response": "ok" })))
        .expect(1)
        .mount(&server)
        .await;

    assert!(client.run_event("Lighting", "All Off").await.is_some());
}

#[tokio::test]
async fn test_control_by_value_posts_body() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/JSON"))
        .and(body_json(json!({
            "action": "controlbyvalue",
            "deviceref": 9,
            "value": 50
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Devices": [] })))
        .expect(1)
        .mount(&server)
        .await;

    assert!(
        client
            .control_by_value(9, DeviceValue::Integer(50))
            .await
            .is_some()
    );
}

// ── Failure tests ───────────────────────────────────────────────────

#[tokio::test]
async fn test_http_error_yields_none() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/JSON"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .mount(&server)
        .await;

    assert!(client.get_status().await.is_none());
}

#[tokio::test]
async fn test_non_json_body_yields_none() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/JSON"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>Login</html>"))
        .mount(&server)
        .await;

    assert!(client.get_events().await.is_none());
    assert!(
        client
            .control_device_by_value(5, DeviceValue::Integer(0))
            .await
            .is_none()
    );
}

#[tokio::test]
async fn test_missing_payload_key_yields_none() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/JSON"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Response": "Error" })))
        .mount(&server)
        .await;

    assert!(client.get_control().await.is_none());
}

#[tokio::test]
async fn test_timeout_yields_none() {
    let server = MockServer::start().await;
    let port = server.address().port();
    let client = JsonClient::new(
        "127.0.0.1",
        port,
        "user",
        SecretString::from("pass".to_string()),
        &TransportConfig::with_timeout(Duration::from_millis(100)),
    )
    .unwrap();

    Mock::given(method("GET"))
        .and(path("/JSON"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "Devices": [] }))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    assert!(client.get_status().await.is_none());
}
