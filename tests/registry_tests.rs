// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Device registry client tests: idempotent device creation, room plan
//! management, notifications, and home-coordinate lookup.

mod common;

use ismart_bridge::services::registry::DEVICE_CATALOG;
use ismart_bridge::services::RegistryClient;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_empty_registry(server: &MockServer) {
    // No devices exist yet.
    Mock::given(method("GET"))
        .and(path("/json.htm"))
        .and(query_param("param", "getdevice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ERR",
            "message": "unknown device",
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/json.htm"))
        .and(query_param("param", "createdevice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "OK" })))
        .mount(server)
        .await;
}

async fn count_requests(server: &MockServer, param: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| {
            r.url
                .query_pairs()
                .any(|(k, v)| k == "param" && v == param)
        })
        .count()
}

#[tokio::test]
async fn test_ensure_devices_creates_full_catalog() {
    let server = MockServer::start().await;
    mount_empty_registry(&server).await;

    let registry = RegistryClient::new(server.uri());
    let created = registry
        .ensure_devices_exist("MG4 3456")
        .await
        .expect("devices created");

    assert_eq!(created.len(), DEVICE_CATALOG.len());
    assert_eq!(count_requests(&server, "createdevice").await, DEVICE_CATALOG.len());
}

#[tokio::test]
async fn test_ensure_devices_second_call_creates_nothing() {
    let server = MockServer::start().await;
    mount_empty_registry(&server).await;

    let registry = RegistryClient::new(server.uri());
    registry
        .ensure_devices_exist("MG4 3456")
        .await
        .expect("first pass");
    let second = registry
        .ensure_devices_exist("MG4 3456")
        .await
        .expect("second pass");

    assert!(second.is_empty());
    // Still only one create per device.
    assert_eq!(count_requests(&server, "createdevice").await, DEVICE_CATALOG.len());
}

#[tokio::test]
async fn test_existing_devices_are_not_recreated() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/json.htm"))
        .and(query_param("param", "getdevice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "OK" })))
        .mount(&server)
        .await;

    let registry = RegistryClient::new(server.uri());
    let created = registry
        .ensure_devices_exist("MG4 3456")
        .await
        .expect("nothing to create");

    assert!(created.is_empty());
    assert_eq!(count_requests(&server, "createdevice").await, 0);
}

#[tokio::test]
async fn test_update_device_sends_values() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/json.htm"))
        .and(query_param("param", "udevice"))
        .and(query_param("id", "battery_level"))
        .and(query_param("nvalue", "75"))
        .and(query_param("svalue", "75.5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "OK" })))
        .expect(1)
        .mount(&server)
        .await;

    let registry = RegistryClient::new(server.uri());
    registry
        .update_device("battery_level", 75, "75.5")
        .await
        .expect("update accepted");

    server.verify().await;
}

#[tokio::test]
async fn test_existing_plan_gets_devices_attached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/json.htm"))
        .and(query_param("param", "getplans"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "OK",
            "result": [{ "idx": "7", "Name": "MG4-3456" }],
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/json.htm"))
        .and(query_param("param", "addplanactivedevice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "OK" })))
        .mount(&server)
        .await;

    let registry = RegistryClient::new(server.uri());
    registry
        .ensure_room_plan("MG4-3456", &["battery_level", "charging"])
        .await
        .expect("plan populated");

    assert_eq!(count_requests(&server, "addplanactivedevice").await, 2);
    // Plan existed: no addplan call.
    assert_eq!(count_requests(&server, "addplan").await, 0);
}

#[tokio::test]
async fn test_missing_plan_created_then_reused() {
    let server = MockServer::start().await;
    // First lookup sees no plans; after addplan the plan is listed.
    Mock::given(method("GET"))
        .and(path("/json.htm"))
        .and(query_param("param", "getplans"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "OK",
            "result": [],
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/json.htm"))
        .and(query_param("param", "getplans"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "OK",
            "result": [{ "idx": "9", "Name": "MG4-3456" }],
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/json.htm"))
        .and(query_param("param", "addplan"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "OK" })))
        .expect(1)
        .mount(&server)
        .await;

    let registry = RegistryClient::new(server.uri());
    let idx = registry.plan_idx("MG4-3456").await.expect("plan resolved");
    assert_eq!(idx, "9");

    server.verify().await;
}

#[tokio::test]
async fn test_notification_sent_through_registry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/json.htm"))
        .and(query_param("param", "sendnotification"))
        .and(query_param("subject", "MG iSmart Alert"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "OK" })))
        .expect(1)
        .mount(&server)
        .await;

    let registry = RegistryClient::new(server.uri());
    registry
        .send_notification("MG iSmart Alert", "Charging stopped. SoC is 80.0%.")
        .await
        .expect("notification accepted");

    server.verify().await;
}

#[tokio::test]
async fn test_home_coordinates_from_settings() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/json.htm"))
        .and(query_param("param", "getsettings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "OK",
            "Location": { "Latitude": "48.8566", "Longitude": "2.3522" },
        })))
        .mount(&server)
        .await;

    let registry = RegistryClient::new(server.uri());
    let home = registry.home_coordinates().await.expect("settings readable");
    assert_eq!(home, Some((48.8566, 2.3522)));
}

#[tokio::test]
async fn test_missing_location_yields_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/json.htm"))
        .and(query_param("param", "getsettings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "OK" })))
        .mount(&server)
        .await;

    let registry = RegistryClient::new(server.uri());
    assert_eq!(registry.home_coordinates().await.unwrap(), None);
}

#[tokio::test]
async fn test_registry_failure_is_integration_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/json.htm"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let registry = RegistryClient::new(server.uri());
    let err = registry.update_device("battery_level", 1, "1").await.unwrap_err();
    assert!(err.is_transient());
}
