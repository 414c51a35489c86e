// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Full poll-cycle tests with mocked vehicle API and device registry:
//! device reconciliation, presence, notifications, and snapshot
//! publication across consecutive cycles.

mod common;

use common::{mount_login, mount_vehicle_list, temp_store, test_session};
use ismart_bridge::services::{
    GeocodingClient, PresenceDetector, RegistryClient, SchedulerConfig, SharedStatus,
    UpdateOrchestrator,
};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PARIS: (f64, f64) = (48.8566, 2.3522);

async fn mount_registry_ok(server: &MockServer) {
    // Every device already exists; all updates and notifications succeed.
    Mock::given(method("GET"))
        .and(path("/json.htm"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "OK" })))
        .mount(server)
        .await;
}

async fn mount_vehicle_status_at(server: &MockServer, lat_micro: i64, lon_micro: i64) {
    Mock::given(method("GET"))
        .and(path(format!("/vehicles/{}/status", common::TEST_VIN)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "basicVehicleStatus": {
                "lockStatus": 1,
                "extendedData1": 0,
                "mileage": 423200,
                "exteriorTemperature": 14,
            },
            "gpsPosition": {
                "wayPoint": {
                    "position": { "latitude": lat_micro, "longitude": lon_micro },
                    "speed": 0,
                },
            },
        })))
        .mount(server)
        .await;
}

fn charging_body(charging: bool, soc_per_mille: i64) -> serde_json::Value {
    json!({
        "chrgMgmtData": {
            "bmsChrgSts": if charging { 1 } else { 0 },
            "bmsPackSOCDsp": soc_per_mille,
            "bmsOnBdChrgTrgtSOCDspCmd": 5,
        },
        "rvsChargeStatus": {
            "chargingGunState": if charging { 1 } else { 0 },
            "workingCurrent": if charging { 16000 } else { 0 },
            "mileage": 423200,
        },
    })
}

fn orchestrator(
    api: &MockServer,
    registry: &MockServer,
    home: Option<(f64, f64)>,
) -> (UpdateOrchestrator, SharedStatus, tempfile::TempDir) {
    let (store, dir) = temp_store();
    let session = test_session(api, store);
    let status: SharedStatus = Arc::new(tokio::sync::RwLock::new(None));
    let orchestrator = UpdateOrchestrator::new(
        session,
        RegistryClient::new(registry.uri()),
        GeocodingClient::new(registry.uri()), // unused when at home
        SchedulerConfig::from_hours(180, 3600, 22, 6),
        PresenceDetector::new(home, 25.0),
        2,
        status.clone(),
    );
    (orchestrator, status, dir)
}

async fn requests_with_param(server: &MockServer, key: &str, value: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.query_pairs().any(|(k, v)| k == key && v == value))
        .count()
}

#[tokio::test]
async fn test_cycle_updates_devices_and_publishes_snapshot() {
    let api = MockServer::start().await;
    let registry = MockServer::start().await;
    mount_login(&api, "tok").await;
    mount_vehicle_list(&api).await;
    mount_vehicle_status_at(&api, 48_856_600, 2_352_200).await;
    Mock::given(method("GET"))
        .and(path(format!("/vehicles/{}/charging", common::TEST_VIN)))
        .respond_with(ResponseTemplate::new(200).set_body_json(charging_body(true, 755)))
        .mount(&api)
        .await;
    mount_registry_ok(&registry).await;

    let (mut orchestrator, status, _dir) = orchestrator(&api, &registry, Some(PARIS));
    orchestrator.poll_once().await.expect("cycle succeeds");

    // Values were pushed to the registry.
    assert!(requests_with_param(&registry, "param", "udevice").await > 0);
    assert!(requests_with_param(&registry, "id", "battery_level").await > 0);
    // The fix is inside the home radius.
    assert!(requests_with_param(&registry, "id", "car_at_home").await > 0);

    let snapshot = status.read().await.clone().expect("snapshot published");
    assert_eq!(snapshot.soc_percent, Some(75.5));
    assert!(snapshot.charging);
    assert!(snapshot.at_home);
    assert_eq!(snapshot.charge_limit_percent, Some(80));
}

#[tokio::test]
async fn test_charge_stop_sends_one_notification() {
    let api = MockServer::start().await;
    let registry = MockServer::start().await;
    mount_login(&api, "tok").await;
    mount_vehicle_list(&api).await;
    mount_vehicle_status_at(&api, 48_856_600, 2_352_200).await;

    // Two charging cycles, then the session ends.
    Mock::given(method("GET"))
        .and(path(format!("/vehicles/{}/charging", common::TEST_VIN)))
        .respond_with(ResponseTemplate::new(200).set_body_json(charging_body(true, 700)))
        .up_to_n_times(2)
        .mount(&api)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/vehicles/{}/charging", common::TEST_VIN)))
        .respond_with(ResponseTemplate::new(200).set_body_json(charging_body(false, 720)))
        .mount(&api)
        .await;
    mount_registry_ok(&registry).await;

    let (mut orchestrator, _status, _dir) = orchestrator(&api, &registry, Some(PARIS));
    for _ in 0..4 {
        orchestrator.poll_once().await.expect("cycle succeeds");
    }

    // Exactly one stop notification despite two post-stop polls.
    assert_eq!(
        requests_with_param(&registry, "param", "sendnotification").await,
        1
    );
}

#[tokio::test]
async fn test_target_reached_notified_once_per_session() {
    let api = MockServer::start().await;
    let registry = MockServer::start().await;
    mount_login(&api, "tok").await;
    mount_vehicle_list(&api).await;
    mount_vehicle_status_at(&api, 48_856_600, 2_352_200).await;

    // Charging at 85% with an 80% target, for several polls.
    Mock::given(method("GET"))
        .and(path(format!("/vehicles/{}/charging", common::TEST_VIN)))
        .respond_with(ResponseTemplate::new(200).set_body_json(charging_body(true, 850)))
        .mount(&api)
        .await;
    mount_registry_ok(&registry).await;

    let (mut orchestrator, _status, _dir) = orchestrator(&api, &registry, Some(PARIS));
    for _ in 0..3 {
        orchestrator.poll_once().await.expect("cycle succeeds");
    }

    assert_eq!(
        requests_with_param(&registry, "param", "sendnotification").await,
        1
    );
}

#[tokio::test]
async fn test_away_fix_reports_not_home() {
    let api = MockServer::start().await;
    let registry = MockServer::start().await;
    mount_login(&api, "tok").await;
    mount_vehicle_list(&api).await;
    // ~445 m north of home.
    mount_vehicle_status_at(&api, 48_860_600, 2_352_200).await;
    Mock::given(method("GET"))
        .and(path(format!("/vehicles/{}/charging", common::TEST_VIN)))
        .respond_with(ResponseTemplate::new(200).set_body_json(charging_body(false, 700)))
        .mount(&api)
        .await;
    mount_registry_ok(&registry).await;

    let (mut orchestrator, status, _dir) = orchestrator(&api, &registry, Some(PARIS));
    orchestrator.poll_once().await.expect("cycle succeeds");

    let snapshot = status.read().await.clone().expect("snapshot published");
    assert!(!snapshot.at_home);
}

#[tokio::test]
async fn test_auth_rejection_mid_fetch_propagates() {
    let api = MockServer::start().await;
    let registry = MockServer::start().await;
    mount_login(&api, "tok").await;
    mount_vehicle_list(&api).await;
    Mock::given(method("GET"))
        .and(path(format!("/vehicles/{}/status", common::TEST_VIN)))
        .respond_with(ResponseTemplate::new(401))
        .mount(&api)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/vehicles/{}/charging", common::TEST_VIN)))
        .respond_with(ResponseTemplate::new(401))
        .mount(&api)
        .await;
    mount_registry_ok(&registry).await;

    let (mut orchestrator, _status, _dir) = orchestrator(&api, &registry, Some(PARIS));
    let err = orchestrator.poll_once().await.unwrap_err();
    assert!(err.is_auth_error());
}

#[tokio::test]
async fn test_transient_fetch_failure_keeps_base_interval() {
    let api = MockServer::start().await;
    let registry = MockServer::start().await;
    mount_login(&api, "tok").await;
    mount_vehicle_list(&api).await;
    Mock::given(method("GET"))
        .and(path(format!("/vehicles/{}/status", common::TEST_VIN)))
        .respond_with(ResponseTemplate::new(503))
        .mount(&api)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/vehicles/{}/charging", common::TEST_VIN)))
        .respond_with(ResponseTemplate::new(503))
        .mount(&api)
        .await;
    mount_registry_ok(&registry).await;

    let (mut orchestrator, status, _dir) = orchestrator(&api, &registry, Some(PARIS));
    let delay = orchestrator.poll_once().await.expect("cycle survives");
    assert_eq!(delay.as_secs(), 180);
    // No data: nothing published, nothing pushed.
    assert!(status.read().await.is_none());
    assert_eq!(requests_with_param(&registry, "param", "udevice").await, 0);
}
