// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use ismart_bridge::services::{CryptoVault, SaicClient, SessionManager, TokenStore};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[allow(dead_code)]
pub const TEST_EMAIL: &str = "driver@example.com";
#[allow(dead_code)]
pub const TEST_PASSWORD: &str = "hunter2";
#[allow(dead_code)]
pub const TEST_VIN: &str = "LSJWH4095MN123456";

/// Token store backed by a temp directory (returned to keep it alive).
#[allow(dead_code)]
pub fn temp_store() -> (TokenStore, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let store = TokenStore::new(dir.path().join("ismart_token.json"), CryptoVault::new());
    (store, dir)
}

/// Session manager wired against a mock vehicle API.
#[allow(dead_code)]
pub fn test_session(server: &MockServer, store: TokenStore) -> SessionManager {
    let client = SaicClient::new(
        server.uri(),
        TEST_EMAIL.to_string(),
        TEST_PASSWORD.to_string(),
    );
    SessionManager::new(client, store, TEST_EMAIL.to_string(), TEST_PASSWORD.to_string())
}

/// Mount a successful login endpoint.
#[allow(dead_code)]
pub async fn mount_login(server: &MockServer, token: &str) {
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": token,
            "expires_in": 7200,
        })))
        .mount(server)
        .await;
}

/// Mount the vehicle list endpoint with one registered vehicle.
#[allow(dead_code)]
pub async fn mount_vehicle_list(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/vehicles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "vinList": [{
                "vin": TEST_VIN,
                "brandName": "MG",
                "modelName": "MG4 Electric",
            }],
        })))
        .mount(server)
        .await;
}
