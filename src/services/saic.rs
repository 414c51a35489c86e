// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! iSmart API client for vehicle status and remote control.
//!
//! Handles:
//! - Credential login and token issuance
//! - Vehicle list / status / charging data fetches
//! - Remote control operations (lock, climate, charging, heating)
//! - Error classification: 401/403 become authentication errors, the
//!   rest surface as transient API errors for the next tick

use crate::error::AppError;
use crate::models::charging::{charge_limit_to_code, ChargingStatusResponse, ScheduledChargingMode};
use crate::models::vehicle::{VehicleInfo, VehicleStatusResponse};
use chrono::{Duration, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Per-request timeout; keeps commands and shutdown bounded even when
/// the gateway stops answering.
const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// iSmart API client.
#[derive(Clone)]
pub struct SaicClient {
    http: reqwest::Client,
    base_url: String,
    email: String,
    password: String,
}

/// A freshly issued authentication token.
#[derive(Debug, Clone)]
pub struct LoginSession {
    pub token: String,
    pub expires_at: NaiveDateTime,
}

/// Wire response for `POST /oauth/token`.
#[derive(Debug, Deserialize)]
struct LoginResponse {
    access_token: String,
    /// Token lifetime in seconds.
    expires_in: i64,
}

/// Wire response for `GET /vehicles`.
#[derive(Debug, Deserialize)]
struct VehicleListResponse {
    #[serde(rename = "vinList")]
    vin_list: Vec<VehicleInfo>,
}

/// Charge current limit codes accepted by the BMS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeCurrentLimit {
    Amps6,
    Amps8,
    Amps16,
    Max,
}

impl ChargeCurrentLimit {
    pub fn code(self) -> i32 {
        match self {
            Self::Amps6 => 1,
            Self::Amps8 => 2,
            Self::Amps16 => 3,
            Self::Max => 4,
        }
    }
}

impl SaicClient {
    /// Create a new client against the given API gateway.
    pub fn new(base_url: String, email: String, password: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url,
            email,
            password,
        }
    }

    // ─── Authentication ──────────────────────────────────────────────────────

    /// Perform a credential login, returning a fresh token.
    pub async fn login(&self) -> Result<LoginSession, AppError> {
        let url = format!("{}/oauth/token", self.base_url);
        let response = self
            .http
            .post(&url)
            .form(&[
                ("grant_type", "password"),
                ("username", self.email.as_str()),
                ("password", self.password.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AppError::VehicleApi(format!("Login request failed: {}", e)))?;

        let login: LoginResponse = Self::check_response_json(response).await?;
        let expires_at = Local::now().naive_local() + Duration::seconds(login.expires_in);
        Ok(LoginSession {
            token: login.access_token,
            expires_at,
        })
    }

    // ─── Status Fetches ──────────────────────────────────────────────────────

    /// List vehicles registered to the account.
    pub async fn vehicle_list(&self, token: &str) -> Result<Vec<VehicleInfo>, AppError> {
        let url = format!("{}/vehicles", self.base_url);
        let response: VehicleListResponse = self.get_json(&url, token).await?;
        Ok(response.vin_list)
    }

    /// Fetch the basic status block (doors, temperatures, GPS, ...).
    pub async fn get_vehicle_status(
        &self,
        token: &str,
        vin: &str,
    ) -> Result<VehicleStatusResponse, AppError> {
        let url = format!("{}/vehicles/{}/status", self.base_url, vin);
        self.get_json(&url, token).await
    }

    /// Fetch the charging management block.
    pub async fn get_charging_status(
        &self,
        token: &str,
        vin: &str,
    ) -> Result<ChargingStatusResponse, AppError> {
        let url = format!("{}/vehicles/{}/charging", self.base_url, vin);
        self.get_json(&url, token).await
    }

    // ─── Control Operations ──────────────────────────────────────────────────

    /// Lock or unlock the doors.
    pub async fn set_locked(&self, token: &str, vin: &str, locked: bool) -> Result<(), AppError> {
        let action = if locked { "lock" } else { "unlock" };
        self.control(token, vin, action, serde_json::json!({})).await
    }

    /// Start or stop remote climate control.
    pub async fn set_climate(&self, token: &str, vin: &str, on: bool) -> Result<(), AppError> {
        let action = if on { "climate/start" } else { "climate/stop" };
        self.control(token, vin, action, serde_json::json!({})).await
    }

    /// Start or stop charging.
    pub async fn control_charging(
        &self,
        token: &str,
        vin: &str,
        start: bool,
    ) -> Result<(), AppError> {
        self.control(token, vin, "charging", serde_json::json!({ "start": start }))
            .await
    }

    /// Set the target state of charge. `current_limit` optionally rides
    /// along, since the BMS accepts both in one command.
    pub async fn set_target_soc(
        &self,
        token: &str,
        vin: &str,
        percent: u8,
        current_limit: Option<ChargeCurrentLimit>,
    ) -> Result<(), AppError> {
        let code = charge_limit_to_code(percent).ok_or_else(|| {
            AppError::BadRequest(format!("Unsupported charge target: {}%", percent))
        })?;
        let mut body = serde_json::json!({ "targetSocCode": code });
        if let Some(limit) = current_limit {
            body["chargeCurrentCode"] = serde_json::json!(limit.code());
        }
        self.control(token, vin, "charging/target-soc", body).await
    }

    /// Set seat heating levels (0–3 per side). The BMS wants both sides
    /// in every command.
    pub async fn control_heated_seats(
        &self,
        token: &str,
        vin: &str,
        left_level: u8,
        right_level: u8,
    ) -> Result<(), AppError> {
        let body = serde_json::json!({ "left": left_level, "right": right_level });
        self.control(token, vin, "heated-seats", body).await
    }

    /// Configure scheduled charging between the given times.
    pub async fn set_scheduled_charging(
        &self,
        token: &str,
        vin: &str,
        mode: ScheduledChargingMode,
        start: chrono::NaiveTime,
        end: chrono::NaiveTime,
    ) -> Result<(), AppError> {
        let body = serde_json::json!({
            "mode": mode.code(),
            "startTime": start.format("%H:%M").to_string(),
            "endTime": end.format("%H:%M").to_string(),
        });
        self.control(token, vin, "charging/schedule", body).await
    }

    /// Enable or disable battery heating.
    pub async fn control_battery_heating(
        &self,
        token: &str,
        vin: &str,
        enable: bool,
    ) -> Result<(), AppError> {
        self.control(
            token,
            vin,
            "charging/battery-heating",
            serde_json::json!({ "enable": enable }),
        )
        .await
    }

    /// Lock or unlock the charging port.
    pub async fn control_charging_port_lock(
        &self,
        token: &str,
        vin: &str,
        locked: bool,
    ) -> Result<(), AppError> {
        self.control(
            token,
            vin,
            "charging/port-lock",
            serde_json::json!({ "locked": locked }),
        )
        .await
    }

    /// POST a control command under the vehicle's control namespace.
    async fn control(
        &self,
        token: &str,
        vin: &str,
        action: &str,
        body: serde_json::Value,
    ) -> Result<(), AppError> {
        let url = format!("{}/vehicles/{}/control/{}", self.base_url, vin, action);
        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::VehicleApi(format!("Control request failed: {}", e)))?;

        Self::check_response(response).await?;
        tracing::info!(action, "Vehicle control command accepted");
        Ok(())
    }

    /// Generic GET request with JSON response.
    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        token: &str,
    ) -> Result<T, AppError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AppError::VehicleApi(e.to_string()))?;

        Self::check_response_json(response).await
    }

    /// Check response status and classify failures.
    async fn check_response(response: reqwest::Response) -> Result<(), AppError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();

        // Token rejected: must be reclassified so the session manager
        // clears the stored token and re-authenticates.
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(AppError::Auth(format!("HTTP {}: {}", status, body)));
        }

        if status.as_u16() == 429 {
            tracing::warn!("Vehicle API rate limit hit (429)");
        }

        Err(AppError::VehicleApi(format!("HTTP {}: {}", status, body)))
    }

    /// Check response and parse JSON body.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();

            if status.as_u16() == 401 || status.as_u16() == 403 {
                return Err(AppError::Auth(format!("HTTP {}: {}", status, body)));
            }

            if status.as_u16() == 429 {
                tracing::warn!("Vehicle API rate limit hit (429)");
            }

            return Err(AppError::VehicleApi(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::VehicleApi(format!("JSON parse error: {}", e)))
    }
}
