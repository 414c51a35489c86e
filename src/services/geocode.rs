// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Best-effort reverse geocoding of the vehicle position.
//!
//! Failures here are expected (rate limits, offline), so the caller
//! swallows and logs them; an address is cosmetic.

use crate::error::AppError;
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://nominatim.openstreetmap.org";
const USER_AGENT: &str = concat!("ismart-bridge/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct ReverseGeocodeResponse {
    display_name: Option<String>,
}

/// Nominatim-style reverse geocoding client.
#[derive(Clone)]
pub struct GeocodingClient {
    http: reqwest::Client,
    base_url: String,
}

impl Default for GeocodingClient {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL.to_string())
    }
}

impl GeocodingClient {
    pub fn new(base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    /// Resolve coordinates to a display address.
    pub async fn reverse(&self, lat: f64, lon: f64) -> Result<String, AppError> {
        let url = format!("{}/reverse", self.base_url);
        let response = self
            .http
            .get(&url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .query(&[
                ("format", "jsonv2".to_string()),
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
            ])
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| AppError::Integration(format!("Reverse geocoding failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Integration(format!(
                "Reverse geocoding returned HTTP {}",
                response.status()
            )));
        }

        let data: ReverseGeocodeResponse = response
            .json()
            .await
            .map_err(|e| AppError::Integration(format!("Reverse geocoding parse error: {}", e)))?;

        Ok(data
            .display_name
            .unwrap_or_else(|| "Address not found".to_string()))
    }
}
