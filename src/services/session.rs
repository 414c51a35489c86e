// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Authenticated session lifecycle.
//!
//! The session (token, expiry, vehicle identity) is one logical resource:
//! the polling loop and concurrently running commands all read it, but
//! only the login transition in here mutates it, serialized by a single
//! lock. Startup resumes from a persisted token when possible so the
//! rate-limited remote service doesn't see a login on every restart.

use crate::error::AppError;
use crate::models::vehicle::VehicleInfo;
use crate::services::saic::SaicClient;
use crate::services::token_store::{TokenStore, EXPIRY_BUFFER_MINUTES};
use chrono::{Duration as ChronoDuration, Local, NaiveDateTime};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Consecutive authentication failures tolerated before the session is
/// terminated and the polling loop must stop.
pub const MAX_AUTH_FAILURES: u32 = 5;

/// Wait before retrying after an authentication failure.
pub fn auth_retry_delay(base_interval: Duration) -> Duration {
    (base_interval * 2).min(Duration::from_secs(600))
}

#[derive(Debug, Default)]
struct SessionState {
    token: Option<(String, NaiveDateTime)>,
    vehicle: Option<VehicleInfo>,
    auth_failures: u32,
    terminated: bool,
}

/// Owns the authenticated session and its persistence.
#[derive(Clone)]
pub struct SessionManager {
    client: SaicClient,
    store: TokenStore,
    email: String,
    password: String,
    state: Arc<Mutex<SessionState>>,
}

impl SessionManager {
    pub fn new(client: SaicClient, store: TokenStore, email: String, password: String) -> Self {
        Self {
            client,
            store,
            email,
            password,
            state: Arc::new(Mutex::new(SessionState::default())),
        }
    }

    /// Try to resume from a previously stored token, skipping the remote
    /// login entirely. Returns true when a usable token was restored.
    pub async fn restore_from_disk(&self) -> bool {
        let Some(stored) = self.store.load(&self.email, &self.password) else {
            return false;
        };

        tracing::info!(expires_at = %stored.expires_at, "Reusing stored authentication token");
        let mut state = self.state.lock().await;
        state.token = Some((stored.token, stored.expires_at));
        true
    }

    /// Get a token valid for at least the expiry buffer, logging in if
    /// needed. Login is double-checked under the session lock so two
    /// concurrent callers cannot both hit the login endpoint.
    pub async fn ensure_authenticated(&self) -> Result<String, AppError> {
        let mut state = self.state.lock().await;

        if state.terminated {
            return Err(AppError::Auth(
                "session terminated after repeated authentication failures".to_string(),
            ));
        }

        if let Some((token, expires_at)) = &state.token {
            if Self::still_valid(*expires_at) {
                return Ok(token.clone());
            }
        }

        tracing::info!("Logging in...");
        let session = match self.client.login().await {
            Ok(session) => session,
            Err(e) if e.is_auth_error() => {
                Self::register_auth_failure(&mut state, &self.store);
                return Err(e);
            }
            Err(e) => return Err(e),
        };
        tracing::info!(expires_at = %session.expires_at, "Token expires at");

        if let Err(e) = self.store.save(
            &session.token,
            session.expires_at,
            &self.email,
            &self.password,
        ) {
            // Persistence failure costs a login on next restart, nothing more.
            tracing::warn!(error = %e, "Failed to persist token");
        }

        state.token = Some((session.token.clone(), session.expires_at));
        state.auth_failures = 0;
        Ok(session.token)
    }

    /// Resolve the registered vehicle, caching it in the session.
    pub async fn vehicle(&self) -> Result<VehicleInfo, AppError> {
        {
            let state = self.state.lock().await;
            if let Some(vehicle) = &state.vehicle {
                return Ok(vehicle.clone());
            }
        }

        let token = self.ensure_authenticated().await?;
        let vehicles = self.client.vehicle_list(&token).await?;
        let vehicle = vehicles
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound("No vehicles registered to account".to_string()))?;

        tracing::debug!(
            vin = %vin_digest(&vehicle.vin),
            model = vehicle.model_name.as_deref().unwrap_or("unknown"),
            "Resolved vehicle"
        );

        let mut state = self.state.lock().await;
        state.vehicle = Some(vehicle.clone());
        Ok(vehicle)
    }

    /// Record a confirmed authentication rejection from any remote call:
    /// drop the in-memory token, delete the persisted one (a rejected
    /// token must never be reused), and count toward the ceiling.
    ///
    /// Returns the failure count so far.
    pub async fn record_auth_failure(&self) -> u32 {
        let mut state = self.state.lock().await;
        Self::register_auth_failure(&mut state, &self.store);
        state.auth_failures
    }

    fn register_auth_failure(state: &mut SessionState, store: &TokenStore) {
        state.token = None;
        state.vehicle = None;
        store.clear();
        state.auth_failures += 1;
        if state.auth_failures >= MAX_AUTH_FAILURES {
            state.terminated = true;
        }
    }

    /// Reset the failure counter after a fully successful update cycle.
    pub async fn note_success(&self) {
        let mut state = self.state.lock().await;
        state.auth_failures = 0;
    }

    /// True once the failure ceiling has been reached.
    pub async fn is_terminated(&self) -> bool {
        self.state.lock().await.terminated
    }

    pub async fn auth_failures(&self) -> u32 {
        self.state.lock().await.auth_failures
    }

    /// Access to the underlying API client for command dispatch.
    pub fn client(&self) -> &SaicClient {
        &self.client
    }

    fn still_valid(expires_at: NaiveDateTime) -> bool {
        expires_at
            > Local::now().naive_local() + ChronoDuration::minutes(EXPIRY_BUFFER_MINUTES)
    }
}

/// Truncated SHA-256 digest of the VIN for log lines; the raw VIN never
/// appears in logs.
pub fn vin_digest(vin: &str) -> String {
    let digest = Sha256::digest(vin.as_bytes());
    hex::encode(digest)[..8].to_string()
}
