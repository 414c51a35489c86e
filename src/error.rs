// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent classification.
//!
//! Every remote-call failure is funneled into one of these variants at the
//! boundary where it happens, so the polling loop only has to distinguish
//! "retry next tick", "re-login", and "stop".

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Transient vehicle-API failure. Retried on the next scheduled tick.
    #[error("Vehicle API error: {0}")]
    VehicleApi(String),

    /// Confirmed authentication rejection (401/403). Triggers token
    /// invalidation and re-login, counted toward the failure ceiling.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Stored token could not be decrypted. Treated as "no usable token".
    #[error("Token decryption failed: {0}")]
    Decryption(String),

    /// Device registry / notification sink failure. Logged, never fatal.
    #[error("Integration error: {0}")]
    Integration(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// True if this error must be handled as an authentication failure
    /// (clear the persisted token, re-login, bump the failure counter).
    pub fn is_auth_error(&self) -> bool {
        matches!(self, AppError::Auth(_))
    }

    /// True if the poll loop should simply retry on its next tick.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::VehicleApi(_) | AppError::Integration(_))
    }
}

/// JSON error response body for the control API.
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::VehicleApi(msg) => (
                StatusCode::BAD_GATEWAY,
                "vehicle_api_error",
                Some(msg.clone()),
            ),
            AppError::Auth(_) => (StatusCode::BAD_GATEWAY, "authentication_failed", None),
            AppError::Decryption(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "decryption_failed", None)
            }
            AppError::Integration(msg) => {
                tracing::error!(error = %msg, "Integration error");
                (StatusCode::INTERNAL_SERVER_ERROR, "integration_error", None)
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers and services.
pub type Result<T> = std::result::Result<T, AppError>;
