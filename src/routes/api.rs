// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Control API: derived status plus remote vehicle commands.
//!
//! Commands run as independent request tasks, concurrently with the
//! polling loop and with each other; they share the live session through
//! the session manager and never trigger a second login while one is in
//! flight.

use crate::error::{AppError, Result};
use crate::models::charging::ScheduledChargingMode;
use crate::services::saic::ChargeCurrentLimit;
use crate::services::session::vin_digest;
use crate::AppState;
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Scheduled charging window sent when the user only picks a mode.
const DEFAULT_SCHEDULE_START: (u32, u32) = (20, 0);
const DEFAULT_SCHEDULE_END: (u32, u32) = (6, 0);

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/status", get(get_status))
        .route("/api/command", post(post_command))
}

// ─── Status ──────────────────────────────────────────────────

/// Latest derived vehicle state, as published by the polling loop.
async fn get_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<crate::services::StatusSnapshot>> {
    let snapshot = state.status.read().await.clone();
    snapshot
        .map(Json)
        .ok_or_else(|| AppError::NotFound("No poll cycle has completed yet".to_string()))
}

// ─── Commands ────────────────────────────────────────────────

/// A remote vehicle command.
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum VehicleCommand {
    Lock,
    Unlock,
    Climate {
        on: bool,
    },
    Charging {
        start: bool,
    },
    SetChargeLimit {
        percent: u8,
    },
    SetChargeCurrent {
        limit: ChargeCurrentLimit,
    },
    HeatedSeats {
        left: u8,
        right: u8,
    },
    ScheduledCharging {
        mode: ScheduleMode,
    },
    BatteryHeating {
        on: bool,
    },
    PortLock {
        locked: bool,
    },
}

/// Scheduled charging mode names accepted on the wire.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleMode {
    Disabled,
    UntilTime,
    UntilSoc,
}

impl From<ScheduleMode> for ScheduledChargingMode {
    fn from(mode: ScheduleMode) -> Self {
        match mode {
            ScheduleMode::Disabled => Self::Disabled,
            ScheduleMode::UntilTime => Self::UntilConfiguredTime,
            ScheduleMode::UntilSoc => Self::UntilConfiguredSoc,
        }
    }
}

/// Response for an accepted command.
#[derive(Serialize)]
pub struct CommandResponse {
    pub success: bool,
    pub vehicle: String,
}

/// Dispatch a command to the vehicle using the live session.
async fn post_command(
    State(state): State<Arc<AppState>>,
    Json(command): Json<VehicleCommand>,
) -> Result<Json<CommandResponse>> {
    let token = state.session.ensure_authenticated().await?;
    let vehicle = state.session.vehicle().await?;
    let vin = vehicle.vin.as_str();
    let client = state.session.client();

    tracing::info!(command = ?command, vin = %vin_digest(vin), "Command received");

    match command {
        VehicleCommand::Lock => client.set_locked(&token, vin, true).await?,
        VehicleCommand::Unlock => client.set_locked(&token, vin, false).await?,
        VehicleCommand::Climate { on } => client.set_climate(&token, vin, on).await?,
        VehicleCommand::Charging { start } => {
            client.control_charging(&token, vin, start).await?
        }
        VehicleCommand::SetChargeLimit { percent } => {
            client.set_target_soc(&token, vin, percent, None).await?
        }
        VehicleCommand::SetChargeCurrent { limit } => {
            // The BMS wants a target SoC alongside the current limit; use
            // the last observed one, defaulting to 80%.
            let target = state
                .status
                .read()
                .await
                .as_ref()
                .and_then(|s| s.charge_limit_percent)
                .unwrap_or(80);
            client.set_target_soc(&token, vin, target, Some(limit)).await?
        }
        VehicleCommand::HeatedSeats { left, right } => {
            if left > 3 || right > 3 {
                return Err(AppError::BadRequest(
                    "Seat heat levels range from 0 to 3".to_string(),
                ));
            }
            client.control_heated_seats(&token, vin, left, right).await?
        }
        VehicleCommand::ScheduledCharging { mode } => {
            let start = NaiveTime::from_hms_opt(DEFAULT_SCHEDULE_START.0, DEFAULT_SCHEDULE_START.1, 0)
                .expect("constant time is valid");
            let end = NaiveTime::from_hms_opt(DEFAULT_SCHEDULE_END.0, DEFAULT_SCHEDULE_END.1, 0)
                .expect("constant time is valid");
            client
                .set_scheduled_charging(&token, vin, mode.into(), start, end)
                .await?
        }
        VehicleCommand::BatteryHeating { on } => {
            client.control_battery_heating(&token, vin, on).await?
        }
        VehicleCommand::PortLock { locked } => {
            client.control_charging_port_lock(&token, vin, locked).await?
        }
    }

    Ok(Json(CommandResponse {
        success: true,
        vehicle: vehicle.display_name(),
    }))
}
