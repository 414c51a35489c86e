// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! The update orchestrator: one cooperative polling loop.
//!
//! Each iteration ensures the session is live, fetches status and
//! charging data, classifies sleep state, reconciles derived devices in
//! the registry, drives charging notifications, and computes the next
//! wake-up. Transient failures skip the cycle; only the authentication
//! failure ceiling stops the loop. The interval sleep stays responsive
//! to the shutdown signal.

use crate::error::AppError;
use crate::models::charging::{ChargingStatusResponse, ScheduledChargingMode};
use crate::models::vehicle::{tyre_pressure_bar, BasicVehicleStatus, VehicleStatusResponse};
use crate::services::charging::{ChargeEvent, ChargeSessionTracker};
use crate::services::geocode::GeocodingClient;
use crate::services::presence::PresenceDetector;
use crate::services::registry::{RegistryClient, DEVICE_CATALOG};
use crate::services::scheduler::{next_poll_interval, SchedulerConfig};
use crate::services::session::{auth_retry_delay, SessionManager, MAX_AUTH_FAILURES};
use crate::time_utils::format_naive_timestamp;
use chrono::Local;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};

/// Notification subject used for every alert.
const NOTIFICATION_SUBJECT: &str = "MG iSmart Alert";

/// Consecutive deep-sleep responses before the quiet debug log fires.
const DEEP_SLEEP_LOG_THRESHOLD: u32 = 3;

/// Latest derived state, published for the control API.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub polled_at: String,
    pub soc_percent: Option<f64>,
    pub charging: bool,
    pub charge_limit_percent: Option<u8>,
    pub at_home: bool,
    pub awake: bool,
    pub odometer_km: Option<i64>,
    pub range_km: Option<i32>,
}

/// Shared snapshot handle.
pub type SharedStatus = Arc<RwLock<Option<StatusSnapshot>>>;

/// Classifies deep sleep from sentinel readings.
///
/// The remote API answers from cache while the car sleeps, marking the
/// extended diagnostic field, odometer, and exterior temperature with the
/// unavailable sentinel. How many of those must match is a tunable
/// heuristic, not a protocol guarantee.
#[derive(Debug)]
pub struct SleepDetector {
    threshold: usize,
    consecutive_invalid: u32,
}

impl SleepDetector {
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold: threshold.max(1),
            consecutive_invalid: 0,
        }
    }

    /// Feed one response; true means this sample looks like deep sleep.
    pub fn observe(&mut self, status: Option<&BasicVehicleStatus>) -> bool {
        let Some(bvs) = status else {
            return false;
        };

        let indicators = [
            bvs.extended_data1,
            bvs.mileage,
            bvs.exterior_temperature,
        ]
        .iter()
        .filter(|v| **v == Some(crate::models::vehicle::SENTINEL_UNAVAILABLE))
        .count();

        if indicators >= self.threshold {
            self.consecutive_invalid += 1;
            true
        } else {
            self.consecutive_invalid = 0;
            false
        }
    }

    pub fn consecutive_invalid(&self) -> u32 {
        self.consecutive_invalid
    }
}

/// The main polling loop and its derived-state plumbing.
pub struct UpdateOrchestrator {
    session: SessionManager,
    registry: RegistryClient,
    geocoder: GeocodingClient,
    scheduler: SchedulerConfig,
    presence: PresenceDetector,
    sleep: SleepDetector,
    charge_tracker: ChargeSessionTracker,
    last_known_at_home: bool,
    status: SharedStatus,
}

impl UpdateOrchestrator {
    pub fn new(
        session: SessionManager,
        registry: RegistryClient,
        geocoder: GeocodingClient,
        scheduler: SchedulerConfig,
        presence: PresenceDetector,
        sleep_indicator_threshold: usize,
        status: SharedStatus,
    ) -> Self {
        Self {
            session,
            registry,
            geocoder,
            scheduler,
            presence,
            sleep: SleepDetector::new(sleep_indicator_threshold),
            charge_tracker: ChargeSessionTracker::new(),
            last_known_at_home: false,
            status,
        }
    }

    /// Run until the shutdown signal flips or the session terminates.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        // Home coordinates can live in the registry settings; resolve
        // them once so the presence predicate is ready before the first
        // GPS fix.
        if !self.presence.has_home() {
            let radius = self.presence.radius_m();
            match self.registry.home_coordinates().await {
                Ok(Some(home)) => {
                    tracing::info!(lat = home.0, lon = home.1, "Home location from registry settings");
                    self.presence = PresenceDetector::new(Some(home), radius);
                }
                Ok(None) => {
                    tracing::warn!("No home location configured; presence will report away")
                }
                Err(e) => tracing::warn!(error = %e, "Failed to fetch home location"),
            }
        }

        while !*shutdown.borrow() {
            let delay = match self.poll_once().await {
                Ok(delay) => delay,
                Err(e) if e.is_auth_error() => {
                    let failures = self.session.record_auth_failure().await;
                    tracing::error!(
                        error = %e,
                        attempt = failures,
                        ceiling = MAX_AUTH_FAILURES,
                        "Authentication error"
                    );
                    if self.session.is_terminated().await {
                        tracing::error!("Too many authentication failures. Stopping update loop.");
                        break;
                    }
                    auth_retry_delay(self.scheduler.base_interval)
                }
                Err(e) => {
                    tracing::info!(error = %e, "Update cycle failed, retrying on next tick");
                    self.scheduler.base_interval
                }
            };

            tracing::debug!(delay_secs = delay.as_secs(), "Sleeping until next poll");
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        tracing::info!("Update loop stopped");
    }

    /// One full poll cycle. Returns the delay until the next one.
    pub async fn poll_once(&mut self) -> Result<Duration, AppError> {
        let token = self.session.ensure_authenticated().await?;
        let vehicle = self.session.vehicle().await?;
        let vehicle_name = vehicle.display_name();
        let client = self.session.client().clone();

        // Both fetches may fail transiently on their own; a cycle with
        // partial data still updates what it can. Auth rejections always
        // propagate.
        let vehicle_status = match client.get_vehicle_status(&token, &vehicle.vin).await {
            Ok(status) => Some(status),
            Err(e) if e.is_auth_error() => return Err(e),
            Err(e) => {
                tracing::info!(error = %e, "Could not get vehicle status");
                None
            }
        };

        let charging_status = match client.get_charging_status(&token, &vehicle.vin).await {
            Ok(status) => Some(status),
            Err(e) if e.is_auth_error() => return Err(e),
            Err(e) => {
                tracing::info!(error = %e, "Could not get charging status");
                None
            }
        };

        if vehicle_status.is_none() && charging_status.is_none() {
            return Ok(self.scheduler.base_interval);
        }

        let deep_sleep = self
            .sleep
            .observe(vehicle_status.as_ref().and_then(|s| s.basic_vehicle_status.as_ref()));
        if deep_sleep && self.sleep.consecutive_invalid() >= DEEP_SLEEP_LOG_THRESHOLD {
            tracing::debug!(
                consecutive = self.sleep.consecutive_invalid(),
                "Car in deep sleep mode"
            );
        }

        // Registry reconciliation is best-effort: create what is missing,
        // then update values; never abort the cycle on registry trouble.
        match self.registry.ensure_devices_exist(&vehicle_name).await {
            Ok(created) if !created.is_empty() => {
                let plan_name = vehicle_name.replace(' ', "-");
                let all_ids: Vec<&str> = DEVICE_CATALOG.iter().map(|d| d.id).collect();
                if let Err(e) = self.registry.ensure_room_plan(&plan_name, &all_ids).await {
                    tracing::warn!(error = %e, "Room plan update failed");
                }
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Device reconciliation failed"),
        }

        self.update_devices(vehicle_status.as_ref(), charging_status.as_ref())
            .await;

        self.drive_charge_notifications(charging_status.as_ref())
            .await;

        self.publish_snapshot(vehicle_status.as_ref(), charging_status.as_ref(), !deep_sleep)
            .await;

        self.session.note_success().await;

        let now = Local::now().time();
        Ok(next_poll_interval(now, self.last_known_at_home, &self.scheduler))
    }

    // ─── Derived Devices ─────────────────────────────────────────────────────

    async fn update_devices(
        &mut self,
        vehicle_status: Option<&VehicleStatusResponse>,
        charging_status: Option<&ChargingStatusResponse>,
    ) {
        if let Some(charging) = charging_status {
            self.update_charging_devices(charging).await;
        }
        if let Some(status) = vehicle_status {
            self.update_vehicle_devices(status).await;
            self.update_location_devices(status).await;
        }
    }

    async fn update_charging_devices(&self, charging: &ChargingStatusResponse) {
        let is_charging = charging.is_charging();
        self.push_switch("charging", is_charging).await;
        self.push_switch("cable_connected", charging.is_cable_connected())
            .await;
        self.push_switch("battery_heating", charging.is_battery_heating())
            .await;
        self.push_switch("charging_port_lock", charging.is_port_locked())
            .await;

        // SoC sentinel handling lives in the model accessor; zero is the
        // sleeping-car placeholder and skipped too.
        if let Some(soc) = charging.soc_percent().filter(|soc| *soc > 0.0) {
            self.push("battery_level", soc as i64, &soc.to_string()).await;
        }

        if let Some(percent) = charging.charge_limit_percent() {
            let selector = charge_limit_selector_level(percent);
            self.push("charge_limit", selector, &selector.to_string()).await;
        }

        if let Some(data) = &charging.chrg_mgmt_data {
            if let Some(level) = data
                .bms_altng_chrg_crnt_dsp_cmd
                .and_then(charge_current_selector_level)
            {
                self.push("charge_current_limit", level, &level.to_string())
                    .await;
            }
        }

        if let Some(mode) = charging.scheduled_charging_mode() {
            let level = scheduled_mode_selector_level(mode);
            self.push("scheduled_charging", level, &level.to_string()).await;
        }

        match charging.charging_power_w().filter(|_| is_charging) {
            Some(power) => {
                self.push("charging_power", 0, &format!("{:.0};0", power)).await
            }
            None => self.push("charging_power", 0, "0;0").await,
        }

        if let Some(kwh) = charging.pack_capacity_kwh() {
            self.push("battery_capacity", 0, &kwh.to_string()).await;
        }
        if let Some(wh) = charging.power_usage_today_wh() {
            self.push("power_usage_today", 0, &wh.to_string()).await;
        }

        match charging.minutes_to_full().filter(|_| is_charging) {
            Some(minutes) => self.push("time_to_full", 0, &minutes.to_string()).await,
            None => self.push("time_to_full", 0, "0").await,
        }

        if let Some(km) = charging.odometer_km() {
            self.push("odometer", 0, &km.to_string()).await;
        }
        if let Some(km) = charging.range_km() {
            self.push("range", 0, &km.to_string()).await;
        }
        if let Some(km) = charging.estimated_max_range_km() {
            self.push("max_range", 0, &km.to_string()).await;
        }
    }

    async fn update_vehicle_devices(&self, status: &VehicleStatusResponse) {
        if let Some(speed) = status.speed_kmh() {
            self.push("speed", 0, &speed.to_string()).await;
        }

        let Some(bvs) = &status.basic_vehicle_status else {
            return;
        };

        self.push_switch("lock_status", bvs.is_locked()).await;
        self.push_switch("climate_active", bvs.is_climate_active()).await;
        self.push_switch("engine_status", bvs.is_engine_running()).await;
        self.push_switch("hand_brake", bvs.is_hand_brake_on()).await;

        let sleeping = bvs.reports_sleeping();
        self.push(
            "car_status",
            i64::from(!sleeping),
            if sleeping { "Sleeping" } else { "Online" },
        )
        .await;

        if let Some(volts) = bvs.aux_battery_voltage() {
            self.push("aux_battery", 0, &volts.to_string()).await;
        }
        if let Some(temp) = bvs.exterior_temp_c() {
            self.push("exterior_temp", 0, &temp.to_string()).await;
        }
        if let Some(temp) = bvs.interior_temp_c() {
            self.push("interior_temp", 0, &temp.to_string()).await;
        }

        if let Some(level) = bvs.front_left_seat_heat_level {
            let selector = i64::from(level) * 10;
            self.push("heated_seat_left", selector, &selector.to_string()).await;
        }
        if let Some(level) = bvs.front_right_seat_heat_level {
            let selector = i64::from(level) * 10;
            self.push("heated_seat_right", selector, &selector.to_string()).await;
        }

        for (id, raw) in [
            ("tyre_fl", bvs.front_left_tyre_pressure),
            ("tyre_fr", bvs.front_right_tyre_pressure),
            ("tyre_rl", bvs.rear_left_tyre_pressure),
            ("tyre_rr", bvs.rear_right_tyre_pressure),
        ] {
            if let Some(bar) = raw.and_then(tyre_pressure_bar) {
                self.push(id, 0, &format!("{:.2}", bar)).await;
            }
        }
    }

    /// Location-derived devices. Presence only moves on a fresh fix; the
    /// sticky flag keeps feeding the scheduler between fixes.
    async fn update_location_devices(&mut self, status: &VehicleStatusResponse) {
        let Some((lat, lon)) = status.coordinates() else {
            return;
        };

        self.push("gps_location", 0, &format!("{:.6},{:.6}", lat, lon)).await;

        let at_home = self.presence.is_at_home(lat, lon);
        self.last_known_at_home = at_home;
        self.push_switch("car_at_home", at_home).await;

        let address = if at_home {
            "Home".to_string()
        } else {
            match self.geocoder.reverse(lat, lon).await {
                Ok(address) => address,
                Err(e) => {
                    tracing::warn!(error = %e, "Reverse geocoding failed");
                    return;
                }
            }
        };
        self.push("address", 0, &address).await;
    }

    // ─── Notifications ───────────────────────────────────────────────────────

    async fn drive_charge_notifications(&mut self, charging: Option<&ChargingStatusResponse>) {
        let Some(charging) = charging else {
            return;
        };

        let events = self.charge_tracker.observe(
            charging.is_charging(),
            charging.soc_percent(),
            charging.charge_limit_percent(),
        );

        for event in events {
            let body = match event {
                ChargeEvent::Started => continue,
                ChargeEvent::Stopped { soc_percent } => match soc_percent {
                    Some(soc) => format!("Charging stopped. SoC is {:.1}%.", soc),
                    None => "Charging stopped.".to_string(),
                },
                ChargeEvent::TargetReached {
                    soc_percent,
                    target_percent,
                } => format!(
                    "Charging target of {}% reached (SoC: {:.1}%).",
                    target_percent, soc_percent
                ),
            };
            if let Err(e) = self.registry.send_notification(NOTIFICATION_SUBJECT, &body).await {
                tracing::error!(error = %e, "Failed to send notification");
            }
        }
    }

    async fn publish_snapshot(
        &self,
        vehicle_status: Option<&VehicleStatusResponse>,
        charging_status: Option<&ChargingStatusResponse>,
        awake: bool,
    ) {
        let snapshot = StatusSnapshot {
            polled_at: format_naive_timestamp(Local::now().naive_local()),
            soc_percent: charging_status.and_then(|c| c.soc_percent()),
            charging: charging_status.map(|c| c.is_charging()).unwrap_or(false),
            charge_limit_percent: charging_status.and_then(|c| c.charge_limit_percent()),
            at_home: self.last_known_at_home,
            awake: awake
                && !vehicle_status
                    .and_then(|s| s.basic_vehicle_status.as_ref())
                    .map(|b| b.reports_sleeping())
                    .unwrap_or(false),
            odometer_km: charging_status.and_then(|c| c.odometer_km()),
            range_km: charging_status.and_then(|c| c.range_km()),
        };
        *self.status.write().await = Some(snapshot);
    }

    // ─── Helpers ─────────────────────────────────────────────────────────────

    async fn push(&self, id: &str, n_value: i64, s_value: &str) {
        if let Err(e) = self.registry.update_device(id, n_value, s_value).await {
            tracing::debug!(id, error = %e, "Device update failed");
        }
    }

    async fn push_switch(&self, id: &str, on: bool) {
        self.push(id, i64::from(on), if on { "On" } else { "Off" }).await;
    }
}

/// Map a charge-limit percentage to its selector level.
fn charge_limit_selector_level(percent: u8) -> i64 {
    match percent {
        40 => 10,
        50 => 20,
        60 => 30,
        70 => 40,
        80 => 50,
        90 => 60,
        100 => 70,
        _ => 0,
    }
}

/// Map a BMS charge-current code to its selector level.
fn charge_current_selector_level(code: i32) -> Option<i64> {
    match code {
        0 => Some(0),
        1 => Some(10),
        2 => Some(20),
        3 => Some(30),
        4 => Some(40),
        _ => None,
    }
}

fn scheduled_mode_selector_level(mode: ScheduledChargingMode) -> i64 {
    match mode {
        ScheduledChargingMode::Disabled => 0,
        ScheduledChargingMode::UntilConfiguredTime => 10,
        ScheduledChargingMode::UntilConfiguredSoc => 20,
    }
}
