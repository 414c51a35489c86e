// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Device registry client (Domoticz-style JSON HTTP API).
//!
//! Everything goes through `json.htm` with query parameters. Failures
//! here are integration errors: logged by callers, never allowed to
//! abort a poll cycle. A process-local cache of known device ids keeps
//! the ensure-exists pass idempotent without a remote round trip per
//! device per cycle.

use crate::error::AppError;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;

/// Definition of one derived device.
#[derive(Debug, Clone, Copy)]
pub struct DeviceDefinition {
    /// Stable id within the registry.
    pub id: &'static str,
    /// Human name suffix, prefixed with the vehicle name on creation.
    pub name: &'static str,
    /// Registry device type.
    pub device_type: &'static str,
    /// Type-specific options (units, selector levels).
    pub options: Option<&'static str>,
}

/// The full set of devices mirrored from vehicle state.
pub const DEVICE_CATALOG: &[DeviceDefinition] = &[
    DeviceDefinition { id: "battery_level", name: "Battery Level", device_type: "percentage", options: None },
    DeviceDefinition { id: "range", name: "Range", device_type: "custom", options: Some("1;km") },
    DeviceDefinition { id: "max_range", name: "Max Range", device_type: "custom", options: Some("1;km") },
    DeviceDefinition { id: "charging", name: "Charging", device_type: "switch", options: None },
    DeviceDefinition { id: "charge_control", name: "Start/Stop Charging", device_type: "switch", options: None },
    DeviceDefinition { id: "charge_limit", name: "Set Charge Limit", device_type: "selector", options: Some("Off|40%|50%|60%|70%|80%|90%|100%") },
    DeviceDefinition { id: "charge_current_limit", name: "Charge Current Limit", device_type: "selector", options: Some("Off|6A|8A|16A|MAX") },
    DeviceDefinition { id: "scheduled_charging", name: "Scheduled Charging", device_type: "selector", options: Some("Off|Until Time|Until SOC") },
    DeviceDefinition { id: "battery_heating", name: "Battery Heating", device_type: "switch", options: None },
    DeviceDefinition { id: "charging_port_lock", name: "Charging Port Lock", device_type: "switch", options: None },
    DeviceDefinition { id: "cable_connected", name: "Cable Connected", device_type: "switch", options: None },
    DeviceDefinition { id: "charging_power", name: "Charging Power", device_type: "electric", options: None },
    DeviceDefinition { id: "battery_capacity", name: "Battery Cap.", device_type: "custom", options: Some("1;kWh") },
    DeviceDefinition { id: "power_usage_today", name: "Power Usage", device_type: "counter", options: Some("Wh") },
    DeviceDefinition { id: "time_to_full", name: "Time to Full", device_type: "custom", options: Some("1;min") },
    DeviceDefinition { id: "odometer", name: "Odometer", device_type: "counter", options: Some("km") },
    DeviceDefinition { id: "speed", name: "Speed", device_type: "custom", options: Some("1;km/h") },
    DeviceDefinition { id: "gps_location", name: "GPS Location", device_type: "text", options: None },
    DeviceDefinition { id: "address", name: "Address", device_type: "text", options: None },
    DeviceDefinition { id: "car_at_home", name: "Car at Home", device_type: "switch", options: None },
    DeviceDefinition { id: "lock_status", name: "Lock Status", device_type: "switch", options: None },
    DeviceDefinition { id: "lock_control", name: "Lock Control", device_type: "switch", options: None },
    DeviceDefinition { id: "climate_active", name: "Climate Active", device_type: "switch", options: None },
    DeviceDefinition { id: "engine_status", name: "Engine Status", device_type: "switch", options: None },
    DeviceDefinition { id: "hand_brake", name: "Hand Brake", device_type: "switch", options: None },
    DeviceDefinition { id: "car_status", name: "Status", device_type: "switch", options: None },
    DeviceDefinition { id: "aux_battery", name: "12V Battery", device_type: "voltage", options: None },
    DeviceDefinition { id: "exterior_temp", name: "Exterior Temp.", device_type: "temperature", options: None },
    DeviceDefinition { id: "interior_temp", name: "Interior Temp.", device_type: "temperature", options: None },
    DeviceDefinition { id: "heated_seat_left", name: "Heated Seat Left", device_type: "selector", options: Some("Off|Low|Medium|High") },
    DeviceDefinition { id: "heated_seat_right", name: "Heated Seat Right", device_type: "selector", options: Some("Off|Low|Medium|High") },
    DeviceDefinition { id: "tyre_fl", name: "Tyre FL", device_type: "pressure", options: None },
    DeviceDefinition { id: "tyre_fr", name: "Tyre FR", device_type: "pressure", options: None },
    DeviceDefinition { id: "tyre_rl", name: "Tyre RL", device_type: "pressure", options: None },
    DeviceDefinition { id: "tyre_rr", name: "Tyre RR", device_type: "pressure", options: None },
];

/// Registry API client.
#[derive(Clone)]
pub struct RegistryClient {
    http: reqwest::Client,
    base_url: String,
    /// Device ids confirmed present in the registry.
    known_devices: Arc<DashMap<String, ()>>,
}

impl RegistryClient {
    pub fn new(base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            known_devices: Arc::new(DashMap::new()),
        }
    }

    // ─── Devices ─────────────────────────────────────────────────────────────

    /// Check whether a device exists in the registry.
    pub async fn device_exists(&self, id: &str) -> Result<bool, AppError> {
        if self.known_devices.contains_key(id) {
            return Ok(true);
        }
        let response = self
            .api_call(&[("type", "command"), ("param", "getdevice"), ("id", id)])
            .await;
        match response {
            Ok(_) => {
                self.known_devices.insert(id.to_string(), ());
                Ok(true)
            }
            Err(AppError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Create a device from its definition.
    pub async fn create_device(
        &self,
        definition: &DeviceDefinition,
        vehicle_name: &str,
    ) -> Result<(), AppError> {
        let name = format!("{} {}", vehicle_name, definition.name);
        let mut params = vec![
            ("type", "command".to_string()),
            ("param", "createdevice".to_string()),
            ("id", definition.id.to_string()),
            ("name", name),
            ("devicetype", definition.device_type.to_string()),
        ];
        if let Some(options) = definition.options {
            params.push(("options", options.to_string()));
        }

        let params: Vec<(&str, &str)> = params.iter().map(|(k, v)| (*k, v.as_str())).collect();
        self.api_call(&params).await?;
        self.known_devices.insert(definition.id.to_string(), ());
        tracing::info!(id = definition.id, "Created registry device");
        Ok(())
    }

    /// Create every missing catalog device. Returns the ids created, so
    /// the caller can decide whether the room plan needs refreshing.
    /// Calling this twice in a row creates nothing the second time.
    pub async fn ensure_devices_exist(
        &self,
        vehicle_name: &str,
    ) -> Result<Vec<&'static str>, AppError> {
        let mut created = Vec::new();
        for definition in DEVICE_CATALOG {
            if !self.device_exists(definition.id).await? {
                self.create_device(definition, vehicle_name).await?;
                created.push(definition.id);
            }
        }
        if !created.is_empty() {
            tracing::info!(count = created.len(), "Recreated missing registry devices");
        }
        Ok(created)
    }

    /// Push a value update to a device.
    pub async fn update_device(
        &self,
        id: &str,
        n_value: i64,
        s_value: &str,
    ) -> Result<(), AppError> {
        let n_value = n_value.to_string();
        self.api_call(&[
            ("type", "command"),
            ("param", "udevice"),
            ("id", id),
            ("nvalue", n_value.as_str()),
            ("svalue", s_value),
        ])
        .await?;
        Ok(())
    }

    // ─── Room Plans ──────────────────────────────────────────────────────────

    /// Find a room plan's idx by name, creating the plan if needed.
    pub async fn plan_idx(&self, plan_name: &str) -> Result<String, AppError> {
        if let Some(idx) = self.find_plan(plan_name).await? {
            return Ok(idx);
        }

        tracing::debug!(plan = plan_name, "Room plan not found, creating");
        self.api_call(&[
            ("type", "command"),
            ("param", "addplan"),
            ("name", plan_name),
        ])
        .await?;

        self.find_plan(plan_name)
            .await?
            .ok_or_else(|| AppError::Integration(format!("Plan '{}' missing after create", plan_name)))
    }

    async fn find_plan(&self, plan_name: &str) -> Result<Option<String>, AppError> {
        let data = self
            .api_call(&[
                ("type", "command"),
                ("param", "getplans"),
                ("order", "name"),
                ("used", "true"),
            ])
            .await?;

        let idx = data
            .get("result")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .find(|plan| plan.get("Name").and_then(Value::as_str) == Some(plan_name))
            .and_then(|plan| plan.get("idx"))
            .and_then(|idx| match idx {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            });
        Ok(idx)
    }

    /// Attach a device to a room plan.
    pub async fn add_device_to_plan(&self, device_id: &str, plan_idx: &str) -> Result<(), AppError> {
        self.api_call(&[
            ("type", "command"),
            ("param", "addplanactivedevice"),
            ("activeidx", device_id),
            ("idx", plan_idx),
        ])
        .await?;
        Ok(())
    }

    /// Group the given devices under a plan named for the vehicle.
    pub async fn ensure_room_plan(
        &self,
        plan_name: &str,
        device_ids: &[&str],
    ) -> Result<(), AppError> {
        let plan_idx = self.plan_idx(plan_name).await?;
        for id in device_ids {
            self.add_device_to_plan(id, &plan_idx).await?;
        }
        tracing::info!(plan = plan_name, count = device_ids.len(), "Devices added to room plan");
        Ok(())
    }

    // ─── Notifications & Settings ────────────────────────────────────────────

    /// Send a notification through the registry's notification subsystem.
    pub async fn send_notification(&self, subject: &str, body: &str) -> Result<(), AppError> {
        self.api_call(&[
            ("type", "command"),
            ("param", "sendnotification"),
            ("subject", subject),
            ("body", body),
        ])
        .await?;
        Ok(())
    }

    /// Home coordinates from the registry's location settings, if set.
    pub async fn home_coordinates(&self) -> Result<Option<(f64, f64)>, AppError> {
        let data = self
            .api_call(&[("type", "command"), ("param", "getsettings")])
            .await?;

        let location = match data.get("Location") {
            Some(location) => location,
            None => return Ok(None),
        };
        let lat = parse_coordinate(location.get("Latitude"));
        let lon = parse_coordinate(location.get("Longitude"));
        Ok(lat.zip(lon))
    }

    /// Make a `json.htm` API call, verifying the embedded status field.
    async fn api_call(&self, params: &[(&str, &str)]) -> Result<Value, AppError> {
        let url = format!("{}/json.htm", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(params)
            .send()
            .await
            .map_err(|e| AppError::Integration(format!("Registry request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Integration(format!(
                "Registry returned HTTP {}",
                response.status()
            )));
        }

        let data: Value = response
            .json()
            .await
            .map_err(|e| AppError::Integration(format!("Registry JSON parse error: {}", e)))?;

        match data.get("status").and_then(Value::as_str) {
            Some("OK") => Ok(data),
            Some("ERR") => Err(AppError::NotFound(
                data.get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("registry object not found")
                    .to_string(),
            )),
            other => Err(AppError::Integration(format!(
                "Registry API error: {}",
                other.unwrap_or("missing status")
            ))),
        }
    }
}

/// Registry settings serialize coordinates as strings or numbers
/// depending on version.
fn parse_coordinate(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}
