// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Vehicle status payloads from the remote API.
//!
//! The API routinely omits fields and uses −128 as an "unavailable"
//! sentinel, so every field is an explicit `Option` and every consumer
//! goes through a typed accessor with a stated default policy instead of
//! probing raw JSON.

use serde::{Deserialize, Serialize};

/// Sentinel the API uses for "data unavailable".
pub const SENTINEL_UNAVAILABLE: i32 = -128;

/// Vehicle identity from the vehicle-list endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleInfo {
    pub vin: String,
    #[serde(rename = "brandName")]
    pub brand_name: Option<String>,
    #[serde(rename = "modelName")]
    pub model_name: Option<String>,
}

impl VehicleInfo {
    /// Display name used for registry devices: model with marketing
    /// prefixes stripped plus the last four VIN characters.
    pub fn display_name(&self) -> String {
        let model = self
            .model_name
            .as_deref()
            .unwrap_or("Vehicle")
            .replace("Electric", "")
            .replace("MG ", "")
            .trim()
            .to_string();
        let suffix = if self.vin.len() >= 4 {
            &self.vin[self.vin.len() - 4..]
        } else {
            "XXXX"
        };
        format!("{} {}", model, suffix)
    }
}

/// Top-level status response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VehicleStatusResponse {
    #[serde(rename = "basicVehicleStatus")]
    pub basic_vehicle_status: Option<BasicVehicleStatus>,
    #[serde(rename = "gpsPosition")]
    pub gps_position: Option<GpsPosition>,
}

impl VehicleStatusResponse {
    /// Fresh GPS fix in decimal degrees, if the response carried one.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        let position = self.gps_position.as_ref()?.way_point.as_ref()?.position.as_ref()?;
        Some((
            position.latitude as f64 / 1e6,
            position.longitude as f64 / 1e6,
        ))
    }

    /// Speed in km/h; raw value is km/h × 10, non-positive means stopped.
    pub fn speed_kmh(&self) -> Option<f64> {
        let raw = self.gps_position.as_ref()?.way_point.as_ref()?.speed?;
        if raw > 0 {
            Some(raw as f64 / 10.0)
        } else {
            Some(0.0)
        }
    }
}

/// Basic vehicle status block. Field names match the wire format.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BasicVehicleStatus {
    #[serde(rename = "batteryVoltage")]
    pub battery_voltage: Option<i32>,
    #[serde(rename = "engineStatus")]
    pub engine_status: Option<i32>,
    #[serde(rename = "handBrake")]
    pub hand_brake: Option<i32>,
    #[serde(rename = "lockStatus")]
    pub lock_status: Option<i32>,
    #[serde(rename = "remoteClimateStatus")]
    pub remote_climate_status: Option<i32>,
    #[serde(rename = "extendedData1")]
    pub extended_data1: Option<i32>,
    #[serde(rename = "exteriorTemperature")]
    pub exterior_temperature: Option<i32>,
    #[serde(rename = "interiorTemperature")]
    pub interior_temperature: Option<i32>,
    pub mileage: Option<i32>,
    #[serde(rename = "frontLeftSeatHeatLevel")]
    pub front_left_seat_heat_level: Option<i32>,
    #[serde(rename = "frontRightSeatHeatLevel")]
    pub front_right_seat_heat_level: Option<i32>,
    #[serde(rename = "frontLeftTyrePressure")]
    pub front_left_tyre_pressure: Option<i32>,
    #[serde(rename = "frontRightTyrePressure")]
    pub front_right_tyre_pressure: Option<i32>,
    #[serde(rename = "rearLeftTyrePressure")]
    pub rear_left_tyre_pressure: Option<i32>,
    #[serde(rename = "rearRightTyrePressure")]
    pub rear_right_tyre_pressure: Option<i32>,
}

impl BasicVehicleStatus {
    pub fn is_locked(&self) -> bool {
        self.lock_status == Some(1)
    }

    pub fn is_engine_running(&self) -> bool {
        self.engine_status == Some(1)
    }

    pub fn is_hand_brake_on(&self) -> bool {
        self.hand_brake == Some(1)
    }

    pub fn is_climate_active(&self) -> bool {
        self.remote_climate_status.unwrap_or(0) > 0
    }

    /// 12 V battery voltage; raw value is volts × 10. Readings at or
    /// below 5 V are charger noise and suppressed.
    pub fn aux_battery_voltage(&self) -> Option<f64> {
        let volts = self.battery_voltage? as f64 / 10.0;
        if volts > 5.0 {
            Some(volts)
        } else {
            None
        }
    }

    /// Exterior temperature in °C, sentinel and out-of-range suppressed.
    pub fn exterior_temp_c(&self) -> Option<i32> {
        valid_temperature(self.exterior_temperature)
    }

    /// Interior temperature in °C, sentinel and out-of-range suppressed.
    pub fn interior_temp_c(&self) -> Option<i32> {
        valid_temperature(self.interior_temperature)
    }

    /// Whether the car reports itself asleep on the extended diagnostic
    /// field alone (single-indicator check used for the status device).
    pub fn reports_sleeping(&self) -> bool {
        self.extended_data1 == Some(SENTINEL_UNAVAILABLE)
    }
}

fn valid_temperature(raw: Option<i32>) -> Option<i32> {
    match raw {
        Some(t) if t > -100 && t != SENTINEL_UNAVAILABLE => Some(t),
        _ => None,
    }
}

/// GPS position wrapper.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GpsPosition {
    #[serde(rename = "wayPoint")]
    pub way_point: Option<WayPoint>,
}

/// A single way point: position plus speed (km/h × 10).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WayPoint {
    pub position: Option<Position>,
    pub speed: Option<i64>,
}

/// Position in micro-degrees.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Position {
    pub latitude: i64,
    pub longitude: i64,
}

/// Convert a raw tyre pressure reading to bar.
///
/// The API is believed to report bar × 20, but some firmware reports raw
/// PSI; anything decoding above 6.0 bar is re-read as PSI. Kept as one
/// isolated policy so it can be corrected without touching callers.
pub fn tyre_pressure_bar(raw: i32) -> Option<f64> {
    if raw <= 0 || raw == SENTINEL_UNAVAILABLE {
        return None;
    }
    let bar = raw as f64 / 20.0;
    if bar > 6.0 {
        Some(raw as f64 * 0.068_947_6)
    } else {
        Some(bar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_strips_marketing_prefixes() {
        let info = VehicleInfo {
            vin: "LSJWH4095MN123456".to_string(),
            brand_name: Some("MG".to_string()),
            model_name: Some("MG ZS Electric".to_string()),
        };
        assert_eq!(info.display_name(), "ZS 3456");
    }

    #[test]
    fn test_display_name_short_vin() {
        let info = VehicleInfo {
            vin: "AB".to_string(),
            brand_name: None,
            model_name: None,
        };
        assert_eq!(info.display_name(), "Vehicle XXXX");
    }

    #[test]
    fn test_coordinates_scaled_from_microdegrees() {
        let status = VehicleStatusResponse {
            basic_vehicle_status: None,
            gps_position: Some(GpsPosition {
                way_point: Some(WayPoint {
                    position: Some(Position {
                        latitude: 48_856_600,
                        longitude: 2_352_200,
                    }),
                    speed: Some(123),
                }),
            }),
        };
        let (lat, lon) = status.coordinates().unwrap();
        assert!((lat - 48.8566).abs() < 1e-9);
        assert!((lon - 2.3522).abs() < 1e-9);
        assert_eq!(status.speed_kmh(), Some(12.3));
    }

    #[test]
    fn test_temperature_sentinel_suppressed() {
        let bvs = BasicVehicleStatus {
            exterior_temperature: Some(SENTINEL_UNAVAILABLE),
            interior_temperature: Some(21),
            ..Default::default()
        };
        assert_eq!(bvs.exterior_temp_c(), None);
        assert_eq!(bvs.interior_temp_c(), Some(21));
    }

    #[test]
    fn test_aux_battery_noise_suppressed() {
        let bvs = BasicVehicleStatus {
            battery_voltage: Some(128),
            ..Default::default()
        };
        assert_eq!(bvs.aux_battery_voltage(), Some(12.8));

        let noisy = BasicVehicleStatus {
            battery_voltage: Some(30),
            ..Default::default()
        };
        assert_eq!(noisy.aux_battery_voltage(), None);
    }

    #[test]
    fn test_tyre_pressure_direct_bar_encoding() {
        // 47 / 20 = 2.35 bar, plausible -> direct conversion
        assert_eq!(tyre_pressure_bar(47), Some(2.35));
    }

    #[test]
    fn test_tyre_pressure_psi_fallback() {
        // 140 / 20 = 7.0 bar, implausible -> treat raw as PSI
        let bar = tyre_pressure_bar(140).unwrap();
        assert!((bar - 9.652).abs() < 0.01);
    }

    #[test]
    fn test_tyre_pressure_sentinel_rejected() {
        assert_eq!(tyre_pressure_bar(SENTINEL_UNAVAILABLE), None);
        assert_eq!(tyre_pressure_bar(0), None);
    }
}
