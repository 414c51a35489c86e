// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod charging;
pub mod vehicle;

pub use charging::{ChargingStatusResponse, ChrgMgmtData, RvsChargeStatus};
pub use vehicle::{
    BasicVehicleStatus, GpsPosition, VehicleInfo, VehicleStatusResponse, WayPoint,
};
