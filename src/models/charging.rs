// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Charging management payloads from the remote API.
//!
//! SoC and range come back in BMS-internal encodings (per-mille SoC,
//! coded charge limits, 1023-style sentinels), so the accessors below are
//! the only place those encodings are interpreted.

use serde::Deserialize;

/// Top-level charging status response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChargingStatusResponse {
    #[serde(rename = "chrgMgmtData")]
    pub chrg_mgmt_data: Option<ChrgMgmtData>,
    #[serde(rename = "rvsChargeStatus")]
    pub rvs_charge_status: Option<RvsChargeStatus>,
}

/// BMS charge management block. Field names match the wire format.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChrgMgmtData {
    #[serde(rename = "bmsChrgSts")]
    pub bms_chrg_sts: Option<i32>,
    #[serde(rename = "bmsPackSOCDsp")]
    pub bms_pack_soc_dsp: Option<i32>,
    #[serde(rename = "bmsOnBdChrgTrgtSOCDspCmd")]
    pub bms_on_bd_chrg_trgt_soc_dsp_cmd: Option<i32>,
    #[serde(rename = "bmsAltngChrgCrntDspCmd")]
    pub bms_altng_chrg_crnt_dsp_cmd: Option<i32>,
    #[serde(rename = "bmsReserCtrlDspCmd")]
    pub bms_reser_ctrl_dsp_cmd: Option<i32>,
    #[serde(rename = "bmsPTCHeatReqDspCmd")]
    pub bms_ptc_heat_req_dsp_cmd: Option<i32>,
    #[serde(rename = "ccuEleccLckCtrlDspCmd")]
    pub ccu_elecc_lck_ctrl_dsp_cmd: Option<i32>,
    #[serde(rename = "chrgngRmnngTime")]
    pub chrgng_rmnng_time: Option<i32>,
    #[serde(rename = "chrgngRmnngTimeV")]
    pub chrgng_rmnng_time_v: Option<i32>,
    #[serde(rename = "clstrElecRngToEPT")]
    pub clstr_elec_rng_to_ept: Option<i32>,
    #[serde(rename = "bmsEstdElecRng")]
    pub bms_estd_elec_rng: Option<i32>,
}

/// Charge/discharge status block reported by the vehicle side.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RvsChargeStatus {
    #[serde(rename = "chargingGunState")]
    pub charging_gun_state: Option<i32>,
    #[serde(rename = "workingCurrent")]
    pub working_current: Option<i64>,
    #[serde(rename = "realtimePower")]
    pub realtime_power: Option<i64>,
    #[serde(rename = "powerUsageOfDay")]
    pub power_usage_of_day: Option<i64>,
    pub mileage: Option<i64>,
}

impl ChargingStatusResponse {
    /// Actively charging: BMS reports charging AND the gun is seated.
    pub fn is_charging(&self) -> bool {
        let bms_charging = self
            .chrg_mgmt_data
            .as_ref()
            .and_then(|d| d.bms_chrg_sts)
            .unwrap_or(0)
            == 1;
        let gun_connected = self.is_cable_connected();
        bms_charging && gun_connected
    }

    /// Charge cable seated in the port.
    pub fn is_cable_connected(&self) -> bool {
        self.rvs_charge_status
            .as_ref()
            .and_then(|s| s.charging_gun_state)
            .unwrap_or(0)
            == 1
    }

    /// State of charge in percent. The BMS reports per-mille with 1023
    /// as its own sentinel; anything outside 0..=1000 is unusable.
    pub fn soc_percent(&self) -> Option<f64> {
        let raw = self.chrg_mgmt_data.as_ref()?.bms_pack_soc_dsp?;
        if (0..=1000).contains(&raw) {
            Some(raw as f64 / 10.0)
        } else {
            None
        }
    }

    /// Configured charge target in percent, from the coded limit field.
    pub fn charge_limit_percent(&self) -> Option<u8> {
        let code = self.chrg_mgmt_data.as_ref()?.bms_on_bd_chrg_trgt_soc_dsp_cmd?;
        charge_limit_from_code(code)
    }

    /// Remaining minutes to full, only while charging and only when the
    /// BMS validity flag (0 = valid) says so.
    pub fn minutes_to_full(&self) -> Option<i32> {
        let data = self.chrg_mgmt_data.as_ref()?;
        if data.chrgng_rmnng_time_v? != 0 {
            return None;
        }
        data.chrgng_rmnng_time
    }

    /// Instantaneous charging power in watts, estimated from the working
    /// current (mA) on a three-phase 220 V connection.
    pub fn charging_power_w(&self) -> Option<f64> {
        let current_ma = self.rvs_charge_status.as_ref()?.working_current?;
        if current_ma <= 0 {
            return None;
        }
        let amps = current_ma as f64 / 1000.0;
        Some(3.0 * 0.86 * amps * 220.0)
    }

    /// Realtime usable pack capacity in kWh (raw is kWh × 10).
    pub fn pack_capacity_kwh(&self) -> Option<f64> {
        let raw = self.rvs_charge_status.as_ref()?.realtime_power?;
        if raw > 0 {
            Some(raw as f64 / 10.0)
        } else {
            None
        }
    }

    /// Energy drawn today in Wh.
    pub fn power_usage_today_wh(&self) -> Option<i64> {
        self.rvs_charge_status.as_ref()?.power_usage_of_day
    }

    /// Odometer in km (raw is km × 10), zero and negatives suppressed.
    pub fn odometer_km(&self) -> Option<i64> {
        let raw = self.rvs_charge_status.as_ref()?.mileage?;
        if raw > 0 {
            Some(raw / 10)
        } else {
            None
        }
    }

    /// Displayed electric range in km; the cluster uses out-of-range
    /// values as sentinels.
    pub fn range_km(&self) -> Option<i32> {
        valid_range(self.chrg_mgmt_data.as_ref()?.clstr_elec_rng_to_ept)
    }

    /// BMS-estimated maximum range in km, same sentinel policy.
    pub fn estimated_max_range_km(&self) -> Option<i32> {
        valid_range(self.chrg_mgmt_data.as_ref()?.bms_estd_elec_rng)
    }

    /// Battery pre-heating requested by the BMS.
    pub fn is_battery_heating(&self) -> bool {
        self.chrg_mgmt_data
            .as_ref()
            .and_then(|d| d.bms_ptc_heat_req_dsp_cmd)
            .unwrap_or(0)
            == 1
    }

    /// Charging port lock engaged.
    pub fn is_port_locked(&self) -> bool {
        self.chrg_mgmt_data
            .as_ref()
            .and_then(|d| d.ccu_elecc_lck_ctrl_dsp_cmd)
            .unwrap_or(0)
            == 1
    }

    /// Scheduled charging mode, decoded.
    pub fn scheduled_charging_mode(&self) -> Option<ScheduledChargingMode> {
        let code = self.chrg_mgmt_data.as_ref()?.bms_reser_ctrl_dsp_cmd?;
        ScheduledChargingMode::from_code(code)
    }
}

fn valid_range(raw: Option<i32>) -> Option<i32> {
    match raw {
        Some(r) if r > 0 && r < 1000 => Some(r),
        _ => None,
    }
}

/// Decode the BMS charge-limit code into a percentage.
pub fn charge_limit_from_code(code: i32) -> Option<u8> {
    match code {
        1 => Some(40),
        2 => Some(50),
        3 => Some(60),
        4 => Some(70),
        5 => Some(80),
        6 => Some(90),
        7 => Some(100),
        _ => None,
    }
}

/// Encode a percentage into the BMS charge-limit code.
pub fn charge_limit_to_code(percent: u8) -> Option<i32> {
    match percent {
        40 => Some(1),
        50 => Some(2),
        60 => Some(3),
        70 => Some(4),
        80 => Some(5),
        90 => Some(6),
        100 => Some(7),
        _ => None,
    }
}

/// Scheduled charging mode as reported/commanded via the BMS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduledChargingMode {
    UntilConfiguredTime,
    Disabled,
    UntilConfiguredSoc,
}

impl ScheduledChargingMode {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Self::UntilConfiguredTime),
            2 => Some(Self::Disabled),
            3 => Some(Self::UntilConfiguredSoc),
            _ => None,
        }
    }

    pub fn code(self) -> i32 {
        match self {
            Self::UntilConfiguredTime => 1,
            Self::Disabled => 2,
            Self::UntilConfiguredSoc => 3,
        }
    }
}
