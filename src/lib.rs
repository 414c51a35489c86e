// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! ismart-bridge: poll the MG iSmart vehicle API and mirror derived
//! state (charge, location, presence, sensors) into a Domoticz-style
//! device registry, while accepting remote control commands.
//!
//! The session token is persisted across restarts, encrypted under a key
//! derived from the account credentials.

pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use services::{SessionManager, SharedStatus};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub session: SessionManager,
    pub status: SharedStatus,
}
