// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod charging;
pub mod geocode;
pub mod poller;
pub mod presence;
pub mod registry;
pub mod saic;
pub mod scheduler;
pub mod session;
pub mod token_store;
pub mod vault;

pub use charging::{ChargeEvent, ChargeSessionTracker};
pub use geocode::GeocodingClient;
pub use poller::{SharedStatus, SleepDetector, StatusSnapshot, UpdateOrchestrator};
pub use presence::PresenceDetector;
pub use registry::RegistryClient;
pub use saic::SaicClient;
pub use scheduler::SchedulerConfig;
pub use session::SessionManager;
pub use token_store::TokenStore;
pub use vault::CryptoVault;
