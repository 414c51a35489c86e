// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! ismart-bridge daemon
//!
//! Wires the session manager, polling loop, and local control API
//! together, and coordinates shutdown: signal the loop, drain in-flight
//! command requests, then join the loop with a bounded timeout.

use ismart_bridge::{
    config::Config,
    routes,
    services::{
        CryptoVault, GeocodingClient, PresenceDetector, RegistryClient, SaicClient,
        SchedulerConfig, SessionManager, TokenStore, UpdateOrchestrator,
    },
    AppState,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How long shutdown waits for the polling loop to finish its iteration.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration from environment
    let config = Config::from_env()?;
    init_logging(&config.log_level);
    tracing::info!(port = config.port, region = ?config.region, "Starting ismart-bridge");

    // Token persistence, encrypted under the account credentials
    let vault = CryptoVault::new();
    let token_store = TokenStore::new(config.token_file.clone(), vault);

    let saic = SaicClient::new(
        config.api_url.clone(),
        config.email.clone(),
        config.password.clone(),
    );
    let session = SessionManager::new(
        saic,
        token_store,
        config.email.clone(),
        config.password.clone(),
    );

    // Resume from a persisted token when possible so a restart doesn't
    // burn a login against the rate-limited remote service.
    if session.restore_from_disk().await {
        tracing::info!("Resumed session from stored token");
    }

    let registry = RegistryClient::new(config.registry_url.clone());
    let geocoder = GeocodingClient::default();

    let scheduler = SchedulerConfig::from_hours(
        config.base_interval_secs,
        config.cooldown_interval_secs,
        config.night_start_hour,
        config.night_end_hour,
    );
    let presence = PresenceDetector::new(config.home_location, config.home_radius_m);

    let status: ismart_bridge::services::SharedStatus = Arc::new(tokio::sync::RwLock::new(None));

    // Spawn the polling loop
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let orchestrator = UpdateOrchestrator::new(
        session.clone(),
        registry,
        geocoder,
        scheduler,
        presence,
        config.sleep_indicator_threshold,
        status.clone(),
    );
    let poller_handle = tokio::spawn(orchestrator.run(shutdown_rx.clone()));

    // Build shared state and router
    let state = Arc::new(AppState {
        config: config.clone(),
        session,
        status,
    });
    let app = routes::create_router(state);

    // Start the control API
    let addr = format!("127.0.0.1:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Control API listening");

    let mut signal_rx = shutdown_rx.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = signal_rx.changed() => {}
            }
        })
        .await?;

    // Stop the polling loop and wait for it, but never hang on exit.
    tracing::info!("Shutting down, stopping update loop");
    shutdown_tx.send(true).ok();
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, poller_handle)
        .await
        .is_err()
    {
        tracing::warn!("Update loop did not stop in time, exiting anyway");
    }

    tracing::info!("ismart-bridge stopped");
    Ok(())
}

/// Initialize logging; verbosity follows the configured level.
fn init_logging(level: &str) {
    let directive = match level.to_ascii_lowercase().as_str() {
        "debug" => "ismart_bridge=debug",
        "verbose" => "ismart_bridge=trace",
        _ => "ismart_bridge=info",
    };

    let format = tracing_subscriber::fmt::layer().with_target(false);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(directive.parse().expect("static directive parses"))
                .add_directive("info".parse().expect("static directive parses")),
        )
        .with(format)
        .init();
}
