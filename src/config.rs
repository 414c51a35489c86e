//! Application configuration loaded from environment variables.
//!
//! Everything is read once at startup into an owned `Config` that gets
//! passed to each component. Missing credentials are fatal before the
//! polling loop ever starts.

use std::env;

/// Vehicle API region selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Europe,
    Australia,
}

impl Region {
    /// Default API gateway for the region.
    pub fn default_api_url(self) -> &'static str {
        match self {
            Region::Europe => "https://gateway-mg-eu.soimt.com/api.app/v1",
            Region::Australia => "https://gateway-mg-au.soimt.com/api.app/v1",
        }
    }
}

impl std::str::FromStr for Region {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "eu" | "europe" => Ok(Region::Europe),
            "au" | "australia" => Ok(Region::Australia),
            _ => Err(ConfigError::Invalid("ISMART_REGION")),
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// iSmart account email (key-derivation material, never persisted)
    pub email: String,
    /// iSmart account password (key-derivation material, never persisted)
    pub password: String,
    /// API region
    pub region: Region,
    /// Vehicle API base URL (defaults from region, overridable for tests)
    pub api_url: String,

    /// Device registry (Domoticz) base URL
    pub registry_url: String,
    /// Control API listen port
    pub port: u16,

    /// Home radius in meters for presence detection
    pub home_radius_m: f64,
    /// Optional home coordinates; when absent they are fetched from the
    /// registry's settings at startup
    pub home_location: Option<(f64, f64)>,

    /// Base poll interval in seconds (day regime)
    pub base_interval_secs: u64,
    /// Night cooldown interval in seconds
    pub cooldown_interval_secs: u64,
    /// Night window start hour (window starts at HH:30)
    pub night_start_hour: u32,
    /// Night window end hour (window ends at HH:30)
    pub night_end_hour: u32,

    /// How many sentinel indicators must match before a response is
    /// classified as deep sleep
    pub sleep_indicator_threshold: usize,

    /// Path of the persisted token file
    pub token_file: std::path::PathBuf,
    /// Log verbosity ("normal", "debug", "verbose")
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let region: Region = env::var("ISMART_REGION")
            .unwrap_or_else(|_| "eu".to_string())
            .parse()?;

        let home_location = match (env::var("HOME_LATITUDE"), env::var("HOME_LONGITUDE")) {
            (Ok(lat), Ok(lon)) => Some((
                lat.parse().map_err(|_| ConfigError::Invalid("HOME_LATITUDE"))?,
                lon.parse().map_err(|_| ConfigError::Invalid("HOME_LONGITUDE"))?,
            )),
            _ => None,
        };

        Ok(Self {
            email: env::var("ISMART_EMAIL")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("ISMART_EMAIL"))?,
            password: env::var("ISMART_PASSWORD")
                .map_err(|_| ConfigError::Missing("ISMART_PASSWORD"))?,
            region,
            api_url: env::var("ISMART_API_URL")
                .unwrap_or_else(|_| region.default_api_url().to_string()),

            registry_url: env::var("REGISTRY_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8080".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8970".to_string())
                .parse()
                .unwrap_or(8970),

            home_radius_m: parse_or("HOME_RADIUS_METERS", 25.0),
            home_location,

            base_interval_secs: parse_or("UPDATE_INTERVAL_SECS", 180),
            cooldown_interval_secs: parse_or("COOLDOWN_INTERVAL_SECS", 3600),
            night_start_hour: parse_or("NIGHT_START_HOUR", 22),
            night_end_hour: parse_or("NIGHT_END_HOUR", 6),

            sleep_indicator_threshold: parse_or("SLEEP_INDICATOR_THRESHOLD", 2),

            token_file: env::var("TOKEN_FILE")
                .unwrap_or_else(|_| "ismart_token.json".to_string())
                .into(),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "normal".to_string()),
        })
    }

    /// Default config for tests only.
    pub fn test_default() -> Self {
        Self {
            email: "driver@example.com".to_string(),
            password: "hunter2".to_string(),
            region: Region::Europe,
            api_url: "http://127.0.0.1:0".to_string(),
            registry_url: "http://127.0.0.1:0".to_string(),
            port: 8970,
            home_radius_m: 25.0,
            home_location: None,
            base_interval_secs: 180,
            cooldown_interval_secs: 3600,
            night_start_hour: 22,
            night_end_hour: 6,
            sleep_indicator_threshold: 2,
            token_file: "ismart_token.json".into(),
            log_level: "normal".to_string(),
        }
    }
}

fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
