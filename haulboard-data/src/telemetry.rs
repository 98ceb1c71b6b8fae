//! Tracing subscriber setup.
//!
//! Library code only emits `tracing` events. Binaries call [`init_tracing`]
//! once at startup to install a JSON (or compact text) formatter behind an
//! `EnvFilter`. `RUST_LOG` wins over the configured default filter.

use std::str::FromStr;

use thiserror::Error;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const SERVICE_NAME_ENV: &str = "HAULBOARD_SERVICE_NAME";
pub const LOG_FORMAT_ENV: &str = "HAULBOARD_LOG_FORMAT";
pub const LOG_FILTER_ENV: &str = "HAULBOARD_LOG_FILTER";

const DEFAULT_FILTER: &str = "haulboard_data=info,haulboard_storage=info,warn";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TelemetryError {
    #[error("Unknown log format: {value} (expected json or text)")]
    UnknownFormat { value: String },

    #[error("Invalid log filter {filter}: {reason}")]
    InvalidFilter { filter: String, reason: String },

    #[error("Failed to init subscriber: {0}")]
    Init(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event.
    Json,
    /// Single-line human-readable output.
    Text,
}

impl FromStr for LogFormat {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "text" | "compact" | "pretty" => Ok(Self::Text),
            _ => Err(TelemetryError::UnknownFormat {
                value: s.to_string(),
            }),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub log_format: LogFormat,
    /// Directive used when `RUST_LOG` is unset.
    pub default_filter: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "haulboard".to_string(),
            log_format: LogFormat::Json,
            default_filter: DEFAULT_FILTER.to_string(),
        }
    }
}

impl TelemetryConfig {
    /// Defaults overridden by `HAULBOARD_SERVICE_NAME`, `HAULBOARD_LOG_FORMAT`
    /// and `HAULBOARD_LOG_FILTER`.
    pub fn from_env() -> Result<Self, TelemetryError> {
        let mut config = Self::default();
        if let Ok(name) = std::env::var(SERVICE_NAME_ENV) {
            if !name.trim().is_empty() {
                config.service_name = name;
            }
        }
        if let Ok(format) = std::env::var(LOG_FORMAT_ENV) {
            config.log_format = format.parse()?;
        }
        if let Ok(filter) = std::env::var(LOG_FILTER_ENV) {
            config.default_filter = filter;
        }
        Ok(config)
    }

    fn env_filter(&self) -> Result<EnvFilter, TelemetryError> {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => EnvFilter::try_new(&self.default_filter).map_err(|e| {
                TelemetryError::InvalidFilter {
                    filter: self.default_filter.clone(),
                    reason: e.to_string(),
                }
            }),
        }
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_tracing(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let env_filter = config.env_filter()?;
    let registry = tracing_subscriber::registry().with(env_filter);
    let installed = match config.log_format {
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
        LogFormat::Text => registry.with(fmt::layer().compact()).try_init(),
    };
    installed.map_err(|e| TelemetryError::Init(e.to_string()))?;

    tracing::info!(
        service_name = config.service_name.as_str(),
        log_format = ?config.log_format,
        "Telemetry initialized"
    );
    Ok(())
}
