//! Configuration types
//!
//! Every section has defaults matching the dashboard's historical behavior;
//! only the backend URL and key must be supplied.

use crate::{ConfigError, HaulResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Hosted backend connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackendConfig {
    /// Base URL of the hosted service, e.g. `https://xyz.supabase.co`.
    pub url: String,
    /// Anonymous (public) API key.
    pub api_key: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

/// Schema probing policy at call sites.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaProbeConfig {
    /// Catalog schema the probed tables live in.
    #[serde(default = "default_schema_name")]
    pub schema_name: String,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

/// TTLs for the read-through cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheTtlConfig {
    #[serde(default = "default_operators_ttl_ms")]
    pub operators_ttl_ms: u64,
}

/// Dashboard aggregation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VolumeConfig {
    #[serde(default = "default_window_days")]
    pub window_days: u32,
    #[serde(default = "default_history_limit")]
    pub history_limit: u32,
    /// Offset used to derive calendar days from trip timestamps.
    /// `None` uses the host's local offset.
    #[serde(default)]
    pub utc_offset_minutes: Option<i32>,
}

/// Master configuration struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HaulboardConfig {
    pub backend: BackendConfig,
    #[serde(default)]
    pub schema: SchemaProbeConfig,
    #[serde(default)]
    pub cache: CacheTtlConfig,
    #[serde(default)]
    pub volume: VolumeConfig,
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_schema_name() -> String {
    "public".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1_000
}

fn default_operators_ttl_ms() -> u64 {
    60_000
}

fn default_window_days() -> u32 {
    7
}

fn default_history_limit() -> u32 {
    3
}

impl Default for SchemaProbeConfig {
    fn default() -> Self {
        Self {
            schema_name: default_schema_name(),
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl SchemaProbeConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for CacheTtlConfig {
    fn default() -> Self {
        Self {
            operators_ttl_ms: default_operators_ttl_ms(),
        }
    }
}

impl CacheTtlConfig {
    pub fn operators_ttl(&self) -> Duration {
        Duration::from_millis(self.operators_ttl_ms)
    }
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            window_days: default_window_days(),
            history_limit: default_history_limit(),
            utc_offset_minutes: None,
        }
    }
}

impl BackendConfig {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl HaulboardConfig {
    /// Build a config with default policies around the given backend.
    pub fn with_backend(backend: BackendConfig) -> Self {
        Self {
            backend,
            schema: SchemaProbeConfig::default(),
            cache: CacheTtlConfig::default(),
            volume: VolumeConfig::default(),
        }
    }

    /// Load from process environment variables.
    ///
    /// `SUPABASE_URL` and `SUPABASE_ANON_KEY` are required; the
    /// `HAULBOARD_*` variables override individual defaults.
    pub fn from_env() -> HaulResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup (environment-shaped).
    pub fn from_lookup<F>(lookup: F) -> HaulResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup("SUPABASE_URL").ok_or_else(|| ConfigError::MissingRequired {
            field: "SUPABASE_URL".to_string(),
        })?;
        let api_key = lookup("SUPABASE_ANON_KEY").ok_or_else(|| ConfigError::MissingRequired {
            field: "SUPABASE_ANON_KEY".to_string(),
        })?;

        let mut config = Self::with_backend(BackendConfig::new(url, api_key));
        if let Some(value) = lookup("HAULBOARD_REQUEST_TIMEOUT_MS") {
            config.backend.request_timeout_ms = parse_number("HAULBOARD_REQUEST_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = lookup("HAULBOARD_SCHEMA") {
            config.schema.schema_name = value;
        }
        if let Some(value) = lookup("HAULBOARD_PROBE_ATTEMPTS") {
            config.schema.max_attempts = parse_number("HAULBOARD_PROBE_ATTEMPTS", &value)?;
        }
        if let Some(value) = lookup("HAULBOARD_PROBE_DELAY_MS") {
            config.schema.retry_delay_ms = parse_number("HAULBOARD_PROBE_DELAY_MS", &value)?;
        }
        if let Some(value) = lookup("HAULBOARD_OPERATORS_TTL_MS") {
            config.cache.operators_ttl_ms = parse_number("HAULBOARD_OPERATORS_TTL_MS", &value)?;
        }
        if let Some(value) = lookup("HAULBOARD_VOLUME_DAYS") {
            config.volume.window_days = parse_number("HAULBOARD_VOLUME_DAYS", &value)?;
        }
        if let Some(value) = lookup("HAULBOARD_UTC_OFFSET_MINUTES") {
            config.volume.utc_offset_minutes =
                Some(parse_number("HAULBOARD_UTC_OFFSET_MINUTES", &value)?);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file.
    pub fn from_path(path: &Path) -> HaulResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let config = Self::from_toml_str(&contents)?;
        Ok(config)
    }

    /// Parse and validate TOML contents.
    pub fn from_toml_str(contents: &str) -> HaulResult<Self> {
        let config: HaulboardConfig = toml::from_str(contents).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend.url.trim().is_empty() {
            return Err(invalid("backend.url", &self.backend.url, "must not be empty"));
        }
        if !self.backend.url.starts_with("http://") && !self.backend.url.starts_with("https://") {
            return Err(invalid("backend.url", &self.backend.url, "must be an http(s) URL"));
        }
        if self.backend.api_key.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "backend.api_key".to_string(),
            });
        }
        if self.backend.request_timeout_ms == 0 {
            return Err(invalid("backend.request_timeout_ms", "0", "must be > 0"));
        }
        if self.schema.schema_name.trim().is_empty() {
            return Err(invalid("schema.schema_name", "", "must not be empty"));
        }
        if self.schema.max_attempts == 0 {
            return Err(invalid("schema.max_attempts", "0", "must be >= 1"));
        }
        if self.volume.window_days == 0 {
            return Err(invalid("volume.window_days", "0", "must be >= 1"));
        }
        if let Some(offset) = self.volume.utc_offset_minutes {
            if offset.abs() >= 24 * 60 {
                return Err(invalid(
                    "volume.utc_offset_minutes",
                    &offset.to_string(),
                    "must be within one day",
                ));
            }
        }
        Ok(())
    }
}

fn invalid(field: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_number<T: std::str::FromStr>(field: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(field, value, "must be a number"))
}
