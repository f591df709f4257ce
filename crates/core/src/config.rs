//! Configuration: `dshackle.toml` parsing and runtime settings.
//!
//! [`DshackleConfig`] is the top-level structure holding every section.
//!
//! # Loading precedence
//! 1. CLI arguments (highest)
//! 2. Environment variables (`DSHACKLE_MONITORING_PROMETHEUS_PORT=9090` style)
//! 3. Config file (`dshackle.toml`)
//! 4. Defaults (`Default` impls)
//!
//! # Example
//! ```no_run
//! # async fn example() -> Result<(), dshackle_core::error::DshackleError> {
//! use dshackle_core::config::DshackleConfig;
//!
//! // load from file, then apply env overrides
//! let config = DshackleConfig::load("dshackle.toml").await?;
//!
//! // parse a TOML string directly
//! let config = DshackleConfig::parse("[monitoring.prometheus]\nport = 9090")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, DshackleError};

/// Top-level Dshackle configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DshackleConfig {
    /// General settings
    #[serde(default)]
    pub general: GeneralConfig,
    /// Monitoring settings
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

impl DshackleConfig {
    /// Load config from a TOML file, apply env overrides, and validate.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, DshackleError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load config from a TOML file without env overrides.
    ///
    /// Not validated: callers apply their overrides first, then call
    /// [`validate`](Self::validate).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, DshackleError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DshackleError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                DshackleError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// Parse config from a TOML string.
    pub fn parse(toml_str: &str) -> Result<Self, DshackleError> {
        toml::from_str(toml_str).map_err(|e| {
            DshackleError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// Override values from environment variables.
    ///
    /// Naming: `DSHACKLE_{SECTION}_{FIELD}`, e.g. `DSHACKLE_GENERAL_LOG_LEVEL=debug`.
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "DSHACKLE_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "DSHACKLE_GENERAL_LOG_FORMAT");

        // Prometheus
        let prometheus = &mut self.monitoring.prometheus;
        override_bool(
            &mut prometheus.enabled,
            "DSHACKLE_MONITORING_PROMETHEUS_ENABLED",
        );
        override_string(&mut prometheus.host, "DSHACKLE_MONITORING_PROMETHEUS_HOST");
        override_u16(&mut prometheus.port, "DSHACKLE_MONITORING_PROMETHEUS_PORT");
        override_string(&mut prometheus.path, "DSHACKLE_MONITORING_PROMETHEUS_PATH");
    }

    /// Validate config values.
    pub fn validate(&self) -> Result<(), DshackleError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        self.monitoring.prometheus.validate()
    }
}

/// General settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log format (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// Monitoring settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Prometheus scrape endpoint
    pub prometheus: PrometheusConfig,
}

/// Prometheus scrape endpoint settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrometheusConfig {
    /// Start the HTTP exporter
    pub enabled: bool,
    /// Bind host (IP or hostname)
    pub host: String,
    /// Bind port
    pub port: u16,
    /// Endpoint path
    pub path: String,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_owned(),
            port: 8081,
            path: "/metrics".to_owned(),
        }
    }
}

impl PrometheusConfig {
    /// Validate exporter settings. Skipped when the exporter is disabled.
    pub fn validate(&self) -> Result<(), DshackleError> {
        if !self.enabled {
            return Ok(());
        }

        if self.host.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "monitoring.prometheus.host".to_owned(),
                reason: "host must not be empty when prometheus is enabled".to_owned(),
            }
            .into());
        }

        if self.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "monitoring.prometheus.port".to_owned(),
                reason: "port must be between 1 and 65535".to_owned(),
            }
            .into());
        }

        if !self.path.starts_with('/') {
            return Err(ConfigError::InvalidValue {
                field: "monitoring.prometheus.path".to_owned(),
                reason: "path must start with '/'".to_owned(),
            }
            .into());
        }

        Ok(())
    }
}

// --- env override helpers ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u16 from env var, ignoring"
            ),
        }
    }
}
