//! Error types, grouped by domain.

/// Top-level Dshackle error.
#[derive(Debug, thiserror::Error)]
pub enum DshackleError {
    /// Configuration errors
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// I/O errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file does not exist
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// Config could not be parsed
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// A config value is out of range or malformed
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Metrics registry and exporter errors
#[derive(Debug, thiserror::Error)]
pub enum MonitoringError {
    /// Listener could not be bound
    #[error("failed to bind metrics listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Endpoint path is not routable
    #[error("invalid metrics endpoint path '{0}': must start with '/'")]
    InvalidPath(String),

    /// Exporter thread could not be started
    #[error("failed to spawn metrics exporter thread: {0}")]
    Spawn(std::io::Error),

    /// A global `metrics` recorder is already set for this process
    #[error("a global metrics recorder is already installed")]
    RecorderAlreadyInstalled,
}
