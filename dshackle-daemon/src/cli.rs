//! CLI argument definitions for dshackle-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;
use dshackle_core::config::DshackleConfig;

/// Dshackle daemon.
///
/// Bootstraps the process-wide metrics registry and serves it to
/// Prometheus.
#[derive(Parser, Debug)]
#[command(name = "dshackle-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to dshackle.toml configuration file.
    #[arg(short, long, default_value = "/etc/dshackle/dshackle.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration file and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,
}

impl DaemonCli {
    /// Apply CLI overrides on top of file and env values.
    pub fn apply_overrides(&self, config: &mut DshackleConfig) {
        if let Some(level) = &self.log_level {
            config.general.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.general.log_format = format.clone();
        }
    }
}
