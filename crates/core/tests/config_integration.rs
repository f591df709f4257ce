//! dshackle.toml integration tests
//!
//! - dshackle.toml.example parsing
//! - loading from disk
//! - env var precedence over the file

use std::io::Write;

use dshackle_core::config::DshackleConfig;
use dshackle_core::error::{ConfigError, DshackleError};
use serial_test::serial;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("should create temp file");
    file.write_all(content.as_bytes())
        .expect("should write config");
    file
}

#[test]
fn example_config_parses_successfully() {
    let content = include_str!("../../../dshackle.toml.example");
    let config = DshackleConfig::parse(content).expect("example config should parse");

    assert_eq!(config.general.log_level, "info");
    assert_eq!(config.general.log_format, "json");
}

#[test]
fn example_config_matches_defaults() {
    let content = include_str!("../../../dshackle.toml.example");
    let config = DshackleConfig::parse(content).expect("should parse");

    assert_eq!(
        config.monitoring.prometheus,
        DshackleConfig::default().monitoring.prometheus
    );
    config
        .validate()
        .expect("example config should pass validation");
}

#[tokio::test]
#[serial]
async fn load_reads_file_from_disk() {
    let file = write_config(
        r#"
[monitoring.prometheus]
host = "0.0.0.0"
port = 19091
"#,
    );

    let config = DshackleConfig::load(file.path())
        .await
        .expect("should load");

    assert_eq!(config.monitoring.prometheus.host, "0.0.0.0");
    assert_eq!(config.monitoring.prometheus.port, 19091);
    assert_eq!(config.monitoring.prometheus.path, "/metrics");
}

#[tokio::test]
#[serial]
async fn env_var_takes_precedence_over_file() {
    let file = write_config("[monitoring.prometheus]\nport = 19091\n");

    // SAFETY: serialized with every other env-mutating test.
    unsafe { std::env::set_var("DSHACKLE_MONITORING_PROMETHEUS_PORT", "19092") };
    let result = DshackleConfig::load(file.path()).await;
    unsafe { std::env::remove_var("DSHACKLE_MONITORING_PROMETHEUS_PORT") };

    let config = result.expect("should load");
    assert_eq!(config.monitoring.prometheus.port, 19092);
}

#[tokio::test]
#[serial]
async fn env_var_can_fix_invalid_file_value() {
    let file = write_config("[general]\nlog_level = \"verbose\"\n");

    // SAFETY: serialized with every other env-mutating test.
    unsafe { std::env::set_var("DSHACKLE_GENERAL_LOG_LEVEL", "debug") };
    let result = DshackleConfig::load(file.path()).await;
    unsafe { std::env::remove_var("DSHACKLE_GENERAL_LOG_LEVEL") };

    let config = result.expect("env override should win before validation");
    assert_eq!(config.general.log_level, "debug");
}

#[tokio::test]
#[serial]
async fn load_rejects_invalid_values() {
    let file = write_config("[monitoring.prometheus]\npath = \"metrics\"\n");

    let err = DshackleConfig::load(file.path()).await.unwrap_err();

    assert!(matches!(
        err,
        DshackleError::Config(ConfigError::InvalidValue { .. })
    ));
}

#[tokio::test]
async fn load_missing_file_reports_path() {
    let err = DshackleConfig::load("/nonexistent/dshackle.toml")
        .await
        .unwrap_err();

    assert!(err.to_string().contains("/nonexistent/dshackle.toml"));
}
