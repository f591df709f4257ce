use anyhow::Result;
use clap::Parser;

use dshackle_core::config::DshackleConfig;
use dshackle_core::metrics::{BUILD_INFO, LABEL_VERSION, describe_all};
use dshackle_core::registry::MetricsRegistry;
use dshackle_daemon::cli::DaemonCli;
use dshackle_daemon::logging;
use dshackle_daemon::monitoring::{self, ExporterState};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    // file < env < CLI, validated once all layers are applied
    let mut config = DshackleConfig::from_file(&cli.config)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
    config.apply_env_overrides();
    cli.apply_overrides(&mut config);
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid config: {}", e))?;

    if cli.validate {
        println!("configuration is valid: {}", cli.config.display());
        return Ok(());
    }

    logging::init_tracing(&config.general)?;
    tracing::info!("dshackle-daemon starting");

    // metrics must be wired before anything records
    let registry = MetricsRegistry::new();
    registry.install_global()?;
    let setup = monitoring::init_metrics(&registry, &config.monitoring.prometheus);

    describe_all();
    metrics::gauge!(BUILD_INFO, LABEL_VERSION => env!("CARGO_PKG_VERSION")).set(1.0);

    match &setup.exporter {
        ExporterState::Listening { local_addr } => {
            tracing::info!(listen_addr = %local_addr, "Prometheus metrics endpoint active");
        }
        ExporterState::Disabled => tracing::info!("Prometheus metrics endpoint disabled"),
        ExporterState::FailedToStart { .. } => {
            tracing::warn!("running without Prometheus metrics endpoint");
        }
    }

    tracing::info!("dshackle-daemon running");
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");

    Ok(())
}
