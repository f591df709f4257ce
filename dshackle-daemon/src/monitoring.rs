//! Metrics registry bootstrap.
//!
//! [`init_metrics`] wires the Prometheus text exposition sub-registry and the
//! `dshackle.` naming filter into the shared [`MetricsRegistry`], then starts
//! the scrape endpoint when enabled.
//!
//! # Usage
//!
//! ```ignore
//! let registry = MetricsRegistry::new();
//! registry.install_global()?;
//! let setup = init_metrics(&registry, &config.monitoring.prometheus);
//! // After this, metrics::counter!("requests_total") is exported as dshackle_requests_total
//! ```

use std::net::SocketAddr;

use dshackle_core::config::PrometheusConfig;
use dshackle_core::metrics::{NAMESPACE, namespace_filter};
use dshackle_core::registry::MetricsRegistry;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::exporter;

/// Outcome of starting the scrape endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExporterState {
    /// Exporter turned off in config; no listener exists.
    Disabled,
    /// Listener bound and served from a background thread.
    Listening { local_addr: SocketAddr },
    /// Startup failed and was logged; the process runs without the endpoint.
    FailedToStart { reason: String },
}

impl ExporterState {
    /// Address the endpoint is served on, if any.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match self {
            ExporterState::Listening { local_addr } => Some(*local_addr),
            _ => None,
        }
    }
}

/// Where histogram buffers of the Prometheus sub-registry are drained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Upkeep {
    /// On the exporter thread, next to the scrape endpoint.
    Exporter,
    /// On a dedicated thread, because no exporter is running.
    Background,
    /// Nowhere: the upkeep thread could not be started (logged).
    Stopped,
}

/// Result of [`init_metrics`].
#[derive(Debug, Clone)]
pub struct MetricsSetup {
    /// Renders the Prometheus sub-registry on demand.
    pub handle: PrometheusHandle,
    /// State of the scrape endpoint.
    pub exporter: ExporterState,
    /// How histogram upkeep runs.
    pub upkeep: Upkeep,
}

/// Attach a Prometheus text exposition sub-registry to `registry`.
pub fn attach_prometheus(registry: &MetricsRegistry) -> PrometheusHandle {
    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();
    registry.add_registry(recorder);
    handle
}

/// Prefix every metric registered from now on with `dshackle.`.
pub fn install_naming_filter(registry: &MetricsRegistry) {
    registry.add_filter(namespace_filter(NAMESPACE));
}

/// Initialize metrics collection and, if enabled, the scrape endpoint.
///
/// Must be called exactly once, during startup, before anything records
/// metrics that should carry the namespace prefix. Calling it again attaches
/// a second sub-registry and a second filter.
///
/// Never fails: a scrape endpoint that cannot start is logged and reported
/// as [`ExporterState::FailedToStart`], while measurements keep accumulating
/// in the registry. Histogram buffers are drained periodically in every
/// exporter state, see [`Upkeep`].
pub fn init_metrics(registry: &MetricsRegistry, config: &PrometheusConfig) -> MetricsSetup {
    let handle = attach_prometheus(registry);
    install_naming_filter(registry);

    let exporter = start_exporter(&handle, config);
    let upkeep = match exporter {
        ExporterState::Listening { .. } => Upkeep::Exporter,
        _ => start_upkeep(&handle),
    };

    MetricsSetup {
        handle,
        exporter,
        upkeep,
    }
}

fn start_exporter(handle: &PrometheusHandle, config: &PrometheusConfig) -> ExporterState {
    if !config.enabled {
        tracing::debug!("Prometheus endpoint disabled");
        return ExporterState::Disabled;
    }

    tracing::info!(
        host = %config.host,
        port = config.port,
        path = %config.path,
        "Run Prometheus metrics on {}:{}{}",
        config.host,
        config.port,
        config.path
    );

    match exporter::spawn_exporter(handle.clone(), config) {
        Ok(local_addr) => ExporterState::Listening { local_addr },
        Err(e) => {
            tracing::error!(
                host = %config.host,
                port = config.port,
                error = %e,
                "Failed to start Prometheus server"
            );
            ExporterState::FailedToStart {
                reason: e.to_string(),
            }
        }
    }
}

fn start_upkeep(handle: &PrometheusHandle) -> Upkeep {
    match exporter::spawn_upkeep(handle.clone(), exporter::UPKEEP_INTERVAL) {
        Ok(()) => Upkeep::Background,
        Err(e) => {
            tracing::error!(error = %e, "failed to start metrics upkeep thread");
            Upkeep::Stopped
        }
    }
}
