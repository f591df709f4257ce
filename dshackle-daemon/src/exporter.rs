//! Prometheus scrape endpoint.
//!
//! The listener is bound synchronously so bind failures surface to the caller.
//! Serving then moves to one dedicated OS thread running a current-thread
//! tokio runtime; that thread lives until the process exits and is never
//! joined.
//!
//! Every request whose path starts with the configured path, whatever the
//! method, gets a fresh rendering of the Prometheus sub-registry. The path is
//! compared as plain text, never parsed as a route pattern.

use std::io;
use std::net::{SocketAddr, TcpListener};
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use dshackle_core::config::PrometheusConfig;
use dshackle_core::error::MonitoringError;
use metrics_exporter_prometheus::PrometheusHandle;

const EXPORTER_THREAD_NAME: &str = "prometheus-exporter";
const UPKEEP_THREAD_NAME: &str = "prometheus-upkeep";

/// Text exposition format, version 0.0.4
const TEXT_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// How often histogram buffers are drained
pub const UPKEEP_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Clone)]
struct ScrapeState {
    handle: PrometheusHandle,
    path: Arc<str>,
}

/// Bind `host:port` and start serving `handle` on `path` in the background.
///
/// Returns the bound address once the exporter thread is ready to accept.
///
/// # Errors
///
/// - `path` does not start with `/`
/// - Socket binding fails (address in use, unresolvable host, ...)
/// - The exporter thread or its runtime cannot be started
pub fn spawn_exporter(
    handle: PrometheusHandle,
    config: &PrometheusConfig,
) -> Result<SocketAddr, MonitoringError> {
    if !config.path.starts_with('/') {
        return Err(MonitoringError::InvalidPath(config.path.clone()));
    }

    let listener = bind(&config.host, config.port)?;
    let local_addr = listener
        .local_addr()
        .map_err(|source| MonitoringError::Bind {
            addr: format!("{}:{}", config.host, config.port),
            source,
        })?;

    let router = router(handle.clone(), &config.path);
    let (ready_tx, ready_rx) = mpsc::sync_channel(1);

    thread::Builder::new()
        .name(EXPORTER_THREAD_NAME.to_owned())
        .spawn(move || serve(listener, router, handle, ready_tx))
        .map_err(MonitoringError::Spawn)?;

    match ready_rx.recv() {
        Ok(Ok(())) => Ok(local_addr),
        Ok(Err(e)) => Err(MonitoringError::Spawn(e)),
        Err(_) => Err(MonitoringError::Spawn(io::Error::other(
            "exporter thread exited before startup",
        ))),
    }
}

fn bind(host: &str, port: u16) -> Result<TcpListener, MonitoringError> {
    let listener = TcpListener::bind((host, port)).and_then(|listener| {
        listener.set_nonblocking(true)?;
        Ok(listener)
    });

    listener.map_err(|source| MonitoringError::Bind {
        addr: format!("{}:{}", host, port),
        source,
    })
}

fn router(handle: PrometheusHandle, path: &str) -> Router {
    Router::new().fallback(scrape).with_state(ScrapeState {
        handle,
        path: Arc::from(path),
    })
}

async fn scrape(State(state): State<ScrapeState>, uri: Uri) -> Response {
    if !uri.path().starts_with(&*state.path) {
        return StatusCode::NOT_FOUND.into_response();
    }

    let body = state.handle.render();
    tracing::debug!(path = uri.path(), bytes = body.len(), "serving metrics scrape");

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, TEXT_CONTENT_TYPE.to_owned()),
            (header::CONTENT_LENGTH, body.len().to_string()),
        ],
        body,
    )
        .into_response()
}

/// Drain histogram buffers of `handle` every `interval` on a background
/// thread. Used when no exporter thread is running to do it.
pub fn spawn_upkeep(handle: PrometheusHandle, interval: Duration) -> io::Result<()> {
    spawn_periodic(UPKEEP_THREAD_NAME, interval, move || handle.run_upkeep())
}

fn spawn_periodic<F>(name: &str, interval: Duration, mut task: F) -> io::Result<()>
where
    F: FnMut() + Send + 'static,
{
    thread::Builder::new()
        .name(name.to_owned())
        .spawn(move || {
            loop {
                thread::sleep(interval);
                task();
            }
        })
        .map(|_| ())
}

fn serve(
    listener: TcpListener,
    router: Router,
    handle: PrometheusHandle,
    ready_tx: mpsc::SyncSender<io::Result<()>>,
) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    runtime.block_on(async move {
        let listener = match tokio::net::TcpListener::from_std(listener) {
            Ok(listener) => listener,
            Err(e) => {
                let _ = ready_tx.send(Err(e));
                return;
            }
        };

        tokio::spawn(run_upkeep(handle));
        let _ = ready_tx.send(Ok(()));

        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!(error = %e, "Prometheus server stopped");
        }
    });
}

async fn run_upkeep(handle: PrometheusHandle) {
    let mut interval = tokio::time::interval(UPKEEP_INTERVAL);
    loop {
        interval.tick().await;
        handle.run_upkeep();
    }
}
