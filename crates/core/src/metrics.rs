//! Metric namespace, naming filter, and metric name constants.
//!
//! Every metric registered after [`namespace_filter`] is attached to the
//! [`MetricsRegistry`](crate::registry::MetricsRegistry) carries the
//! `dshackle.` prefix. Names below are therefore written without it.
//!
//! # Usage
//!
//! ```ignore
//! use dshackle_core::metrics::BUILD_INFO;
//!
//! metrics::gauge!(BUILD_INFO, "version" => env!("CARGO_PKG_VERSION")).set(1.0);
//! ```

use std::sync::Arc;

use metrics::Key;

use crate::registry::MeterFilter;

/// Namespace token prepended to every metric name.
pub const NAMESPACE: &str = "dshackle";

// --- label keys ---

/// Build version label key
pub const LABEL_VERSION: &str = "version";

// --- daemon metrics ---

/// Build information (gauge, always 1, label: version)
pub const BUILD_INFO: &str = "build_info";

/// Rewrite `key` to `<namespace>.<name>`, keeping its labels.
///
/// An empty name yields `"<namespace>."`.
pub fn rewrite(key: Key, namespace: &str) -> Key {
    let (name, labels) = key.into_parts();
    Key::from_parts(format!("{}.{}", namespace, name.as_str()), labels)
}

/// Build a stateless filter that applies [`rewrite`] with `namespace`.
pub fn namespace_filter(namespace: impl Into<String>) -> MeterFilter {
    let namespace = namespace.into();
    Arc::new(move |key| rewrite(key, &namespace))
}

/// Register HELP text for the daemon's own metrics.
///
/// Call after the naming filter is attached so descriptions line up with the
/// prefixed names.
pub fn describe_all() {
    metrics::describe_gauge!(
        BUILD_INFO,
        "Build information (always 1, with version label)"
    );
}
