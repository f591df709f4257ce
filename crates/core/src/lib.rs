#![doc = include_str!("../README.md")]

pub mod config;
pub mod error;
pub mod metrics;
pub mod registry;

pub use config::{DshackleConfig, GeneralConfig, MonitoringConfig, PrometheusConfig};
pub use crate::metrics::{NAMESPACE, namespace_filter, rewrite};
pub use error::{ConfigError, DshackleError, MonitoringError};
pub use registry::{MeterFilter, MetricsRegistry};
