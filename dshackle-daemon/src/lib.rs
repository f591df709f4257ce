//! Dshackle daemon library.
//!
//! Exposes internal modules for integration testing.
//! In production, `dshackle-daemon` is used as a binary (main.rs).

pub mod cli;
pub mod exporter;
pub mod logging;
pub mod monitoring;
