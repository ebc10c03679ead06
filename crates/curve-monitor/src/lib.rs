//! Yield curve inversion monitor: configuration, persisted state, the
//! per-pair check loop and report rendering.

pub mod config;
pub mod logging;
pub mod monitor;
pub mod render;
pub mod state_store;

pub use config::MonitorConfig;
pub use monitor::{CurveMonitor, PairOutcome, RunSummary, ScanReport};
pub use state_store::{JsonStateStore, StateDocument};
