//! Application state management for the exporter.
//!
//! This module defines the shared application state that is passed
//! to HTTP handlers.

use prometheus::Registry;
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

/// Global application state shared across requests.
pub struct AppState {
    pub registry: Registry,
    pub config: Arc<Config>,
    /// Number of configured remote targets (0 = local mode).
    pub targets: usize,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}
