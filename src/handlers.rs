//! HTTP endpoint handlers.
//!
//! This module provides the `/` landing page and the `/metrics` endpoint
//! that renders the registry in Prometheus text format.

use axum::{extract::State, http::StatusCode, response::Html, response::IntoResponse};
use prometheus::{Encoder, TextEncoder};
use tracing::{debug, error, instrument};

use crate::state::SharedState;

/// Error type for metrics endpoint failures.
#[derive(Debug)]
pub enum MetricsError {
    EncodingFailed,
}

impl IntoResponse for MetricsError {
    fn into_response(self) -> axum::response::Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to encode metrics",
        )
            .into_response()
    }
}

/// Handler for the /metrics endpoint.
#[instrument(skip(state))]
pub async fn metrics_handler(State(state): State<SharedState>) -> Result<String, MetricsError> {
    debug!("Processing /metrics request");

    let metric_families = state.registry.gather();
    let mut buffer = Vec::with_capacity(16 * 1024);
    let encoder = TextEncoder::new();

    encoder.encode(&metric_families, &mut buffer).map_err(|e| {
        error!("Failed to encode metrics: {}", e);
        MetricsError::EncodingFailed
    })?;

    String::from_utf8(buffer).map_err(|e| {
        error!("Metrics buffer is not valid UTF-8: {}", e);
        MetricsError::EncodingFailed
    })
}

/// Handler for the root `/` endpoint.
#[instrument(skip(state))]
pub async fn root_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing / request");

    let version = env!("CARGO_PKG_VERSION");

    let uptime_secs = state.start_time.elapsed().as_secs();
    let hours = uptime_secs / 3600;
    let minutes = (uptime_secs % 3600) / 60;
    let seconds = uptime_secs % 60;
    let uptime_str = format!("{}h {}m {}s", hours, minutes, seconds);

    let mode = if state.targets == 0 {
        "local machine".to_string()
    } else {
        format!("{} remote BMC(s)", state.targets)
    };
    let interval = state
        .config
        .interval_secs
        .unwrap_or(crate::config::DEFAULT_INTERVAL_SECS);

    let html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>IPMI Power Exporter</title>
    <style>
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            margin: 0;
            padding: 20px;
            background: #f5f5f5;
            line-height: 1.6;
        }}
        .container {{
            max-width: 700px;
            margin: 0 auto;
            background: white;
            padding: 40px;
            border-radius: 8px;
            box-shadow: 0 2px 8px rgba(0,0,0,0.1);
        }}
        h1 {{
            color: #333;
            border-bottom: 3px solid #007bff;
            padding-bottom: 15px;
        }}
        .info {{
            background: #e9ecef;
            padding: 15px;
            border-radius: 4px;
            margin: 20px 0;
        }}
        a {{
            color: #007bff;
            text-decoration: none;
            font-weight: 600;
        }}
    </style>
</head>
<body>
<div class="container">
    <h1>IPMI Power Exporter</h1>
    <p>BMC power-reading telemetry collected via ipmitool DCMI</p>

    <div class="info">
        <p>Version: {version}</p>
        <p>Uptime: {uptime}</p>
        <p>Polling: {mode} every {interval}s</p>
    </div>

    <p><a href="/metrics">/metrics</a> — Prometheus-compatible metrics endpoint</p>
</div>
</body>
</html>"#,
        version = version,
        uptime = uptime_str,
        mode = mode,
        interval = interval,
    );

    Html(html)
}
