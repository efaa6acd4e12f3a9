//! Prometheus metrics recorder and metric names.

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use tracing::info;

/// Install the global Prometheus recorder with an HTTP scrape listener.
///
/// Must be called inside a tokio runtime, once, before any metric is
/// recorded. Without it every counter below is a no-op.
pub fn install_exporter(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    info!(%addr, "prometheus exporter listening");
    Ok(())
}

// Metric name constants to avoid typos across modules.

/// Connections accepted (counter).
pub const CONNECTIONS_TOTAL: &str = "radiosim_connections_total";
/// Sessions torn down (counter, labels: reason).
pub const DISCONNECTIONS_TOTAL: &str = "radiosim_disconnections_total";
/// Live sessions (gauge).
pub const SESSIONS_ACTIVE: &str = "radiosim_sessions_active";
/// Session lifetime in seconds (histogram).
pub const SESSION_DURATION_SECONDS: &str = "radiosim_session_duration_seconds";
/// Inbound frames (counter, labels: kind).
pub const FRAMES_TOTAL: &str = "radiosim_frames_total";
/// Malformed tune frames dropped (counter).
pub const PROTOCOL_ERRORS_TOTAL: &str = "radiosim_protocol_errors_total";
/// Payloads written to peers (counter).
pub const RELAY_DELIVERIES_TOTAL: &str = "radiosim_relay_deliveries_total";
/// Peer writes that failed or timed out (counter).
pub const RELAY_DROPS_TOTAL: &str = "radiosim_relay_drops_total";
/// Failed `accept` calls (counter).
pub const ACCEPT_ERRORS_TOTAL: &str = "radiosim_accept_errors_total";
