//! Prometheus metrics recorder and `/metrics` endpoint rendering.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the `PrometheusHandle` used to render the `/metrics` endpoint.
/// Must be called once at startup before any metrics are recorded.
pub fn install_recorder() -> PrometheusHandle {
    let builder = PrometheusBuilder::new();
    let handle = builder
        .install_recorder()
        .expect("failed to install metrics recorder");
    info!("prometheus metrics recorder installed");
    handle
}

/// Render Prometheus text format from the installed recorder.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

// Metric name constants to avoid typos across modules.
// All carry a `tenant` label.

/// Poll cycles run total (counter, labels: tenant).
pub const POLL_CYCLES_TOTAL: &str = "poll_cycles_total";
/// Ticks dropped while a cycle was in flight (counter, labels: tenant).
pub const POLL_TICKS_DROPPED_TOTAL: &str = "poll_ticks_dropped_total";
/// Cursor create failures (counter, labels: tenant).
pub const POLL_CURSOR_ERRORS_TOTAL: &str = "poll_cursor_errors_total";
/// Fetch failures (counter, labels: tenant).
pub const POLL_FETCH_ERRORS_TOTAL: &str = "poll_fetch_errors_total";
/// WebSocket connections opened total (counter, labels: tenant).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket disconnections total (counter, labels: tenant).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Active WebSocket sessions (gauge, labels: tenant).
pub const WS_SESSIONS_ACTIVE: &str = "ws_sessions_active";
/// Messages delivered to sessions (counter, labels: tenant).
pub const BROADCAST_MESSAGES_TOTAL: &str = "broadcast_messages_total";
/// Per-session delivery drops (counter, labels: tenant).
pub const BROADCAST_DROPS_TOTAL: &str = "broadcast_drops_total";
