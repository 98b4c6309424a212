//! Prometheus metrics recorder and `/metrics` endpoint handler.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the `PrometheusHandle` used to render the `/metrics` endpoint.
/// Must be called once at server startup before any metrics are recorded.
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

// Metric name constants to avoid typos across crates.

/// WebSocket connections opened total (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket disconnections total (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Active WebSocket connections (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Authentication failures total (counter).
pub const WS_AUTH_FAILURES_TOTAL: &str = "ws_auth_failures_total";
/// Authentication deadline expiries total (counter).
pub const WS_AUTH_TIMEOUTS_TOTAL: &str = "ws_auth_timeouts_total";
/// Broadcast frames dropped on closed outbound channels (counter).
pub const WS_BROADCAST_DROPS_TOTAL: &str = "ws_broadcast_drops_total";
/// Active sessions (gauge).
pub const SESSIONS_ACTIVE: &str = "sessions_active";
/// Session joins total (counter).
pub const SESSION_JOINS_TOTAL: &str = "session_joins_total";
/// Broadcasts fanned out total (counter, labels: event_type).
pub const BROADCASTS_TOTAL: &str = "broadcasts_total";
/// Broadcast recipients total (counter, labels: event_type).
pub const BROADCAST_RECIPIENTS_TOTAL: &str = "broadcast_recipients_total";
/// Tool calls dispatched total (counter, labels: tool).
pub const TOOL_CALLS_TOTAL: &str = "tool_calls_total";
/// Chat messages relayed total (counter).
pub const CHAT_MESSAGES_TOTAL: &str = "chat_messages_total";
