//! HTTP surface: shared state, routes, and the serve loop.
//!
//! One listener carries everything: the `/ws` WebSocket upgrade plus the
//! `/health`, `/status`, and `/metrics` probes.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use huddle_llm::AiProxy;
use huddle_settings::HuddleSettings;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::auth::Authenticator;
use crate::gateway;
use crate::hub::Hub;
use crate::router::MessageRouter;

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Connection registry, session membership, and broadcast engine.
    pub hub: Arc<Hub>,
    /// Credential verifier.
    pub authenticator: Arc<Authenticator>,
    /// Envelope dispatcher for authenticated connections.
    pub router: Arc<MessageRouter>,
    /// How long an accepted connection may stay unauthenticated.
    pub auth_deadline: Duration,
    /// Prometheus render handle backing `/metrics`.
    pub metrics: PrometheusHandle,
}

impl AppState {
    /// Assemble application state from settings and shared services.
    #[must_use]
    pub fn new(
        settings: &HuddleSettings,
        secret: &str,
        hub: Arc<Hub>,
        ai: Arc<AiProxy>,
        metrics: PrometheusHandle,
    ) -> Self {
        Self {
            authenticator: Arc::new(Authenticator::new(secret)),
            router: Arc::new(MessageRouter::new(Arc::clone(&hub), ai)),
            auth_deadline: Duration::from_millis(settings.server.auth_deadline_ms),
            hub,
            metrics,
        }
    }
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(gateway::ws_handler))
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the app on `listener` until the shutdown future resolves.
///
/// # Errors
///
/// Returns the I/O error that stopped the accept loop.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let app = build_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

/// Liveness probe.
async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok", "service": "huddle" }))
}

/// Connection and session counts.
async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let active_sessions = state.hub.session_count().await;
    Json(json!({
        "connections": state.hub.connection_count(),
        "activeSessions": active_sessions,
    }))
}

/// Prometheus text exposition.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    crate::metrics::render(&state.metrics)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
