//! Health check endpoints.

use axum::extract::State;
use axum::{response::IntoResponse, Json};
use serde_json::json;

use super::AppState;

/// GET /health - Health check endpoint
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let guardian = &state.guardian;
    let view = guardian.latest_view();

    Json(json!({
        "status": if guardian.is_shut_down() { "stopping" } else { "ok" },
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.started_at.elapsed().as_secs(),
        "poller": guardian.state(),
        "interval_secs": guardian.poller().interval().as_secs(),
        "last_refresh": view.as_ref().map(|v| v.refreshed_at.to_rfc3339()),
        "sources": guardian.poller().configured_sources(),
    }))
}

/// GET /version - Version information endpoint
pub async fn version() -> impl IntoResponse {
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "sources": ["local", "cloud-drive"],
    }))
}
