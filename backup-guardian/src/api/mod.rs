//! HTTP display API.

pub mod backups;
pub mod error;
pub mod health;
pub mod ws;

use axum::{routing::get, Router};
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;

use crate::guardian::Guardian;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub guardian: Arc<Guardian>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(guardian: Arc<Guardian>) -> Self {
        Self {
            guardian,
            started_at: Instant::now(),
        }
    }
}

/// Create the API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health endpoints
        .route("/health", get(health::health))
        .route("/version", get(health::version))
        // Backup view endpoints
        .nest("/api", backups::router())
        // Live updates
        .route("/ws", get(ws::ws_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
