//! Backup view endpoints.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::error::ApiError;
use super::AppState;
use crate::model::{AggregateView, BackupRecord, SourceFailure, SourceTag};
use crate::poller::{CycleOutcome, SharedView};

/// Label used when no backup exists anywhere.
pub const NO_BACKUPS: &str = "No backups";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/backups", get(list_backups))
        .route("/backups/summary", get(summary))
        .route("/backups/source/{tag}", get(by_source))
        .route("/refresh", post(refresh))
}

/// Sensor-style digest of the latest view.
#[derive(Debug, Serialize)]
pub struct BackupSummary {
    pub status: &'static str,
    pub last_backup: String,
    pub last_backup_attributes: Option<BackupRecord>,
    pub total_count: usize,
    pub total_size_mb: f64,
    pub per_source: BTreeMap<SourceTag, usize>,
    pub failures: Vec<SourceFailure>,
    pub refreshed_at: Option<String>,
}

impl BackupSummary {
    fn new(status: &'static str, view: &AggregateView, published: bool) -> Self {
        let last = view.most_recent();
        Self {
            status,
            last_backup: last
                .map(|r| r.created_at.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| NO_BACKUPS.to_string()),
            last_backup_attributes: last.cloned(),
            total_count: view.total_count,
            total_size_mb: view.total_size_megabytes,
            per_source: view.per_source.clone(),
            failures: view.failures.clone(),
            refreshed_at: published.then(|| view.refreshed_at.to_rfc3339()),
        }
    }
}

/// The latest view with its status, or an empty one before the first publish.
fn current(state: &AppState) -> (&'static str, SharedView, bool) {
    match state.guardian.latest_view() {
        Some(view) => {
            let status = if view.is_partial() { "partial" } else { "ok" };
            (status, view, true)
        }
        None => {
            let configured = state.guardian.poller().configured_sources();
            ("pending", Arc::new(AggregateView::empty(&configured)), false)
        }
    }
}

/// GET /api/backups
async fn list_backups(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let (status, view, _) = current(&state);
    let mut body = serde_json::to_value(view.as_ref()).map_err(anyhow::Error::from)?;
    body["status"] = json!(status);
    Ok(Json(body))
}

/// GET /api/backups/summary
async fn summary(State(state): State<AppState>) -> Json<BackupSummary> {
    let (status, view, published) = current(&state);
    Json(BackupSummary::new(status, &view, published))
}

/// GET /api/backups/source/{tag}
async fn by_source(
    State(state): State<AppState>,
    Path(tag): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let source = SourceTag::from_slug(&tag)
        .filter(|t| state.guardian.poller().configured_sources().contains(t))
        .ok_or_else(|| ApiError::NotFound(format!("Source not configured: {tag}")))?;

    let (status, view, _) = current(&state);
    let records: Vec<&BackupRecord> = view
        .records
        .iter()
        .filter(|r| r.source_tag == source)
        .collect();
    let failure = view.failures.iter().find(|f| f.source == source);

    Ok(Json(json!({
        "status": status,
        "source": source,
        "source_name": source.display_name(),
        "count": records.len(),
        "records": records,
        "failure": failure,
    })))
}

/// POST /api/refresh
async fn refresh(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let outcome = state.guardian.refresh().await;
    if outcome == CycleOutcome::Abandoned {
        return Err(ApiError::ServiceUnavailable("Guardian is shutting down".into()));
    }
    Ok(Json(json!({
        "outcome": outcome,
        "state": state.guardian.state(),
    })))
}
