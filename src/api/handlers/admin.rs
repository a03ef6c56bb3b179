use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

use crate::api::response::ApiError;
use crate::workflow::{ReconcileReport, RepairStats};
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct ReconcileResponse {
    pub consistent: bool,
    #[serde(flatten)]
    pub report: ReconcileReport,
}

#[derive(Debug, Serialize)]
pub struct RepairResponse {
    pub report: ReconcileReport,
    pub stats: RepairStats,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Route: GET /_internal/reconcile
pub async fn reconcile_report(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ReconcileResponse>, ApiError> {
    let report = state
        .workflow
        .reconcile()
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;

    Ok(Json(ReconcileResponse {
        consistent: report.is_consistent(),
        report,
    }))
}

/// Route: POST /_internal/reconcile
pub async fn reconcile_repair(
    State(state): State<Arc<AppState>>,
) -> Result<Json<RepairResponse>, ApiError> {
    let report = state
        .workflow
        .reconcile()
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;

    let stats = state
        .workflow
        .repair(&report, state.config.orphan_grace(), Utc::now())
        .await;

    tracing::warn!(
        orphans_deleted = stats.orphans_deleted,
        orphans_skipped = stats.orphans_skipped,
        dangling_removed = stats.dangling_removed,
        failures = stats.failures,
        "Repair pass finished"
    );

    Ok(Json(RepairResponse { report, stats }))
}
