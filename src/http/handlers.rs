//! HTTP handlers for the query API.

use axum::{
    Json,
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use chrono::Utc;

use super::dto::{HealthResponse, RefreshStatus, StatusResponse};
use super::error::AppError;
use super::state::AppState;
use crate::model::CategoryId;
use crate::refresh::RefreshHealth;
use crate::staleness;

// =============================================================================
// Health Check
// =============================================================================

/// GET /health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// =============================================================================
// Snapshot
// =============================================================================

/// GET /api/sensor-data
///
/// The full current snapshot, keyed by category. Before the first publish
/// every category maps to an empty array. Serialized straight from the
/// shared snapshot, without copying it.
pub async fn get_sensor_data(State(state): State<AppState>) -> Response {
    let published = state.store.current();
    Json(&published.snapshot).into_response()
}

/// GET /api/sensor-data/{category}
pub async fn get_category(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Result<Response, AppError> {
    let category = CategoryId::parse(&category)
        .ok_or_else(|| AppError::NotFound(format!("unknown category: {}", category)))?;
    let published = state.store.current();
    Ok(Json(published.snapshot.records(category)).into_response())
}

// =============================================================================
// Refresh status
// =============================================================================

/// GET /api/status
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let now = Utc::now();
    let published = state.store.current();
    let health = state.monitor.health();

    Json(StatusResponse {
        published_at: published.published_at,
        age_secs: staleness::age_secs_at(published.published_at, now),
        stale: staleness::is_stale_at(published.published_at, state.max_snapshot_age, now),
        max_snapshot_age_secs: state.max_snapshot_age.as_secs(),
        total_records: published.snapshot.total_records(),
        refresh: health.into(),
    })
}

impl From<RefreshHealth> for RefreshStatus {
    fn from(health: RefreshHealth) -> Self {
        Self {
            cycles: health.cycles,
            consecutive_failures: health.consecutive_failures,
            last_attempt: health.last_attempt,
            last_success: health.last_success,
            last_error: health.last_error,
            last_coverage: health.last_coverage,
        }
    }
}
