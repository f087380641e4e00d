//! Alert handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};

use crate::{AppError, AppState};
use tally_core::{Alert, AlertThresholds, ThresholdsUpdate};

/// GET /api/alerts - Active alerts, most severe first
pub async fn list_alerts(State(state): State<Arc<AppState>>) -> Json<Vec<Alert>> {
    Json(state.engine.active_alerts())
}

/// GET /api/alerts/history - Retained alerts, newest first
pub async fn alert_history(State(state): State<Arc<AppState>>) -> Json<Vec<Alert>> {
    Json(state.engine.alert_history())
}

/// POST /api/alerts/:id/resolve - Resolve an alert by hand
pub async fn resolve_alert(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Alert>, AppError> {
    Ok(Json(state.engine.resolve_alert(&id)?))
}

/// GET /api/alerts/thresholds
pub async fn get_thresholds(State(state): State<Arc<AppState>>) -> Json<AlertThresholds> {
    Json(state.engine.thresholds())
}

/// PUT /api/alerts/thresholds - Partial update; unknown keys are rejected
pub async fn update_thresholds(
    State(state): State<Arc<AppState>>,
    Json(update): Json<ThresholdsUpdate>,
) -> Result<Json<AlertThresholds>, AppError> {
    if update.is_empty() {
        return Err(AppError::bad_request("no thresholds given"));
    }
    Ok(Json(state.engine.update_thresholds(&update)?))
}
