//! Health handler

use std::sync::Arc;

use axum::{extract::State, Json};

use crate::AppState;
use tally_core::HealthStatus;

/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthStatus> {
    Json(state.engine.health().await)
}
