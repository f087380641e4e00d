//! Metrics and monitoring handlers

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use crate::{AppError, AppState};
use tally_core::{CheckOutcome, PerformanceReport, ReportPeriod};

/// Prometheus text exposition content type
const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub period: Option<String>,
}

/// GET /api/metrics/report?period=hour|day|week|month
pub async fn performance_report(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ReportQuery>,
) -> Result<Json<PerformanceReport>, AppError> {
    let period = match params.period.as_deref() {
        Some(raw) => raw
            .parse::<ReportPeriod>()
            .map_err(|e| AppError::bad_request(&e))?,
        None => ReportPeriod::default(),
    };
    Ok(Json(state.engine.performance_report(period)))
}

/// GET /metrics - Prometheus scrape endpoint
pub async fn prometheus(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)],
        state.engine.prometheus(),
    )
}

/// POST /api/monitor/check - Run one monitoring pass now
pub async fn run_check(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CheckOutcome>, AppError> {
    Ok(Json(state.engine.run_check().await?))
}
