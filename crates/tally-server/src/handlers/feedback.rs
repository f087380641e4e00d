//! Feedback handlers

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Deserialize;

use crate::{AppError, AppState};
use tally_core::{BulkFeedbackOutcome, FeedbackReceipt, FeedbackRecord};

/// Largest bulk feedback request
pub const MAX_BULK_FEEDBACK: usize = 500;

/// POST /api/feedback - Submit one correction
pub async fn submit_feedback(
    State(state): State<Arc<AppState>>,
    Json(record): Json<FeedbackRecord>,
) -> Result<Json<FeedbackReceipt>, AppError> {
    let receipt = state.engine.submit_feedback(&record).await?;
    Ok(Json(receipt))
}

#[derive(Debug, Deserialize)]
pub struct BulkFeedbackRequest {
    pub records: Vec<FeedbackRecord>,
}

/// POST /api/feedback/bulk - Submit many corrections; failures are reported
/// per record
pub async fn submit_feedback_bulk(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BulkFeedbackRequest>,
) -> Result<Json<BulkFeedbackOutcome>, AppError> {
    if request.records.len() > MAX_BULK_FEEDBACK {
        return Err(AppError::bad_request(&format!(
            "at most {} records per request",
            MAX_BULK_FEEDBACK
        )));
    }
    Ok(Json(state.engine.submit_feedback_bulk(&request.records).await))
}
