//! Classification handlers

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::{AppError, AppState};
use tally_core::{CategorizationResult, RuleTestResult, Transaction, TransactionInput};

/// POST /api/classify - Classify one transaction
///
/// Always answers 200 for a JSON object; malformed fields and degraded
/// outcomes are annotated on the result.
pub async fn classify(
    State(state): State<Arc<AppState>>,
    Json(input): Json<TransactionInput>,
) -> Json<CategorizationResult> {
    let transaction = Transaction::from(input);
    Json(state.engine.classify(&transaction).await)
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub transactions: Vec<TransactionInput>,
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub total: usize,
    pub degraded: usize,
    pub results: Vec<CategorizationResult>,
}

/// POST /api/classify/batch - Classify up to `max_batch_size` transactions
///
/// One result per item, in order. A malformed item yields a preprocessing
/// failure in its slot.
pub async fn classify_batch(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BatchRequest>,
) -> Result<Json<BatchResponse>, AppError> {
    if request.transactions.is_empty() {
        return Err(AppError::bad_request("transactions must not be empty"));
    }

    let results = state.engine.classify_inputs(request.transactions).await?;
    Ok(Json(BatchResponse {
        total: results.len(),
        degraded: results.iter().filter(|r| r.is_degraded()).count(),
        results,
    }))
}

#[derive(Debug, Deserialize)]
pub struct RuleTestRequest {
    pub description: String,
    #[serde(default)]
    pub amount: f64,
}

/// POST /api/rules/test - Dry-run the rule engine
pub async fn test_rules(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RuleTestRequest>,
) -> Result<Json<RuleTestResult>, AppError> {
    if request.description.trim().is_empty() {
        return Err(AppError::bad_request("description must not be empty"));
    }
    Ok(Json(
        state.engine.test_rules(&request.description, request.amount),
    ))
}
