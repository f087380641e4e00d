//! Validation handlers

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Deserialize;

use crate::{AppError, AppState, MAX_VALIDATION_SIZE};
use tally_core::validation::{generate_dataset, ValidationRecord, ValidationReport};

fn default_size() -> usize {
    100
}

fn default_scenario() -> String {
    "api".to_string()
}

/// Either an explicit dataset or generation parameters
#[derive(Debug, Deserialize)]
pub struct ValidationRequest {
    #[serde(default = "default_scenario")]
    pub scenario: String,
    #[serde(default = "default_size")]
    pub size: usize,
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub records: Option<Vec<ValidationRecord>>,
}

/// POST /api/validation/run
pub async fn run_validation(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ValidationRequest>,
) -> Result<Json<ValidationReport>, AppError> {
    let records = match request.records {
        Some(records) => records,
        None => generate_dataset(request.size.min(MAX_VALIDATION_SIZE + 1), request.seed),
    };
    if records.len() > MAX_VALIDATION_SIZE {
        return Err(AppError::bad_request(&format!(
            "validation datasets are limited to {} records",
            MAX_VALIDATION_SIZE
        )));
    }

    let report = state
        .engine
        .run_validation(&records, &request.scenario)
        .await?;
    Ok(Json(report))
}
