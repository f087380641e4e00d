//! Tally Web Server
//!
//! Axum-based REST API over the Tally engine, plus the scheduled
//! monitoring check.
//!
//! - Restrictive CORS policy
//! - Request tracing
//! - Input limits (batch size, validation dataset size)
//! - Sanitized error responses

use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use tally_core::{ClassifierGateway, Engine};

mod handlers;
mod scheduler;

pub use scheduler::start_monitor_scheduler;

/// Largest dataset `/api/validation/run` will generate or accept
pub const MAX_VALIDATION_SIZE: usize = 5000;

/// Server configuration
#[derive(Clone, Default)]
pub struct ServerConfig {
    /// Allowed CORS origins (empty = same-origin only)
    pub allowed_origins: Vec<String>,
}

/// Shared application state
pub struct AppState {
    pub engine: Arc<Engine>,
    pub config: ServerConfig,
}

/// Create the router
pub fn create_router(engine: Arc<Engine>, config: ServerConfig) -> Router {
    let state = Arc::new(AppState {
        engine,
        config: config.clone(),
    });

    let api_routes = Router::new()
        // Classification
        .route("/classify", post(handlers::classify))
        .route("/classify/batch", post(handlers::classify_batch))
        .route("/rules/test", post(handlers::test_rules))
        // Feedback
        .route("/feedback", post(handlers::submit_feedback))
        .route("/feedback/bulk", post(handlers::submit_feedback_bulk))
        // Alerts
        .route("/alerts", get(handlers::list_alerts))
        .route("/alerts/history", get(handlers::alert_history))
        .route(
            "/alerts/thresholds",
            get(handlers::get_thresholds).put(handlers::update_thresholds),
        )
        .route("/alerts/:id/resolve", post(handlers::resolve_alert))
        // Metrics and monitoring
        .route("/metrics/report", get(handlers::performance_report))
        .route("/monitor/check", post(handlers::run_check))
        // Validation
        .route("/validation/run", post(handlers::run_validation));

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .nest("/api", api_routes)
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::prometheus))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Start the server and, when enabled, the monitoring scheduler
pub async fn serve(
    engine: Arc<Engine>,
    host: &str,
    port: u16,
    config: ServerConfig,
) -> anyhow::Result<()> {
    check_classifier_connection(&engine).await;

    let monitoring = &engine.config().monitoring;
    if monitoring.enabled {
        start_monitor_scheduler(
            engine.clone(),
            std::time::Duration::from_secs(monitoring.interval_secs),
        );
    } else {
        info!("Scheduled monitoring disabled");
    }

    let app = create_router(engine, config);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Log classifier reachability at startup
async fn check_classifier_connection(engine: &Engine) {
    match engine.orchestrator().classifier() {
        Some(client) => {
            if client.health_check().await {
                info!(
                    "Classifier connected: {} ({}, model {})",
                    client.host(),
                    client.backend_name(),
                    client.model()
                );
            } else {
                warn!(
                    "Classifier configured but not responding: {} (model {}); falling back to rules",
                    client.host(),
                    client.model()
                );
            }
        }
        None => {
            info!("Classifier not configured (set TALLY_CLASSIFIER_HOST to enable); running rules-only");
        }
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn not_found(msg: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.to_string(),
            internal: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let err = err.into();
        // Caller mistakes keep their message; everything else is sanitized
        match err.downcast_ref::<tally_core::Error>() {
            Some(tally_core::Error::InvalidData(msg))
            | Some(tally_core::Error::Preprocessing(msg))
            | Some(tally_core::Error::Config(msg)) => Self::bad_request(msg),
            Some(tally_core::Error::NotFound(msg)) => Self::not_found(&format!("Not found: {}", msg)),
            _ => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                // Return generic message to client
                message: "An internal error occurred".to_string(),
                // Keep full error for logging
                internal: Some(err),
            },
        }
    }
}

#[cfg(test)]
mod tests;
