//! Tally Core Library
//!
//! Hybrid categorization of bank transactions:
//! - Pattern rules with tiered precedence and a short-circuit threshold
//! - Fingerprint cache with provenance-dependent expiry
//! - Pluggable remote classifiers (Ollama, OpenAI-compatible, mock)
//! - Orchestrator combining cache, rules and classifier with fallbacks
//! - Feedback loop feeding corrections back into cache and learning counters
//! - Metrics, threshold alerts with notifications, and a validation harness

pub mod ai;
pub mod alerts;
pub mod cache;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod feedback;
pub mod fingerprint;
pub mod metrics;
pub mod models;
pub mod monitor;
pub mod orchestrator;
pub mod rules;
pub mod store;
pub mod validation;

/// Test utilities including the mock classifier server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use ai::{
    ClassificationPrompt, ClassifierClient, ClassifierGateway, ClassifierResponse, MockBehavior,
    MockClassifier, OllamaBackend, OpenAICompatibleBackend,
};
pub use alerts::{
    Alert, AlertEngine, AlertType, DefaultTransport, MetricSnapshot, NotificationTransport,
    Severity,
};
pub use cache::CategoryCache;
pub use config::{AlertThresholds, TallyConfig, ThresholdsUpdate};
pub use db::{Database, RecordStore};
pub use engine::{Engine, HealthStatus};
pub use error::{Error, Result};
pub use feedback::{BulkFeedbackOutcome, FeedbackProcessor, FeedbackReceipt};
pub use metrics::{MetricsRecorder, PerformanceReport, ReportPeriod};
pub use models::{
    CategorizationResult, Category, FeedbackRecord, ResultSource, Transaction, TransactionInput,
};
pub use monitor::{CheckOutcome, Monitor};
pub use orchestrator::{CategorizationOrchestrator, RuleTestResult};
pub use rules::PatternRuleMatcher;
pub use store::{KeyValueStore, MemoryStore};
pub use validation::{ValidationHarness, ValidationRecord, ValidationReport};
