//! Engine assembly
//!
//! Wires the database, key-value store, rule set, classifier and
//! notification transport into one handle the CLI and the HTTP server share.
//! Classified transactions are recorded in the database so later feedback
//! can refer to them by id.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::ai::{ClassifierClient, ClassifierGateway};
use crate::alerts::{Alert, AlertEngine, DefaultTransport, NotificationTransport};
use crate::cache::CategoryCache;
use crate::config::{AlertThresholds, TallyConfig, ThresholdsUpdate};
use crate::db::Database;
use crate::error::Result;
use crate::feedback::{BulkFeedbackOutcome, FeedbackProcessor, FeedbackReceipt};
use crate::metrics::{export_prometheus, MetricsRecorder, PerformanceReport, ReportPeriod};
use crate::models::{CategorizationResult, FeedbackRecord, Transaction, TransactionInput};
use crate::monitor::{CheckOutcome, Monitor};
use crate::orchestrator::{CategorizationOrchestrator, RuleTestResult};
use crate::rules::PatternRuleMatcher;
use crate::store::KeyValueStore;
use crate::validation::{ValidationHarness, ValidationRecord, ValidationReport};

/// Liveness summary for `/health` and `tally status`-style output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub rules: usize,
    /// None when running rules-only
    pub classifier_backend: Option<String>,
    pub classifier_model: Option<String>,
    pub classifier_healthy: Option<bool>,
    pub active_alerts: usize,
}

pub struct Engine {
    config: TallyConfig,
    db: Database,
    orchestrator: Arc<CategorizationOrchestrator>,
    feedback: FeedbackProcessor,
    metrics: Arc<MetricsRecorder>,
    alerts: Arc<AlertEngine>,
    monitor: Monitor,
    validation: ValidationHarness,
}

impl Engine {
    /// Production wiring: the database doubles as the durable key-value
    /// store and notifications go through the configured channels
    pub fn open(config: TallyConfig, db: Database, rules: PatternRuleMatcher) -> Result<Self> {
        let store: Arc<dyn KeyValueStore> = Arc::new(db.clone());
        let classifier = ClassifierClient::from_config(&config.classifier);
        let transport = Arc::new(DefaultTransport::new(&config.notifications)?);

        match classifier {
            Some(ref c) => info!(backend = c.backend_name(), model = c.model(), host = c.host(), "Classifier configured"),
            None => info!("No classifier host configured, running rules-only"),
        }

        Ok(Self::with_parts(config, db, store, rules, classifier, transport))
    }

    /// Explicit wiring, used by tests to swap the store, classifier and
    /// transport
    pub fn with_parts(
        config: TallyConfig,
        db: Database,
        store: Arc<dyn KeyValueStore>,
        rules: PatternRuleMatcher,
        classifier: Option<ClassifierClient>,
        transport: Arc<dyn NotificationTransport>,
    ) -> Self {
        let cache = Arc::new(CategoryCache::new(store.clone(), &config.cache));
        let metrics = Arc::new(MetricsRecorder::new(store.clone(), &config.metrics));
        let alerts = Arc::new(AlertEngine::new(
            store,
            transport,
            &config.alerts,
            &config.notifications,
        ));
        let orchestrator = Arc::new(CategorizationOrchestrator::new(
            Arc::new(rules),
            cache.clone(),
            classifier,
            metrics.clone(),
            &config,
        ));
        let feedback = FeedbackProcessor::new(Arc::new(db.clone()), cache, metrics.clone());
        let monitor = Monitor::new(metrics.clone(), alerts.clone());
        let validation = ValidationHarness::new(orchestrator.clone(), metrics.clone());

        Self {
            config,
            db,
            orchestrator,
            feedback,
            metrics,
            alerts,
            monitor,
            validation,
        }
    }

    pub fn config(&self) -> &TallyConfig {
        &self.config
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn orchestrator(&self) -> &CategorizationOrchestrator {
        &self.orchestrator
    }

    pub fn metrics(&self) -> &MetricsRecorder {
        &self.metrics
    }

    pub fn alerts(&self) -> &AlertEngine {
        &self.alerts
    }

    /// Record a classified transaction so feedback can find it later.
    /// Rejected inputs are not stored; failed classifications are stored
    /// without a category.
    fn persist(&self, transaction: &Transaction, result: &CategorizationResult) {
        if result.error.is_some() {
            return;
        }
        let category = if result.is_error() {
            None
        } else {
            Some(result.category)
        };
        if let Err(e) = self.db.insert_transaction(transaction, category) {
            warn!(transaction_id = %transaction.id, error = %e, "Failed to record transaction");
        }
    }

    pub async fn classify(&self, transaction: &Transaction) -> CategorizationResult {
        let result = self.orchestrator.classify(transaction).await;
        self.persist(transaction, &result);
        result
    }

    pub async fn classify_batch(
        &self,
        transactions: &[Transaction],
    ) -> Result<Vec<CategorizationResult>> {
        let results = self.orchestrator.classify_batch(transactions).await?;
        for (transaction, result) in transactions.iter().zip(&results) {
            self.persist(transaction, result);
        }
        Ok(results)
    }

    /// Classify loosely typed items; malformed ones come back as
    /// preprocessing failures in their slot
    pub async fn classify_inputs(
        &self,
        inputs: Vec<TransactionInput>,
    ) -> Result<Vec<CategorizationResult>> {
        let transactions: Vec<Transaction> = inputs.into_iter().map(Transaction::from).collect();
        self.classify_batch(&transactions).await
    }

    pub fn test_rules(&self, description: &str, amount: f64) -> RuleTestResult {
        self.orchestrator.test_rules(description, amount)
    }

    pub async fn submit_feedback(&self, feedback: &FeedbackRecord) -> Result<FeedbackReceipt> {
        self.feedback.submit(feedback).await
    }

    pub async fn submit_feedback_bulk(&self, records: &[FeedbackRecord]) -> BulkFeedbackOutcome {
        self.feedback.submit_bulk(records).await
    }

    pub fn performance_report(&self, period: ReportPeriod) -> PerformanceReport {
        self.metrics.report(period)
    }

    /// Prometheus text for the default report window
    pub fn prometheus(&self) -> String {
        let report = self.metrics.report(ReportPeriod::default());
        export_prometheus(&report, self.alerts.active_alerts().len())
    }

    pub fn active_alerts(&self) -> Vec<Alert> {
        self.alerts.active_alerts()
    }

    pub fn alert_history(&self) -> Vec<Alert> {
        self.alerts.alert_history()
    }

    pub fn resolve_alert(&self, id: &str) -> Result<Alert> {
        self.alerts.resolve_alert(id)
    }

    pub fn thresholds(&self) -> AlertThresholds {
        self.alerts.thresholds()
    }

    pub fn update_thresholds(&self, update: &ThresholdsUpdate) -> Result<AlertThresholds> {
        self.alerts.update_thresholds(update)
    }

    /// One monitoring pass over the last hour
    pub async fn run_check(&self) -> Result<CheckOutcome> {
        self.monitor.run_check().await
    }

    pub async fn run_validation(
        &self,
        records: &[ValidationRecord],
        scenario: &str,
    ) -> Result<ValidationReport> {
        self.validation.run(records, scenario).await
    }

    pub async fn health(&self) -> HealthStatus {
        let classifier = self.orchestrator.classifier();
        let classifier_healthy = match classifier {
            Some(c) => Some(c.health_check().await),
            None => None,
        };
        HealthStatus {
            status: "ok".to_string(),
            rules: self.orchestrator.rules().len(),
            classifier_backend: classifier.map(|c| c.backend_name().to_string()),
            classifier_model: classifier.map(|c| c.model().to_string()),
            classifier_healthy,
            active_alerts: self.alerts.active_alerts().len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockClassifier;
    use crate::models::Category;
    use crate::store::MemoryStore;

    fn engine(mock: Option<MockClassifier>) -> Engine {
        let mut config = TallyConfig::default();
        config.notifications.webhook_url = None;
        let db = Database::in_memory().unwrap();
        let transport = Arc::new(DefaultTransport::new(&config.notifications).unwrap());
        Engine::with_parts(
            config,
            db,
            Arc::new(MemoryStore::new()),
            PatternRuleMatcher::embedded().unwrap(),
            mock.map(ClassifierClient::Mock),
            transport,
        )
    }

    #[tokio::test]
    async fn test_classify_records_transaction() {
        let engine = engine(Some(MockClassifier::new()));
        let tx = Transaction::new("tx-1", "PIZZA NOVA 221", 24.5, "2024-04-02");
        let result = engine.classify(&tx).await;
        assert_eq!(result.category, Category::DiningOut);

        assert_eq!(
            engine.database().transaction_category("tx-1").unwrap(),
            Some(Category::DiningOut)
        );
    }

    #[tokio::test]
    async fn test_rejected_transaction_not_recorded() {
        let engine = engine(None);
        let tx = Transaction::new("tx-bad", "SOMETHING", 1.0, "yesterday");
        let result = engine.classify(&tx).await;
        assert!(result.error.is_some());
        assert!(engine.database().find_transaction("tx-bad").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_classify_inputs_keeps_one_result_per_item() {
        let engine = engine(None);
        let inputs = vec![
            TransactionInput {
                id: Some("ok".into()),
                description: Some("PIZZA NOVA 221".into()),
                amount: serde_json::json!(24.5),
                date: Some("2024-04-02".into()),
                merchant: None,
            },
            TransactionInput {
                id: Some("bad".into()),
                description: Some("PIZZA NOVA 221".into()),
                amount: serde_json::json!("lots"),
                date: Some("2024-04-02".into()),
                merchant: None,
            },
        ];

        let results = engine.classify_inputs(inputs).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].error.is_none());
        assert!(results[1].error.is_some());
        assert!(engine.database().find_transaction("ok").unwrap().is_some());
        assert!(engine.database().find_transaction("bad").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_classification_recorded_without_category() {
        let engine = engine(Some(MockClassifier::unavailable()));
        let tx = Transaction::new("tx-2", "MYSTERY VENDOR", 1234.0, "2024-04-02");
        let result = engine.classify(&tx).await;
        assert!(result.is_error());
        assert!(engine.database().find_transaction("tx-2").unwrap().is_some());
        assert_eq!(engine.database().transaction_category("tx-2").unwrap(), None);
    }

    #[tokio::test]
    async fn test_health_reports_classifier() {
        let rules_only = engine(None).health().await;
        assert_eq!(rules_only.classifier_backend, None);
        assert!(rules_only.rules > 0);

        let mocked = engine(Some(MockClassifier::new())).health().await;
        assert_eq!(mocked.classifier_backend.as_deref(), Some("mock"));
        assert_eq!(mocked.classifier_healthy, Some(true));
    }

    #[tokio::test]
    async fn test_prometheus_counts_active_alerts() {
        let engine = engine(None);
        let text = engine.prometheus();
        assert!(text.contains("tally_active_alerts 0\n"));
    }
}
