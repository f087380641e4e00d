//! Integration tests for tally-core
//!
//! These tests drive the full classify → feedback → metrics → alert
//! workflow through the `Engine` over a throwaway database.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tally_core::{
    alerts::{AlertType, NotificationPayload, NotificationTransport},
    config::TallyConfig,
    fingerprint::merchant_fingerprint,
    metrics::ReportPeriod,
    models::{CacheProvenance, FallbackReason, PatternKind},
    validation::generate_dataset,
    Category, ClassifierClient, Database, Engine, FeedbackRecord, MemoryStore, MockClassifier,
    PatternRuleMatcher, ResultSource, ThresholdsUpdate, Transaction,
};

#[derive(Default)]
struct RecordingTransport {
    sent: Mutex<Vec<NotificationPayload>>,
}

#[async_trait]
impl NotificationTransport for RecordingTransport {
    async fn send(&self, payload: &NotificationPayload) -> tally_core::Result<()> {
        self.sent.lock().unwrap().push(payload.clone());
        Ok(())
    }
}

fn engine_with(mock: Option<MockClassifier>) -> (Engine, Arc<RecordingTransport>) {
    let transport = Arc::new(RecordingTransport::default());
    let engine = Engine::with_parts(
        TallyConfig::default(),
        Database::in_memory().expect("Failed to create in-memory database"),
        Arc::new(MemoryStore::new()),
        PatternRuleMatcher::embedded().expect("Embedded rules should parse"),
        mock.map(ClassifierClient::Mock),
        transport.clone(),
    );
    (engine, transport)
}

fn tx(id: &str, description: &str, amount: f64) -> Transaction {
    Transaction::new(id, description, amount, "2024-06-01")
}

// =============================================================================
// Classification pipeline
// =============================================================================

#[tokio::test]
async fn test_batch_mixes_sources_and_keeps_order() {
    let mock = MockClassifier::new();
    let (engine, _) = engine_with(Some(mock.clone()));

    let batch = vec![
        tx("1", "LOBLAWS #1021 TORONTO", 84.12),
        tx("2", "PIZZA NOVA 221", 31.0),
        tx("3", "", 10.0),
        tx("4", "UNHEARD OF VENDOR", 12.0),
    ];
    let results = engine.classify_batch(&batch).await.unwrap();

    assert_eq!(results.len(), 4);
    let ids: Vec<_> = results.iter().map(|r| r.transaction_id.as_str()).collect();
    assert_eq!(ids, ["1", "2", "3", "4"]);

    assert_eq!(results[0].category, Category::Groceries);
    assert_eq!(results[0].source, Some(ResultSource::Rule));
    assert_eq!(results[1].category, Category::DiningOut);
    assert!(results[2].error.is_some());
    assert_eq!(results[3].category, Category::Other);

    // Short-circuit and rejected input never reach the classifier
    assert_eq!(mock.call_count(), 2);
}

#[tokio::test]
async fn test_oversized_batch_rejected() {
    let (engine, _) = engine_with(None);
    let batch: Vec<_> = (0..101).map(|i| tx(&i.to_string(), "STARBUCKS", 5.0)).collect();
    assert!(engine.classify_batch(&batch).await.is_err());
}

#[tokio::test]
async fn test_second_sighting_hits_cache() {
    let mock = MockClassifier::new();
    let (engine, _) = engine_with(Some(mock.clone()));

    let first = engine.classify(&tx("a", "NETFLIX SUBSCRIPTION", 16.99)).await;
    let second = engine.classify(&tx("b", "NETFLIX SUBSCRIPTION", 16.99)).await;
    assert_eq!(first.category, Category::Entertainment);
    assert_eq!(second.source, Some(ResultSource::Cache));
    assert_eq!(second.category, Category::Entertainment);

    let report = engine.performance_report(ReportPeriod::Hour);
    assert_eq!(report.total, 2);
    assert_eq!(report.cache_hits, 1);
    assert_eq!(report.cache_lookups, 2);
}

#[tokio::test]
async fn test_classifier_outage_falls_back_without_caching() {
    let (engine, _) = engine_with(Some(MockClassifier::unavailable()));

    let result = engine.classify(&tx("x", "UNHEARD OF VENDOR", 12.0)).await;
    assert_eq!(result.category, Category::Other);
    assert_eq!(result.fallback, Some(FallbackReason::ClassifierUnavailable));

    let again = engine.classify(&tx("y", "UNHEARD OF VENDOR", 12.0)).await;
    assert_ne!(again.source, Some(ResultSource::Cache));
}

// =============================================================================
// Feedback loop
// =============================================================================

#[tokio::test]
async fn test_correction_wins_over_classifier() {
    let mock = MockClassifier::fixed(Category::Shopping);
    let (engine, _) = engine_with(Some(mock.clone()));

    let original = tx("t-1", "GREEN BASKET CO-OP", 42.0);
    let result = engine.classify(&original).await;
    assert_eq!(result.category, Category::Shopping);

    let receipt = engine
        .submit_feedback(&FeedbackRecord {
            transaction_id: "t-1".to_string(),
            original_category: Some("Shopping".to_string()),
            corrected_category: "Groceries".to_string(),
            confidence_rating: Some(4),
            source: "user".to_string(),
        })
        .await
        .unwrap();
    assert!(receipt.cache_updated);
    assert!(receipt.processed);

    let calls_before = mock.call_count();
    let next = engine.classify(&tx("t-2", "GREEN BASKET CO-OP", 17.5)).await;
    assert_eq!(next.category, Category::Groceries);
    assert_eq!(next.source, Some(ResultSource::Cache));
    assert_eq!(mock.call_count(), calls_before);

    let fingerprint = merchant_fingerprint(&original);
    let entry = engine
        .orchestrator()
        .cache()
        .entry(&fingerprint)
        .unwrap()
        .unwrap();
    assert_eq!(entry.provenance, CacheProvenance::UserCorrected);

    let pattern = engine
        .database()
        .get_learning_pattern(PatternKind::Merchant, &fingerprint, Category::Groceries)
        .unwrap()
        .unwrap();
    assert_eq!(pattern.success_count, 1);

    let report = engine.performance_report(ReportPeriod::Hour);
    assert_eq!(report.corrections, 1);
    assert!(report.estimated_accuracy.unwrap() < 1.0);
}

#[tokio::test]
async fn test_feedback_for_unknown_transaction_rejected() {
    let (engine, _) = engine_with(None);
    let outcome = engine
        .submit_feedback_bulk(&[FeedbackRecord {
            transaction_id: "never-classified".to_string(),
            original_category: None,
            corrected_category: "Groceries".to_string(),
            confidence_rating: None,
            source: "user".to_string(),
        }])
        .await;
    assert_eq!(outcome.processed, 0);
    assert_eq!(outcome.failed, 1);
}

// =============================================================================
// Monitoring and alerts
// =============================================================================

#[tokio::test]
async fn test_alert_lifecycle() {
    let (engine, transport) = engine_with(Some(MockClassifier::unavailable()));

    for i in 0..10 {
        engine
            .classify(&tx(&format!("f-{}", i), "UNHEARD OF VENDOR", 12.0))
            .await;
    }

    let outcome = engine.run_check().await.unwrap();
    let opened: Vec<_> = outcome.opened.iter().map(|a| a.alert_type).collect();
    assert!(opened.contains(&AlertType::ErrorRate));
    assert!(!transport.sent.lock().unwrap().is_empty());

    let active = engine.active_alerts();
    let error_alert = active
        .iter()
        .find(|a| a.alert_type == AlertType::ErrorRate)
        .unwrap()
        .clone();

    let resolved = engine.resolve_alert(&error_alert.id).unwrap();
    assert!(resolved.resolved);
    assert!(engine
        .active_alerts()
        .iter()
        .all(|a| a.id != error_alert.id));

    // Still failing: the next check opens a fresh alert
    let reopened = engine.run_check().await.unwrap();
    let fresh = reopened
        .opened
        .iter()
        .find(|a| a.alert_type == AlertType::ErrorRate)
        .unwrap();
    assert_ne!(fresh.id, error_alert.id);

    assert!(engine.alert_history().len() >= 2);
}

#[tokio::test]
async fn test_threshold_update_changes_verdict() {
    let (engine, _) = engine_with(Some(MockClassifier::unavailable()));
    engine.classify(&tx("f-1", "UNHEARD OF VENDOR", 12.0)).await;

    let mut update = ThresholdsUpdate::default();
    update.set("error_rate", 100.0).unwrap();
    update.set("throughput", 0.0).unwrap();
    update.set("accuracy", 0.0).unwrap();
    engine.update_thresholds(&update).unwrap();
    assert_eq!(engine.thresholds().error_rate, 100.0);

    let outcome = engine.run_check().await.unwrap();
    assert!(outcome
        .opened
        .iter()
        .all(|a| a.alert_type != AlertType::ErrorRate));

    let mut invalid = ThresholdsUpdate::default();
    invalid.set("accuracy", 140.0).unwrap();
    assert!(engine.update_thresholds(&invalid).is_err());
}

// =============================================================================
// Validation
// =============================================================================

#[tokio::test]
async fn test_validation_over_generated_dataset() {
    let (engine, _) = engine_with(Some(MockClassifier::new()));
    let dataset = generate_dataset(80, 2024);

    let report = engine.run_validation(&dataset, "generated").await.unwrap();
    assert_eq!(report.total, 80);
    assert!(report.accuracy > 0.5);
    assert!(report.failures.len() <= 20);
    assert!(report.p99_latency_ms >= report.p95_latency_ms);
    assert_eq!(report.cost_per_statement, report.cost_per_transaction * 100.0);

    let prometheus = engine.prometheus();
    assert!(prometheus.starts_with("# HELP tally_classifications_total "));
    assert!(prometheus.contains("tally_classifications_total 80\n"));
}
