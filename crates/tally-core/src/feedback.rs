//! User corrections
//!
//! A correction is validated against the record store, persisted, written
//! to the cache as a user-corrected label (long TTL) before `submit`
//! returns, and then folded into the merchant and keyword learning
//! counters. The record is marked processed once the counters are updated;
//! a record whose learning step failed stays unprocessed.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cache::CategoryCache;
use crate::db::RecordStore;
use crate::error::{Error, Result};
use crate::fingerprint::{extract_keywords, merchant_fingerprint};
use crate::metrics::{MetricSample, MetricsRecorder, Operation};
use crate::models::{Category, FeedbackRecord, PatternKind, Transaction};

/// Outcome of one accepted correction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackReceipt {
    pub feedback_id: i64,
    pub transaction_id: String,
    pub category: Category,
    /// False when the cache was unavailable
    pub cache_updated: bool,
    /// Learning patterns touched (merchant + keywords)
    pub patterns_updated: usize,
    pub processed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackFailure {
    pub transaction_id: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkFeedbackOutcome {
    pub processed: usize,
    pub failed: usize,
    pub failures: Vec<FeedbackFailure>,
}

pub struct FeedbackProcessor {
    records: Arc<dyn RecordStore>,
    cache: Arc<CategoryCache>,
    metrics: Arc<MetricsRecorder>,
}

impl FeedbackProcessor {
    pub fn new(
        records: Arc<dyn RecordStore>,
        cache: Arc<CategoryCache>,
        metrics: Arc<MetricsRecorder>,
    ) -> Self {
        Self {
            records,
            cache,
            metrics,
        }
    }

    fn validate(&self, feedback: &FeedbackRecord) -> Result<(Transaction, Category)> {
        if let Some(rating) = feedback.confidence_rating {
            if !(1..=5).contains(&rating) {
                return Err(Error::InvalidData(format!(
                    "confidence_rating must be between 1 and 5, got {}",
                    rating
                )));
            }
        }

        let transaction = self
            .records
            .get_transaction(&feedback.transaction_id)?
            .ok_or_else(|| {
                Error::NotFound(format!("transaction {}", feedback.transaction_id))
            })?;

        let category: Category = feedback
            .corrected_category
            .parse()
            .map_err(|_| Error::NotFound(format!("category {}", feedback.corrected_category)))?;
        if !self.records.category_exists(category.as_str())? {
            return Err(Error::NotFound(format!("category {}", category)));
        }

        Ok((transaction, category))
    }

    /// Whether the record changes the label the user saw
    fn is_correction(feedback: &FeedbackRecord, category: Category) -> bool {
        match feedback.original_category.as_deref() {
            None => true,
            Some(original) => original.parse::<Category>().ok() != Some(category),
        }
    }

    pub async fn submit(&self, feedback: &FeedbackRecord) -> Result<FeedbackReceipt> {
        let started = Instant::now();
        let (transaction, category) = self.validate(feedback)?;
        let feedback_id = self.records.insert_feedback(feedback)?;

        let fingerprint = merchant_fingerprint(&transaction);
        let cache_updated = match self.cache.try_set(&fingerprint, category, true) {
            Ok(()) => true,
            Err(e) => {
                warn!(feedback_id, error = %e, "Correction not cached");
                false
            }
        };

        // Learning runs after the cache write, off the async executor
        let records = Arc::clone(&self.records);
        let keywords = extract_keywords(&transaction.description);
        let learning_key = fingerprint.clone();
        let learning = tokio::task::spawn_blocking(move || -> Result<usize> {
            records.upsert_learning_pattern(PatternKind::Merchant, &learning_key, category, true)?;
            for keyword in &keywords {
                records.upsert_learning_pattern(PatternKind::Keyword, keyword, category, true)?;
            }
            records.mark_feedback_processed(feedback_id)?;
            Ok(1 + keywords.len())
        })
        .await
        .map_err(|e| Error::StoreUnavailable(format!("learning task failed: {}", e)))
        .and_then(|r| r);

        let (patterns_updated, processed) = match learning {
            Ok(count) => (count, true),
            Err(e) => {
                warn!(feedback_id, error = %e, "Learning update failed, feedback left unprocessed");
                (0, false)
            }
        };

        if Self::is_correction(feedback, category) {
            self.metrics
                .record(MetricSample::new(Operation::Feedback, started.elapsed(), true));
        }

        info!(
            feedback_id,
            transaction_id = %feedback.transaction_id,
            category = %category,
            patterns_updated,
            "Feedback applied"
        );

        Ok(FeedbackReceipt {
            feedback_id,
            transaction_id: feedback.transaction_id.clone(),
            category,
            cache_updated,
            patterns_updated,
            processed,
        })
    }

    /// Submit one at a time; a failing record never stops the rest
    pub async fn submit_bulk(&self, records: &[FeedbackRecord]) -> BulkFeedbackOutcome {
        let mut outcome = BulkFeedbackOutcome::default();
        for record in records {
            match self.submit(record).await {
                Ok(_) => outcome.processed += 1,
                Err(e) => {
                    debug!(transaction_id = %record.transaction_id, error = %e, "Feedback rejected");
                    outcome.failed += 1;
                    outcome.failures.push(FeedbackFailure {
                        transaction_id: record.transaction_id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TallyConfig;
    use crate::db::Database;
    use crate::store::MemoryStore;

    struct Harness {
        processor: FeedbackProcessor,
        db: Database,
        store: Arc<MemoryStore>,
        cache: Arc<CategoryCache>,
    }

    fn harness() -> Harness {
        let config = TallyConfig::default();
        let db = Database::in_memory().unwrap();
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(CategoryCache::new(store.clone(), &config.cache));
        let metrics = Arc::new(MetricsRecorder::new(store.clone(), &config.metrics));
        let processor = FeedbackProcessor::new(Arc::new(db.clone()), cache.clone(), metrics);
        Harness {
            processor,
            db,
            store,
            cache,
        }
    }

    fn correction(id: &str, original: Option<&str>, corrected: &str) -> FeedbackRecord {
        FeedbackRecord {
            transaction_id: id.to_string(),
            original_category: original.map(str::to_string),
            corrected_category: corrected.to_string(),
            confidence_rating: Some(5),
            source: "user".to_string(),
        }
    }

    #[tokio::test]
    async fn test_submit_overwrites_cache_and_learns() {
        let h = harness();
        let tx = Transaction::new("tx-1", "BEST WIDGETS ONLINE 4421", 89.99, "2024-03-15");
        h.db.insert_transaction(&tx, Some(Category::Other)).unwrap();

        let receipt = h
            .processor
            .submit(&correction("tx-1", Some("Other"), "Shopping"))
            .await
            .unwrap();
        assert!(receipt.cache_updated);
        assert!(receipt.processed);
        // merchant + "best", "widgets"
        assert_eq!(receipt.patterns_updated, 3);

        let fingerprint = merchant_fingerprint(&tx);
        assert_eq!(h.cache.get(&fingerprint), Some(Category::Shopping));
        let entry = h.cache.entry(&fingerprint).unwrap().unwrap();
        assert_eq!(entry.provenance, crate::models::CacheProvenance::UserCorrected);

        let merchant = h
            .db
            .get_learning_pattern(PatternKind::Merchant, &fingerprint, Category::Shopping)
            .unwrap()
            .unwrap();
        assert_eq!(merchant.occurrence_count, 1);
        assert_eq!(merchant.success_count, 1);
        assert_eq!(merchant.confidence_score, 1.0);

        let stored = h.db.list_feedback(10).unwrap();
        assert_eq!(stored.len(), 1);
        assert!(stored[0].processed_at.is_some());
    }

    #[tokio::test]
    async fn test_repeated_corrections_accumulate() {
        let h = harness();
        for i in 0..3 {
            let tx = Transaction::new(&format!("tx-{}", i), "CORNER MARKET", 12.0, "2024-03-15");
            h.db.insert_transaction(&tx, None).unwrap();
            h.processor
                .submit(&correction(&tx.id, None, "groceries"))
                .await
                .unwrap();
        }
        let pattern = h
            .db
            .get_learning_pattern(PatternKind::Keyword, "market", Category::Groceries)
            .unwrap()
            .unwrap();
        assert_eq!(pattern.occurrence_count, 3);
        assert_eq!(pattern.success_count, 3);
    }

    #[tokio::test]
    async fn test_unknown_transaction_or_category_rejected() {
        let h = harness();
        let err = h
            .processor
            .submit(&correction("missing", None, "Shopping"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        let tx = Transaction::new("tx-1", "SOMETHING", 1.0, "2024-03-15");
        h.db.insert_transaction(&tx, None).unwrap();
        let err = h
            .processor
            .submit(&correction("tx-1", None, "Crypto"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        let mut bad_rating = correction("tx-1", None, "Shopping");
        bad_rating.confidence_rating = Some(9);
        assert!(matches!(
            h.processor.submit(&bad_rating).await,
            Err(Error::InvalidData(_))
        ));
        assert!(h.db.list_feedback(10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cache_outage_still_persists_feedback() {
        let h = harness();
        let tx = Transaction::new("tx-1", "SOMETHING", 1.0, "2024-03-15");
        h.db.insert_transaction(&tx, None).unwrap();
        h.store.set_available(false);

        let receipt = h
            .processor
            .submit(&correction("tx-1", None, "Services"))
            .await
            .unwrap();
        assert!(!receipt.cache_updated);
        assert!(receipt.processed);
        assert_eq!(h.db.list_feedback(10).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_bulk_isolates_failures() {
        let h = harness();
        for id in ["a", "b"] {
            h.db
                .insert_transaction(&Transaction::new(id, "SOME SHOP", 10.0, "2024-03-15"), None)
                .unwrap();
        }
        let outcome = h
            .processor
            .submit_bulk(&[
                correction("a", None, "Shopping"),
                correction("ghost", None, "Shopping"),
                correction("b", None, "Shopping"),
            ])
            .await;
        assert_eq!(outcome.processed, 2);
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.failures[0].transaction_id, "ghost");
    }

    #[test]
    fn test_confirmation_is_not_a_correction() {
        let same = correction("a", Some("Dining Out"), "dining_out");
        assert!(!FeedbackProcessor::is_correction(&same, Category::DiningOut));
        let changed = correction("a", Some("Other"), "Shopping");
        assert!(FeedbackProcessor::is_correction(&changed, Category::Shopping));
    }
}
