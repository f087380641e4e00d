//! Hybrid categorization pipeline
//!
//! Per transaction: validate and normalize, then cache, then rules, then the
//! remote classifier, then hybrid resolution of rule and classifier answers.
//! Merchant rules at or above the short-circuit threshold skip the
//! classifier entirely. Classifier failures fall back to the rule
//! suggestion when there is one and to `Other` otherwise; fallback results
//! are never cached.
//!
//! Every step that touches the cache or the classifier records a metric
//! sample.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, NaiveDate};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::ai::{ClassificationPrompt, ClassifierClient, ClassifierGateway, ClassifierResponse};
use crate::cache::CategoryCache;
use crate::config::{PricingConfig, TallyConfig};
use crate::error::{Error, Result};
use crate::fingerprint::merchant_fingerprint;
use crate::metrics::{MetricSample, MetricsRecorder, Operation};
use crate::models::{
    CategorizationResult, Category, FallbackReason, ResultSource, RuleMatch, Transaction,
};
use crate::rules::{PatternRuleMatcher, RULE_SHORT_CIRCUIT};

/// Classifier answers are trusted at this confidence when nothing else applies
pub const AI_CONFIDENCE: f64 = 0.80;

/// Floor used by the agreement boost
pub const AGREEMENT_FLOOR: f64 = 0.85;

/// Added to the floored rule confidence when rule and classifier agree
pub const AGREEMENT_BOOST: f64 = 0.10;

/// Ceiling for boosted confidence
pub const AGREEMENT_CAP: f64 = 0.95;

/// Confidence of the `Other` fallback
pub const FALLBACK_CONFIDENCE: f64 = 0.5;

/// Confidence reported for cache hits
pub const CACHE_CONFIDENCE: f64 = 0.95;

/// Confidence after rule and classifier agree
pub fn agreement_confidence(rule_confidence: f64) -> f64 {
    (rule_confidence.max(AGREEMENT_FLOOR) + AGREEMENT_BOOST).min(AGREEMENT_CAP)
}

/// Validate a transaction and return its normalized fingerprint
pub fn preprocess(transaction: &Transaction) -> Result<String> {
    if transaction.id.trim().is_empty() {
        return Err(Error::Preprocessing("missing transaction id".into()));
    }
    if !transaction.amount.is_finite() {
        return Err(Error::Preprocessing(format!(
            "amount is not a number: {}",
            transaction.amount
        )));
    }
    let date = transaction.date.trim();
    if NaiveDate::parse_from_str(date, "%Y-%m-%d").is_err()
        && DateTime::parse_from_rfc3339(date).is_err()
    {
        return Err(Error::Preprocessing(format!(
            "unparseable date: {:?}",
            transaction.date
        )));
    }

    let normalized = merchant_fingerprint(transaction);
    if normalized.is_empty() {
        return Err(Error::Preprocessing("empty description".into()));
    }
    Ok(normalized)
}

/// Rule engine dry run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleTestResult {
    pub normalized: String,
    pub matched: Option<RuleMatch>,
    /// Every rule that fires, in precedence order
    pub candidates: Vec<RuleMatch>,
    pub short_circuits: bool,
}

pub struct CategorizationOrchestrator {
    rules: Arc<PatternRuleMatcher>,
    cache: Arc<CategoryCache>,
    classifier: Option<ClassifierClient>,
    metrics: Arc<MetricsRecorder>,
    pricing: PricingConfig,
    timeout: Duration,
    max_concurrency: usize,
    max_batch_size: usize,
}

impl CategorizationOrchestrator {
    pub fn new(
        rules: Arc<PatternRuleMatcher>,
        cache: Arc<CategoryCache>,
        classifier: Option<ClassifierClient>,
        metrics: Arc<MetricsRecorder>,
        config: &TallyConfig,
    ) -> Self {
        Self {
            rules,
            cache,
            classifier,
            metrics,
            pricing: config.pricing.clone(),
            timeout: config.classifier.timeout(),
            max_concurrency: config.classifier.max_concurrency.max(1),
            max_batch_size: config.orchestrator.max_batch_size,
        }
    }

    /// Override the per-call classifier deadline
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn classifier(&self) -> Option<&ClassifierClient> {
        self.classifier.as_ref()
    }

    pub fn cache(&self) -> &CategoryCache {
        &self.cache
    }

    pub fn rules(&self) -> &PatternRuleMatcher {
        &self.rules
    }

    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    /// Run the rule engine alone
    pub fn test_rules(&self, description: &str, amount: f64) -> RuleTestResult {
        let matched = self.rules.find_match(description, amount);
        RuleTestResult {
            normalized: crate::fingerprint::normalize_text(description),
            short_circuits: matched
                .as_ref()
                .map(|m| m.confidence >= RULE_SHORT_CIRCUIT)
                .unwrap_or(false),
            matched,
            candidates: self.rules.all_matches(description, amount),
        }
    }

    /// Classify one transaction; never fails, degraded outcomes are
    /// annotated on the result
    pub async fn classify(&self, transaction: &Transaction) -> CategorizationResult {
        let started = Instant::now();
        let result = self.resolve(transaction).await;

        self.metrics.record(MetricSample::new(
            Operation::Classify,
            started.elapsed(),
            !result.is_error(),
        ));

        debug!(
            transaction_id = %result.transaction_id,
            category = %result.category,
            confidence = result.confidence,
            source = ?result.source,
            latency_ms = started.elapsed().as_millis() as u64,
            "Classified transaction"
        );
        result
    }

    /// Classify in input order, one at a time
    pub async fn classify_all(&self, transactions: &[Transaction]) -> Vec<CategorizationResult> {
        let mut results = Vec::with_capacity(transactions.len());
        for transaction in transactions {
            results.push(self.classify(transaction).await);
        }
        results
    }

    /// Classify up to `max_batch_size` transactions through a bounded
    /// worker pool, preserving input order
    pub async fn classify_batch(
        &self,
        transactions: &[Transaction],
    ) -> Result<Vec<CategorizationResult>> {
        self.check_batch_size(transactions.len())?;
        let pending: Vec<_> = transactions.iter().map(|tx| self.classify(tx)).collect();
        Ok(self.run_batch(pending).await)
    }

    fn check_batch_size(&self, len: usize) -> Result<()> {
        if len > self.max_batch_size {
            return Err(Error::InvalidData(format!(
                "Batch of {} exceeds the maximum of {} transactions",
                len, self.max_batch_size
            )));
        }
        Ok(())
    }

    // Takes collected futures; a mapping closure inside `stream::iter` makes
    // the batch future too lifetime-specific for axum handlers.
    async fn run_batch<F>(&self, pending: Vec<F>) -> Vec<CategorizationResult>
    where
        F: Future<Output = CategorizationResult>,
    {
        let results = stream::iter(pending)
            .buffered(self.max_concurrency)
            .collect::<Vec<_>>()
            .await;

        let degraded = results.iter().filter(|r| r.is_degraded()).count();
        info!(
            total = results.len(),
            degraded = degraded,
            "Batch classification complete"
        );
        results
    }

    async fn resolve(&self, transaction: &Transaction) -> CategorizationResult {
        let normalized = match preprocess(transaction) {
            Ok(normalized) => normalized,
            Err(Error::Preprocessing(reason)) => {
                warn!(transaction_id = %transaction.id, reason = %reason, "Rejected transaction");
                return CategorizationResult::preprocessing_failed(&transaction.id, &reason);
            }
            Err(e) => {
                return CategorizationResult::preprocessing_failed(&transaction.id, &e.to_string())
            }
        };

        if let Some(category) = self.lookup_cache(&normalized) {
            return self.result(transaction, category, CACHE_CONFIDENCE, ResultSource::Cache);
        }

        let rule = self.rules.find_match(&normalized, transaction.amount);
        if let Some(ref rule) = rule {
            if rule.confidence >= RULE_SHORT_CIRCUIT {
                debug!(rule = %rule.rule, confidence = rule.confidence, "Rule short-circuit");
                self.cache.set(&normalized, rule.category, false);
                return self.result(transaction, rule.category, rule.score(), ResultSource::Rule);
            }
        }

        let classifier = match self.classifier {
            Some(ref classifier) => classifier,
            None => {
                return self.fallback(transaction, rule.as_ref(), FallbackReason::ClassifierNotConfigured)
            }
        };

        match self.call_classifier(classifier, &normalized).await {
            Ok(response) => {
                let cost = self
                    .pricing
                    .cost(response.token_usage.input, response.token_usage.output);
                let mut result = match rule {
                    Some(ref rule) => self.hybrid(transaction, rule, &response),
                    None => self.result(transaction, response.category, AI_CONFIDENCE, ResultSource::Ai),
                };
                result.cost_usd = cost;
                result.token_usage = Some(response.token_usage);
                self.cache.set(&normalized, result.category, false);
                result
            }
            Err(e) => {
                let reason = match e {
                    Error::InvalidClassifierResponse(_) => FallbackReason::InvalidClassifierResponse,
                    _ => FallbackReason::ClassifierUnavailable,
                };
                if e.is_classifier_failure() {
                    warn!(
                        transaction_id = %transaction.id,
                        error = %e,
                        has_rule = rule.is_some(),
                        "Classifier failed, using fallback"
                    );
                } else {
                    error!(
                        transaction_id = %transaction.id,
                        error = %e,
                        has_rule = rule.is_some(),
                        "Unexpected classifier error, using fallback"
                    );
                }
                self.fallback(transaction, rule.as_ref(), reason)
            }
        }
    }

    fn lookup_cache(&self, normalized: &str) -> Option<Category> {
        let started = Instant::now();
        match self.cache.try_get(normalized) {
            Ok(hit) => {
                self.metrics.record(
                    MetricSample::new(Operation::CacheLookup, started.elapsed(), true)
                        .with_cache_hit(hit.is_some()),
                );
                hit
            }
            Err(e) => {
                warn!(error = %e, "Cache lookup failed, treating as miss");
                self.metrics.record(
                    MetricSample::new(Operation::CacheLookup, started.elapsed(), false)
                        .with_cache_hit(false),
                );
                None
            }
        }
    }

    async fn call_classifier(
        &self,
        classifier: &ClassifierClient,
        normalized: &str,
    ) -> Result<ClassifierResponse> {
        let prompt = ClassificationPrompt::for_description(normalized);
        let started = Instant::now();

        let outcome = match tokio::time::timeout(self.timeout, classifier.classify(&prompt)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(Error::ClassifierUnavailable(format!(
                "timed out after {}ms",
                self.timeout.as_millis()
            ))),
        };

        let sample = MetricSample::new(Operation::ClassifierCall, started.elapsed(), outcome.is_ok());
        let sample = match outcome {
            Ok(ref response) => {
                let cost = self
                    .pricing
                    .cost(response.token_usage.input, response.token_usage.output);
                sample.with_usage(response.token_usage, cost)
            }
            Err(_) => sample,
        };
        self.metrics.record(sample);

        outcome
    }

    fn hybrid(
        &self,
        transaction: &Transaction,
        rule: &RuleMatch,
        response: &ClassifierResponse,
    ) -> CategorizationResult {
        let rule_confidence = rule.score();
        if rule.category == response.category {
            return self.result(
                transaction,
                rule.category,
                agreement_confidence(rule_confidence),
                ResultSource::Hybrid,
            );
        }

        // Rules above the floor short-circuit in `resolve`, so only direct
        // callers of `hybrid` reach the rule-wins branch.
        let rule_wins = rule_confidence > AGREEMENT_FLOOR;
        warn!(
            transaction_id = %transaction.id,
            rule_category = %rule.category,
            rule_confidence = rule_confidence,
            rule = %rule.rule,
            classifier_category = %response.category,
            winner = if rule_wins { "rule" } else { "classifier" },
            "Rule and classifier disagree"
        );

        if rule_wins {
            self.result(transaction, rule.category, rule_confidence, ResultSource::Hybrid)
        } else {
            self.result(transaction, response.category, AI_CONFIDENCE, ResultSource::Hybrid)
        }
    }

    fn fallback(
        &self,
        transaction: &Transaction,
        rule: Option<&RuleMatch>,
        reason: FallbackReason,
    ) -> CategorizationResult {
        let mut result = match rule {
            Some(rule) => self.result(transaction, rule.category, rule.score(), ResultSource::Rule),
            None => self.result(transaction, Category::Other, FALLBACK_CONFIDENCE, ResultSource::Ai),
        };
        result.fallback = Some(reason);
        result
    }

    fn result(
        &self,
        transaction: &Transaction,
        category: Category,
        confidence: f64,
        source: ResultSource,
    ) -> CategorizationResult {
        CategorizationResult {
            transaction_id: transaction.id.clone(),
            category,
            confidence,
            source: Some(source),
            fallback: None,
            error: None,
            cost_usd: 0.0,
            token_usage: None,
        }
    }
}
