//! Mock classifier for testing
//!
//! Answers from a small keyword table and can be switched into failure
//! modes. Clones share one call counter so tests can assert how often the
//! remote classifier would have been hit.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::models::{Category, TokenUsage};

use super::types::{ClassificationPrompt, ClassifierResponse};
use super::ClassifierGateway;

/// Well-known merchants and keywords the mock recognizes
const KEYWORDS: &[(&str, Category)] = &[
    ("tim hortons", Category::DiningOut),
    ("starbucks", Category::DiningOut),
    ("uber eats", Category::DiningOut),
    ("restaurant", Category::DiningOut),
    ("pizza", Category::DiningOut),
    ("uber", Category::Transportation),
    ("presto", Category::Transportation),
    ("ttc", Category::Transportation),
    ("shell", Category::Transportation),
    ("parking", Category::Transportation),
    ("loblaws", Category::Groceries),
    ("no frills", Category::Groceries),
    ("sobeys", Category::Groceries),
    ("costco", Category::Groceries),
    ("grocery", Category::Groceries),
    ("netflix", Category::Entertainment),
    ("spotify", Category::Entertainment),
    ("cineplex", Category::Entertainment),
    ("amazon", Category::Shopping),
    ("best buy", Category::Shopping),
    ("canadian tire", Category::Shopping),
    ("hydro", Category::Utilities),
    ("rogers", Category::Utilities),
    ("bell", Category::Utilities),
    ("rent payment", Category::Housing),
    ("mortgage", Category::Housing),
    ("pharmacy", Category::HealthWellness),
    ("shoppers drug mart", Category::HealthWellness),
    ("dental", Category::HealthWellness),
    ("payroll", Category::Income),
    ("salary", Category::Income),
    ("e-transfer", Category::Transfers),
    ("service fee", Category::Services),
    ("insurance", Category::Services),
];

/// How the mock answers
#[derive(Debug, Clone, PartialEq)]
pub enum MockBehavior {
    /// Keyword table, `Other` when nothing matches
    Keywords,
    /// Always answer with one category
    Fixed(Category),
    /// Every call fails with `ClassifierUnavailable`
    Unavailable,
    /// Every call returns a label outside the taxonomy
    Malformed,
    /// Fail with `ClassifierUnavailable` when the text contains this substring
    FailOn(String),
}

/// Mock classifier backend
#[derive(Clone)]
pub struct MockClassifier {
    behavior: MockBehavior,
    delay: Option<Duration>,
    /// Whether health_check should return true
    pub healthy: bool,
    calls: Arc<AtomicUsize>,
}

impl Default for MockClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl MockClassifier {
    /// Create a new mock classifier (healthy, keyword answers)
    pub fn new() -> Self {
        Self {
            behavior: MockBehavior::Keywords,
            delay: None,
            healthy: true,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_behavior(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            ..Self::new()
        }
    }

    pub fn fixed(category: Category) -> Self {
        Self::with_behavior(MockBehavior::Fixed(category))
    }

    /// Unreachable classifier: calls fail and the health check reports down
    pub fn unavailable() -> Self {
        Self {
            healthy: false,
            ..Self::with_behavior(MockBehavior::Unavailable)
        }
    }

    pub fn malformed() -> Self {
        Self::with_behavior(MockBehavior::Malformed)
    }

    pub fn failing_on(needle: &str) -> Self {
        Self::with_behavior(MockBehavior::FailOn(needle.to_lowercase()))
    }

    /// Sleep before answering (timeout tests)
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of classify calls made through this mock and its clones
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Category the keyword table assigns to a text
    pub fn keyword_category(text: &str) -> Category {
        let lower = text.to_lowercase();
        KEYWORDS
            .iter()
            .find(|(needle, _)| lower.contains(needle))
            .map(|(_, category)| *category)
            .unwrap_or(Category::Other)
    }
}

#[async_trait]
impl ClassifierGateway for MockClassifier {
    async fn classify(&self, prompt: &ClassificationPrompt) -> Result<ClassifierResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let text = prompt.transaction_text.to_lowercase();
        let category = match &self.behavior {
            MockBehavior::Keywords => Self::keyword_category(&text),
            MockBehavior::Fixed(category) => *category,
            MockBehavior::Unavailable => {
                return Err(Error::ClassifierUnavailable(
                    "mock classifier offline".into(),
                ))
            }
            MockBehavior::Malformed => {
                return Err(Error::InvalidClassifierResponse(
                    "Label outside the taxonomy | Raw: {\"category\": \"Crypto\"}".into(),
                ))
            }
            MockBehavior::FailOn(needle) => {
                if text.contains(needle.as_str()) {
                    return Err(Error::ClassifierUnavailable(format!(
                        "mock classifier refused {}",
                        needle
                    )));
                }
                Self::keyword_category(&text)
            }
        };

        Ok(ClassifierResponse {
            category,
            token_usage: TokenUsage::new(prompt.estimated_tokens(), 6),
        })
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn model(&self) -> &str {
        "mock"
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompt(text: &str) -> ClassificationPrompt {
        ClassificationPrompt::for_description(text)
    }

    #[tokio::test]
    async fn test_keyword_answers() {
        let mock = MockClassifier::new();
        let response = mock.classify(&prompt("loblaws #1042 toronto")).await.unwrap();
        assert_eq!(response.category, Category::Groceries);
        assert!(response.token_usage.total > 0);

        let response = mock.classify(&prompt("zzz unknown")).await.unwrap();
        assert_eq!(response.category, Category::Other);
    }

    #[tokio::test]
    async fn test_clones_share_call_counter() {
        let mock = MockClassifier::fixed(Category::Shopping);
        let clone = mock.clone();
        clone.classify(&prompt("a")).await.unwrap();
        mock.classify(&prompt("b")).await.unwrap();
        assert_eq!(mock.call_count(), 2);
        assert_eq!(clone.call_count(), 2);
    }

    #[tokio::test]
    async fn test_failure_modes() {
        let err = MockClassifier::unavailable()
            .classify(&prompt("netflix"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ClassifierUnavailable(_)));

        let err = MockClassifier::malformed()
            .classify(&prompt("netflix"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidClassifierResponse(_)));

        let mock = MockClassifier::failing_on("flaky");
        assert!(mock.classify(&prompt("FLAKY merchant")).await.is_err());
        assert!(mock.classify(&prompt("netflix")).await.is_ok());
    }

    #[tokio::test]
    async fn test_health_check() {
        assert!(MockClassifier::new().health_check().await);
        assert!(!MockClassifier::unavailable().health_check().await);
    }
}
