//! Domain models for Tally

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The fixed spending taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    Groceries,
    Transportation,
    Housing,
    Utilities,
    #[serde(rename = "Dining Out")]
    DiningOut,
    Entertainment,
    Shopping,
    #[serde(rename = "Health & Wellness")]
    HealthWellness,
    Services,
    Income,
    Transfers,
    Other,
}

impl Category {
    pub const ALL: [Category; 12] = [
        Self::Groceries,
        Self::Transportation,
        Self::Housing,
        Self::Utilities,
        Self::DiningOut,
        Self::Entertainment,
        Self::Shopping,
        Self::HealthWellness,
        Self::Services,
        Self::Income,
        Self::Transfers,
        Self::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Groceries => "Groceries",
            Self::Transportation => "Transportation",
            Self::Housing => "Housing",
            Self::Utilities => "Utilities",
            Self::DiningOut => "Dining Out",
            Self::Entertainment => "Entertainment",
            Self::Shopping => "Shopping",
            Self::HealthWellness => "Health & Wellness",
            Self::Services => "Services",
            Self::Income => "Income",
            Self::Transfers => "Transfers",
            Self::Other => "Other",
        }
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    /// Accepts display names and the loose spellings models tend to emit
    /// (`dining_out`, `DINING-OUT`, `health and wellness`, `transfer`).
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let folded: String = s
            .trim()
            .to_lowercase()
            .replace('&', " and ")
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { ' ' })
            .collect();
        let key = folded.split_whitespace().collect::<Vec<_>>().join(" ");

        match key.as_str() {
            "groceries" | "grocery" => Ok(Self::Groceries),
            "transportation" | "transport" => Ok(Self::Transportation),
            "housing" => Ok(Self::Housing),
            "utilities" | "utility" => Ok(Self::Utilities),
            "dining out" | "dining" => Ok(Self::DiningOut),
            "entertainment" => Ok(Self::Entertainment),
            "shopping" => Ok(Self::Shopping),
            "health and wellness" | "health wellness" | "health" => Ok(Self::HealthWellness),
            "services" | "service" => Ok(Self::Services),
            "income" => Ok(Self::Income),
            "transfers" | "transfer" => Ok(Self::Transfers),
            "other" => Ok(Self::Other),
            _ => Err(format!("Unknown category: {}", s)),
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A bank transaction submitted for categorization
///
/// Owned by the caller; the engine never mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub description: String,
    /// Positive = money out (debit), negative = refund/credit
    pub amount: f64,
    /// `YYYY-MM-DD` or RFC 3339
    pub date: String,
    /// Explicit merchant field, preferred over the description when present
    #[serde(default)]
    pub merchant: Option<String>,
}

impl Transaction {
    pub fn new(id: &str, description: &str, amount: f64, date: &str) -> Self {
        Self {
            id: id.to_string(),
            description: description.to_string(),
            amount,
            date: date.to_string(),
            merchant: None,
        }
    }
}

/// Loosely typed transaction as it arrives from a request body or CSV row
///
/// Every field is optional so that one malformed item never rejects the
/// whole batch. Converting yields a `Transaction` that fails preprocessing
/// when a field is missing or the amount is not numeric.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionInput {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// JSON number or numeric string
    #[serde(default)]
    pub amount: serde_json::Value,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub merchant: Option<String>,
}

impl TransactionInput {
    fn amount(&self) -> f64 {
        match &self.amount {
            serde_json::Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
            serde_json::Value::String(s) => s.trim().parse().unwrap_or(f64::NAN),
            _ => f64::NAN,
        }
    }
}

impl From<TransactionInput> for Transaction {
    fn from(input: TransactionInput) -> Self {
        let amount = input.amount();
        Self {
            id: input.id.unwrap_or_default(),
            description: input.description.unwrap_or_default(),
            amount,
            date: input.date.unwrap_or_default(),
            merchant: input.merchant.filter(|m| !m.trim().is_empty()),
        }
    }
}

/// Where a categorization came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultSource {
    Cache,
    Rule,
    Ai,
    Hybrid,
}

impl ResultSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cache => "cache",
            Self::Rule => "rule",
            Self::Ai => "ai",
            Self::Hybrid => "hybrid",
        }
    }
}

impl std::fmt::Display for ResultSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a result came from the fallback chain instead of a healthy classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    ClassifierUnavailable,
    InvalidClassifierResponse,
    ClassifierNotConfigured,
}

impl FallbackReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClassifierUnavailable => "classifier_unavailable",
            Self::InvalidClassifierResponse => "invalid_classifier_response",
            Self::ClassifierNotConfigured => "classifier_not_configured",
        }
    }
}

/// Token counts reported by the remote classifier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input: u32,
    pub output: u32,
    pub total: u32,
}

impl TokenUsage {
    pub fn new(input: u32, output: u32) -> Self {
        Self {
            input,
            output,
            total: input.saturating_add(output),
        }
    }
}

/// Outcome of classifying one transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorizationResult {
    pub transaction_id: String,
    pub category: Category,
    /// 0.0 - 1.0
    pub confidence: f64,
    /// None only for preprocessing failures (nothing was consulted)
    pub source: Option<ResultSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<FallbackReason>,
    /// Set when preprocessing rejected the transaction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// AI cost incurred for this transaction (USD)
    #[serde(default)]
    pub cost_usd: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
}

impl CategorizationResult {
    /// Terminal result for a transaction that failed validation
    pub fn preprocessing_failed(transaction_id: &str, reason: &str) -> Self {
        Self {
            transaction_id: transaction_id.to_string(),
            category: Category::Other,
            confidence: 0.0,
            source: None,
            fallback: None,
            error: Some(format!("Preprocessing failed: {}", reason)),
            cost_usd: 0.0,
            token_usage: None,
        }
    }

    /// True when the result did not come from a healthy pipeline pass
    pub fn is_degraded(&self) -> bool {
        self.error.is_some() || self.fallback.is_some()
    }

    /// Rejected input or a failed classifier call. Running without a
    /// classifier configured is degraded but not an error.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
            || matches!(
                self.fallback,
                Some(FallbackReason::ClassifierUnavailable)
                    | Some(FallbackReason::InvalidClassifierResponse)
            )
    }
}

/// Provenance of a cached label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheProvenance {
    AiSuggested,
    UserCorrected,
}

impl CacheProvenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AiSuggested => "ai_suggested",
            Self::UserCorrected => "user_corrected",
        }
    }
}

/// A cached fingerprint → category mapping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub category: Category,
    pub expires_at: DateTime<Utc>,
    pub provenance: CacheProvenance,
}

/// Rule tier, in precedence order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleTier {
    Merchant,
    Description,
    Amount,
    Compound,
}

impl RuleTier {
    /// Evaluation order; first tier with a match wins
    pub const PRECEDENCE: [RuleTier; 4] = [
        Self::Merchant,
        Self::Description,
        Self::Amount,
        Self::Compound,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Merchant => "merchant",
            Self::Description => "description",
            Self::Amount => "amount",
            Self::Compound => "compound",
        }
    }
}

impl std::str::FromStr for RuleTier {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "merchant" => Ok(Self::Merchant),
            "description" => Ok(Self::Description),
            "amount" => Ok(Self::Amount),
            "compound" => Ok(Self::Compound),
            _ => Err(format!("Unknown rule tier: {}", s)),
        }
    }
}

impl std::fmt::Display for RuleTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A rule engine hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleMatch {
    pub category: Category,
    /// 0 - 100
    pub confidence: u8,
    pub tier: RuleTier,
    /// Name of the rule that fired
    pub rule: String,
}

impl RuleMatch {
    /// Confidence on the 0.0 - 1.0 scale used by results
    pub fn score(&self) -> f64 {
        f64::from(self.confidence) / 100.0
    }
}

/// A user correction submitted for a transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub transaction_id: String,
    #[serde(default)]
    pub original_category: Option<String>,
    pub corrected_category: String,
    /// Optional 1-5 rating of how confident the user is
    #[serde(default)]
    pub confidence_rating: Option<u8>,
    #[serde(default = "default_feedback_source")]
    pub source: String,
}

fn default_feedback_source() -> String {
    "user".to_string()
}

/// A persisted feedback record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredFeedback {
    pub id: i64,
    pub transaction_id: String,
    pub original_category: Option<String>,
    pub corrected_category: String,
    pub confidence_rating: Option<u8>,
    pub source: String,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

/// What a learning pattern is keyed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternKind {
    Merchant,
    Keyword,
}

impl PatternKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Merchant => "merchant",
            Self::Keyword => "keyword",
        }
    }
}

impl std::str::FromStr for PatternKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "merchant" => Ok(Self::Merchant),
            "keyword" => Ok(Self::Keyword),
            _ => Err(format!("Unknown pattern kind: {}", s)),
        }
    }
}

/// Frequency-weighted learning counter for a merchant or keyword
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningPattern {
    pub kind: PatternKind,
    pub pattern_key: String,
    pub category: Category,
    pub occurrence_count: i64,
    pub success_count: i64,
    /// success_count / occurrence_count
    pub confidence_score: f64,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_round_trips_display_names() {
        for category in Category::ALL {
            let parsed: Category = category.as_str().parse().unwrap();
            assert_eq!(parsed, category);
        }
    }

    #[test]
    fn test_category_loose_spellings() {
        assert_eq!("dining_out".parse::<Category>(), Ok(Category::DiningOut));
        assert_eq!("DINING-OUT".parse::<Category>(), Ok(Category::DiningOut));
        assert_eq!(
            "health and wellness".parse::<Category>(),
            Ok(Category::HealthWellness)
        );
        assert_eq!(
            " Health & Wellness ".parse::<Category>(),
            Ok(Category::HealthWellness)
        );
        assert_eq!("transfer".parse::<Category>(), Ok(Category::Transfers));
        assert!("crypto".parse::<Category>().is_err());
    }

    #[test]
    fn test_category_serde_uses_display_names() {
        let json = serde_json::to_string(&Category::HealthWellness).unwrap();
        assert_eq!(json, "\"Health & Wellness\"");
        let back: Category = serde_json::from_str("\"Dining Out\"").unwrap();
        assert_eq!(back, Category::DiningOut);
    }

    #[test]
    fn test_rule_tier_precedence_order() {
        assert_eq!(
            RuleTier::PRECEDENCE,
            [
                RuleTier::Merchant,
                RuleTier::Description,
                RuleTier::Amount,
                RuleTier::Compound
            ]
        );
    }

    #[test]
    fn test_transaction_input_is_lenient() {
        let input: TransactionInput = serde_json::from_value(serde_json::json!({
            "id": "a", "description": "LOBLAWS", "amount": "12.50", "date": "2024-03-01",
            "merchant": " "
        }))
        .unwrap();
        let tx = Transaction::from(input);
        assert_eq!(tx.amount, 12.5);
        assert!(tx.merchant.is_none());

        let input: TransactionInput =
            serde_json::from_value(serde_json::json!({ "amount": "twelve" })).unwrap();
        let tx = Transaction::from(input);
        assert!(tx.id.is_empty());
        assert!(tx.amount.is_nan());

        let tx = Transaction::from(TransactionInput::default());
        assert!(tx.amount.is_nan());
        assert!(tx.date.is_empty());
    }

    #[test]
    fn test_token_usage_total_saturates() {
        let usage = TokenUsage::new(u32::MAX, 10);
        assert_eq!(usage.total, u32::MAX);
        assert_eq!(TokenUsage::new(120, 8).total, 128);
    }

    #[test]
    fn test_preprocessing_failed_result() {
        let result = CategorizationResult::preprocessing_failed("tx-1", "missing id");
        assert_eq!(result.category, Category::Other);
        assert!(result.source.is_none());
        assert!(result.is_degraded());
        assert!(result.error.unwrap().contains("missing id"));
    }
}
