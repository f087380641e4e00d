//! Deterministic rule matcher
//!
//! Rules come from a TOML rule set (embedded default, overridable from the
//! data dir) and are compiled once. Evaluation walks the tiers in
//! precedence order (merchant, description, amount, compound); inside a
//! tier, rules run in declaration order. First match wins, so for a fixed
//! rule set `find_match` is a pure function of its inputs.

use std::fs;
use std::path::{Path, PathBuf};

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::default_data_dir;
use crate::error::{Error, Result};
use crate::fingerprint::normalize_text;
use crate::models::{Category, RuleMatch, RuleTier};

/// Embedded default rule set (compiled into binary)
const DEFAULT_RULES: &str = include_str!("../../../config/rules.toml");

/// Rule matches at or above this confidence skip the remote classifier
pub const RULE_SHORT_CIRCUIT: u8 = 85;

/// Tolerance for amount comparisons (half a cent)
const AMOUNT_EPSILON: f64 = 0.005;

/// Default rule set override path
pub fn default_rules_path() -> Option<PathBuf> {
    default_data_dir().map(|d| d.join("rules.toml"))
}

/// Direction of money movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AmountSign {
    /// Money out (positive amount)
    Debit,
    /// Money in (negative amount)
    Credit,
}

/// Numeric conditions on a transaction amount; all present conditions must
/// hold
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AmountCondition {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub equals: Option<f64>,
    #[serde(default)]
    pub round_multiple: Option<f64>,
    #[serde(default)]
    pub sign: Option<AmountSign>,
}

impl AmountCondition {
    pub fn matches(&self, amount: f64) -> bool {
        let abs = amount.abs();

        if let Some(sign) = self.sign {
            let ok = match sign {
                AmountSign::Debit => amount > 0.0,
                AmountSign::Credit => amount < 0.0,
            };
            if !ok {
                return false;
            }
        }
        if let Some(min) = self.min {
            if abs + AMOUNT_EPSILON < min {
                return false;
            }
        }
        if let Some(max) = self.max {
            if abs - AMOUNT_EPSILON > max {
                return false;
            }
        }
        if let Some(equals) = self.equals {
            if (abs - equals).abs() > AMOUNT_EPSILON {
                return false;
            }
        }
        if let Some(multiple) = self.round_multiple {
            if abs < AMOUNT_EPSILON {
                return false;
            }
            let remainder = abs % multiple;
            if remainder > AMOUNT_EPSILON && multiple - remainder > AMOUNT_EPSILON {
                return false;
            }
        }
        true
    }

    fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// One rule as written in the rule set file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleDefinition {
    pub name: String,
    pub tier: RuleTier,
    pub category: Category,
    /// 0 - 100
    pub confidence: u8,
    #[serde(default)]
    pub contains: Vec<String>,
    #[serde(default)]
    pub regex: Vec<String>,
    #[serde(default)]
    pub exact: Vec<String>,
    #[serde(default)]
    pub amount: Option<AmountCondition>,
}

/// A rule set file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSetConfig {
    #[serde(default)]
    pub rules: Vec<RuleDefinition>,
}

impl RuleSetConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid rule set: {}", e)))
    }
}

#[derive(Debug, Clone)]
struct CompiledRule {
    name: String,
    tier: RuleTier,
    category: Category,
    confidence: u8,
    contains: Vec<String>,
    regexes: Vec<Regex>,
    exact: Vec<String>,
    amount: Option<AmountCondition>,
}

impl CompiledRule {
    fn compile(def: RuleDefinition) -> Result<Self> {
        if def.confidence > 100 {
            return Err(Error::Config(format!(
                "Rule '{}': confidence must be 0-100 (got {})",
                def.name, def.confidence
            )));
        }
        if def.tier == RuleTier::Amount && def.confidence >= RULE_SHORT_CIRCUIT {
            return Err(Error::Config(format!(
                "Rule '{}': amount rules must stay below {} (got {})",
                def.name, RULE_SHORT_CIRCUIT, def.confidence
            )));
        }

        let amount = def.amount.filter(|a| !a.is_empty());
        if let Some(multiple) = amount.as_ref().and_then(|a| a.round_multiple) {
            if multiple <= 0.0 {
                return Err(Error::Config(format!(
                    "Rule '{}': round_multiple must be positive",
                    def.name
                )));
            }
        }

        let regexes = def
            .regex
            .iter()
            .map(|p| {
                RegexBuilder::new(p)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| Error::Config(format!("Rule '{}': bad regex {}: {}", def.name, p, e)))
            })
            .collect::<Result<Vec<_>>>()?;

        let contains: Vec<String> = def
            .contains
            .iter()
            .map(|p| p.to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        let exact: Vec<String> = def.exact.iter().map(|p| normalize_text(p)).collect();

        let has_patterns = !contains.is_empty() || !regexes.is_empty() || !exact.is_empty();
        if !has_patterns && amount.is_none() {
            return Err(Error::Config(format!(
                "Rule '{}' has neither patterns nor amount conditions",
                def.name
            )));
        }

        Ok(Self {
            name: def.name,
            tier: def.tier,
            category: def.category,
            confidence: def.confidence,
            contains,
            regexes,
            exact,
            amount,
        })
    }

    fn has_patterns(&self) -> bool {
        !self.contains.is_empty() || !self.regexes.is_empty() || !self.exact.is_empty()
    }

    /// `subject` is already normalized
    fn matches(&self, subject: &str, amount: f64) -> bool {
        if self.has_patterns() {
            let hit = self.contains.iter().any(|p| subject.contains(p.as_str()))
                || self.regexes.iter().any(|re| re.is_match(subject))
                || self.exact.iter().any(|p| p == subject);
            if !hit {
                return false;
            }
        }
        match &self.amount {
            Some(cond) => cond.matches(amount),
            None => true,
        }
    }

    fn to_match(&self) -> RuleMatch {
        RuleMatch {
            category: self.category,
            confidence: self.confidence,
            tier: self.tier,
            rule: self.name.clone(),
        }
    }
}

/// Compiled, immutable rule set
#[derive(Debug, Clone)]
pub struct PatternRuleMatcher {
    /// Sorted by tier precedence, declaration order preserved within a tier
    rules: Vec<CompiledRule>,
}

impl PatternRuleMatcher {
    pub fn from_config(config: RuleSetConfig) -> Result<Self> {
        let mut rules = config
            .rules
            .into_iter()
            .map(CompiledRule::compile)
            .collect::<Result<Vec<_>>>()?;
        // Stable sort keeps declaration order inside each tier
        rules.sort_by_key(|r| r.tier);
        Ok(Self { rules })
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Self::from_config(RuleSetConfig::from_toml_str(content)?)
    }

    /// The compiled-in default rule set
    pub fn embedded() -> Result<Self> {
        Self::from_toml_str(DEFAULT_RULES)
    }

    /// Explicit path, then data-dir override, then embedded defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let content = match explicit {
            Some(path) => fs::read_to_string(path).map_err(|e| {
                Error::Config(format!("Failed to read rules {}: {}", path.display(), e))
            })?,
            None => match default_rules_path() {
                Some(path) if path.exists() => fs::read_to_string(&path).map_err(|e| {
                    Error::Config(format!("Failed to read rules {}: {}", path.display(), e))
                })?,
                _ => DEFAULT_RULES.to_string(),
            },
        };
        let matcher = Self::from_toml_str(&content)?;
        debug!(rules = matcher.len(), "Loaded rule set");
        Ok(matcher)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// First matching rule in precedence order, or None
    pub fn find_match(&self, description: &str, amount: f64) -> Option<RuleMatch> {
        let subject = normalize_text(description);
        self.rules
            .iter()
            .find(|r| r.matches(&subject, amount))
            .map(CompiledRule::to_match)
    }

    /// Every matching rule in precedence order (dry-run diagnostics)
    pub fn all_matches(&self, description: &str, amount: f64) -> Vec<RuleMatch> {
        let subject = normalize_text(description);
        self.rules
            .iter()
            .filter(|r| r.matches(&subject, amount))
            .map(CompiledRule::to_match)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher() -> PatternRuleMatcher {
        PatternRuleMatcher::embedded().unwrap()
    }

    #[test]
    fn test_embedded_rules_compile() {
        let m = matcher();
        assert!(m.len() > 20);
    }

    #[test]
    fn test_tim_hortons_is_a_merchant_short_circuit() {
        let hit = matcher()
            .find_match("TIM HORTONS #123 TORONTO ON", 5.50)
            .unwrap();
        assert_eq!(hit.category, Category::DiningOut);
        assert_eq!(hit.confidence, 93);
        assert_eq!(hit.tier, RuleTier::Merchant);
        assert!(hit.confidence >= RULE_SHORT_CIRCUIT);
    }

    #[test]
    fn test_unknown_merchant_has_no_rule() {
        assert!(matcher().find_match("UNKNOWN MERCHANT XYZ", 25.99).is_none());
    }

    #[test]
    fn test_matching_is_deterministic() {
        let m = matcher();
        let a = m.find_match("PAYROLL DEPOSIT ACME CORP", -2500.0);
        let b = m.find_match("PAYROLL DEPOSIT ACME CORP", -2500.0);
        assert_eq!(a, b);
        let hit = a.unwrap();
        assert_eq!(hit.category, Category::Income);
        assert_eq!(hit.tier, RuleTier::Description);
    }

    #[test]
    fn test_declaration_order_breaks_ties() {
        // Both food_delivery and rideshare contain "uber"; food_delivery is declared first
        let hit = matcher().find_match("UBER EATS TORONTO", 31.20).unwrap();
        assert_eq!(hit.category, Category::DiningOut);
        assert_eq!(hit.rule, "food_delivery");

        let ride = matcher().find_match("UBER *TRIP HELP.UBER.COM", 18.40).unwrap();
        assert_eq!(ride.category, Category::Transportation);
    }

    #[test]
    fn test_merchant_tier_beats_description_tier() {
        // "internet" alone would hit a description-tier Utilities rule
        let hit = matcher().find_match("ROGERS INTERNET", 85.0).unwrap();
        assert_eq!(hit.tier, RuleTier::Merchant);
        assert_eq!(hit.category, Category::Utilities);
    }

    #[test]
    fn test_amount_tier_stays_below_short_circuit() {
        let fare = matcher().find_match("POS 00421 RDR", 3.35).unwrap();
        assert_eq!(fare.tier, RuleTier::Amount);
        assert_eq!(fare.category, Category::Transportation);
        assert!(fare.confidence < RULE_SHORT_CIRCUIT);

        // Sign matters: a 3.35 credit is not a fare
        assert!(matcher().find_match("POS 00421 RDR", -3.35).is_none());
    }

    #[test]
    fn test_compound_tier() {
        let deposit = matcher().find_match("MOBILE DEPOSIT", -750.0).unwrap();
        assert_eq!(deposit.tier, RuleTier::Compound);
        assert_eq!(deposit.category, Category::Income);

        // Small deposits do not qualify
        assert!(matcher().find_match("MOBILE DEPOSIT", -40.0).is_none());

        let refund = matcher().find_match("REFUND ORDER 5521", -42.10).unwrap();
        assert_eq!(refund.category, Category::Shopping);
    }

    #[test]
    fn test_all_matches_lists_candidates_in_order() {
        let all = matcher().all_matches("UBER EATS", 20.0);
        assert!(all.len() >= 2);
        assert_eq!(all[0].rule, "food_delivery");
        assert_eq!(all[1].rule, "rideshare");
    }

    #[test]
    fn test_amount_condition() {
        let round = AmountCondition {
            round_multiple: Some(100.0),
            min: Some(100.0),
            ..Default::default()
        };
        assert!(round.matches(300.0));
        assert!(round.matches(-300.0));
        assert!(!round.matches(350.0));
        assert!(!round.matches(0.0));

        let range = AmountCondition {
            min: Some(10.0),
            max: Some(20.0),
            sign: Some(AmountSign::Debit),
            ..Default::default()
        };
        assert!(range.matches(10.0));
        assert!(range.matches(20.0));
        assert!(!range.matches(20.5));
        assert!(!range.matches(-15.0));
    }

    #[test]
    fn test_exact_and_custom_rules() {
        let toml = r#"
            [[rules]]
            name = "gym"
            tier = "description"
            category = "Health & Wellness"
            confidence = 80
            exact = ["ANYTIME   FITNESS"]

            [[rules]]
            name = "first_merchant"
            tier = "merchant"
            category = "Shopping"
            confidence = 90
            contains = ["acme"]
        "#;
        let m = PatternRuleMatcher::from_toml_str(toml).unwrap();
        assert_eq!(m.len(), 2);

        let hit = m.find_match("anytime fitness", 30.0).unwrap();
        assert_eq!(hit.rule, "gym");
        assert!(m.find_match("anytime fitness club", 30.0).is_none());

        // Merchant tier sorts ahead even though declared second
        let hit = m.find_match("ACME", 1.0).unwrap();
        assert_eq!(hit.tier, RuleTier::Merchant);
    }

    #[test]
    fn test_rule_set_validation() {
        let too_confident = r#"
            [[rules]]
            name = "fare"
            tier = "amount"
            category = "Transportation"
            confidence = 90
            [rules.amount]
            equals = 3.35
        "#;
        assert!(matches!(
            PatternRuleMatcher::from_toml_str(too_confident),
            Err(Error::Config(_))
        ));

        let unknown_key = r#"
            [[rules]]
            name = "x"
            tier = "merchant"
            category = "Shopping"
            confidence = 90
            contains = ["x"]
            priority = 3
        "#;
        assert!(PatternRuleMatcher::from_toml_str(unknown_key).is_err());

        let empty = r#"
            [[rules]]
            name = "nothing"
            tier = "merchant"
            category = "Shopping"
            confidence = 90
        "#;
        assert!(PatternRuleMatcher::from_toml_str(empty).is_err());

        let bad_regex = r#"
            [[rules]]
            name = "broken"
            tier = "description"
            category = "Shopping"
            confidence = 70
            regex = ["(unclosed"]
        "#;
        assert!(PatternRuleMatcher::from_toml_str(bad_regex).is_err());
    }
}
