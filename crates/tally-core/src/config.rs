//! Engine configuration
//!
//! ## Configuration Resolution
//!
//! 1. Explicit path (`--config`), which must exist
//! 2. Override in the data dir (~/.local/share/tally/config.toml)
//! 3. Embedded defaults (compiled into binary)
//!
//! Environment overrides are applied on top, then the whole config is
//! validated once. Unknown keys are rejected in every section.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/tally.toml");

pub const ENV_CLASSIFIER_BACKEND: &str = "TALLY_CLASSIFIER_BACKEND";
pub const ENV_CLASSIFIER_HOST: &str = "TALLY_CLASSIFIER_HOST";
pub const ENV_CLASSIFIER_MODEL: &str = "TALLY_CLASSIFIER_MODEL";
pub const ENV_CLASSIFIER_API_KEY: &str = "TALLY_CLASSIFIER_API_KEY";
pub const ENV_WEBHOOK_URL: &str = "TALLY_WEBHOOK_URL";
pub const ENV_ALERT_EMAIL: &str = "TALLY_ALERT_EMAIL";

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Platform data directory for Tally (~/.local/share/tally)
pub fn default_data_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("tally"))
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    default_data_dir().map(|d| d.join("config.toml"))
}

/// Default database path
pub fn default_db_path() -> PathBuf {
    default_data_dir()
        .map(|d| d.join("tally.db"))
        .unwrap_or_else(|| PathBuf::from("tally.db"))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct CacheConfig {
    pub user_corrected_ttl_days: u64,
    pub ai_suggested_ttl_days: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            user_corrected_ttl_days: 90,
            ai_suggested_ttl_days: 7,
        }
    }
}

impl CacheConfig {
    pub fn user_corrected_ttl(&self) -> Duration {
        Duration::from_secs(self.user_corrected_ttl_days * SECS_PER_DAY)
    }

    pub fn ai_suggested_ttl(&self) -> Duration {
        Duration::from_secs(self.ai_suggested_ttl_days * SECS_PER_DAY)
    }
}

/// Which classifier backend to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierBackendKind {
    Ollama,
    OpenaiCompatible,
    Mock,
}

impl ClassifierBackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::OpenaiCompatible => "openai_compatible",
            Self::Mock => "mock",
        }
    }
}

impl std::str::FromStr for ClassifierBackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai_compatible" | "openai" => Ok(Self::OpenaiCompatible),
            "mock" => Ok(Self::Mock),
            _ => Err(format!("Unknown classifier backend: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ClassifierConfig {
    pub backend: ClassifierBackendKind,
    /// None disables the remote classifier
    pub host: Option<String>,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub max_concurrency: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            backend: ClassifierBackendKind::Ollama,
            host: None,
            model: "llama3.2".to_string(),
            api_key: None,
            timeout_secs: 10,
            max_concurrency: 8,
        }
    }
}

impl ClassifierConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct OrchestratorConfig {
    pub max_batch_size: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 100,
        }
    }
}

/// Token pricing, USD per million tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PricingConfig {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            input_per_million: 0.15,
            output_per_million: 0.60,
        }
    }
}

impl PricingConfig {
    /// Cost of one classifier call
    pub fn cost(&self, input_tokens: u32, output_tokens: u32) -> f64 {
        f64::from(input_tokens) * self.input_per_million / 1_000_000.0
            + f64::from(output_tokens) * self.output_per_million / 1_000_000.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct MetricsConfig {
    pub retention_days: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { retention_days: 30 }
    }
}

impl MetricsConfig {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_days * SECS_PER_DAY)
    }
}

/// The five operational alert thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct AlertThresholds {
    /// Percent; breach when below
    pub accuracy: f64,
    /// USD; breach when above
    pub cost_per_transaction: f64,
    /// Percent; breach when above
    pub error_rate: f64,
    /// Milliseconds; breach when above
    pub latency_ms: f64,
    /// Per minute; breach when below
    pub throughput_per_minute: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            accuracy: 85.0,
            cost_per_transaction: 0.10,
            error_rate: 5.0,
            latency_ms: 2000.0,
            throughput_per_minute: 1.0,
        }
    }
}

impl AlertThresholds {
    pub fn validate(&self) -> Result<()> {
        check_range("alerts.thresholds.accuracy", self.accuracy, 0.0, 100.0)?;
        check_range("alerts.thresholds.error_rate", self.error_rate, 0.0, 100.0)?;
        check_non_negative("alerts.thresholds.cost_per_transaction", self.cost_per_transaction)?;
        check_non_negative("alerts.thresholds.throughput_per_minute", self.throughput_per_minute)?;
        if !(self.latency_ms.is_finite() && self.latency_ms > 0.0) {
            return Err(Error::Config(
                "alerts.thresholds.latency_ms must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Apply a partial update, validating the result before returning it
    pub fn merged(&self, update: &ThresholdsUpdate) -> Result<Self> {
        let merged = Self {
            accuracy: update.accuracy.unwrap_or(self.accuracy),
            cost_per_transaction: update
                .cost_per_transaction
                .unwrap_or(self.cost_per_transaction),
            error_rate: update.error_rate.unwrap_or(self.error_rate),
            latency_ms: update.latency_ms.unwrap_or(self.latency_ms),
            throughput_per_minute: update
                .throughput_per_minute
                .unwrap_or(self.throughput_per_minute),
        };
        merged.validate()?;
        Ok(merged)
    }
}

/// Partial threshold update; unknown keys are rejected
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThresholdsUpdate {
    #[serde(default)]
    pub accuracy: Option<f64>,
    #[serde(default)]
    pub cost_per_transaction: Option<f64>,
    #[serde(default)]
    pub error_rate: Option<f64>,
    #[serde(default)]
    pub latency_ms: Option<f64>,
    #[serde(default)]
    pub throughput_per_minute: Option<f64>,
}

impl ThresholdsUpdate {
    /// Set one field by name (`accuracy=80`, used by the CLI)
    pub fn set(&mut self, key: &str, value: f64) -> Result<()> {
        let slot = match key {
            "accuracy" => &mut self.accuracy,
            "cost_per_transaction" | "cost" => &mut self.cost_per_transaction,
            "error_rate" => &mut self.error_rate,
            "latency_ms" | "latency" => &mut self.latency_ms,
            "throughput_per_minute" | "throughput" => &mut self.throughput_per_minute,
            _ => return Err(Error::Config(format!("Unknown threshold: {}", key))),
        };
        *slot = Some(value);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct AlertsConfig {
    pub history_days: u64,
    pub thresholds: AlertThresholds,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            history_days: 7,
            thresholds: AlertThresholds::default(),
        }
    }
}

impl AlertsConfig {
    pub fn history_ttl(&self) -> Duration {
        Duration::from_secs(self.history_days * SECS_PER_DAY)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct NotificationsConfig {
    pub webhook_url: Option<String>,
    pub email: Option<String>,
    pub email_relay_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            email: None,
            email_relay_url: None,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub interval_secs: u64,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 300,
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct TallyConfig {
    pub cache: CacheConfig,
    pub classifier: ClassifierConfig,
    pub orchestrator: OrchestratorConfig,
    pub pricing: PricingConfig,
    pub metrics: MetricsConfig,
    pub alerts: AlertsConfig,
    pub notifications: NotificationsConfig,
    pub monitoring: MonitoringConfig,
}

impl TallyConfig {
    /// Resolve, apply environment overrides, and validate
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let content = match explicit {
            Some(path) => fs::read_to_string(path).map_err(|e| {
                Error::Config(format!("Failed to read config {}: {}", path.display(), e))
            })?,
            None => match default_config_path() {
                Some(path) if path.exists() => fs::read_to_string(&path).map_err(|e| {
                    Error::Config(format!("Failed to read config {}: {}", path.display(), e))
                })?,
                _ => DEFAULT_CONFIG.to_string(),
            },
        };

        let mut config = Self::from_toml_str(&content)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse without environment overrides or validation
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid config: {}", e)))
    }

    /// The compiled-in defaults
    pub fn embedded() -> Result<Self> {
        Self::from_toml_str(DEFAULT_CONFIG)
    }

    /// Apply overrides from an environment-like lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(backend) = non_empty(ENV_CLASSIFIER_BACKEND) {
            self.classifier.backend = backend
                .parse()
                .map_err(|e: String| Error::Config(format!("{}: {}", ENV_CLASSIFIER_BACKEND, e)))?;
        }
        if let Some(host) = non_empty(ENV_CLASSIFIER_HOST) {
            self.classifier.host = Some(host);
        }
        if let Some(model) = non_empty(ENV_CLASSIFIER_MODEL) {
            self.classifier.model = model;
        }
        if let Some(key) = non_empty(ENV_CLASSIFIER_API_KEY) {
            self.classifier.api_key = Some(key);
        }
        if let Some(url) = non_empty(ENV_WEBHOOK_URL) {
            self.notifications.webhook_url = Some(url);
        }
        if let Some(email) = non_empty(ENV_ALERT_EMAIL) {
            self.notifications.email = Some(email);
        }
        Ok(())
    }

    /// Startup validation
    pub fn validate(&self) -> Result<()> {
        if self.cache.ai_suggested_ttl_days == 0 {
            return Err(Error::Config("cache.ai_suggested_ttl_days must be > 0".into()));
        }
        if self.cache.user_corrected_ttl_days < self.cache.ai_suggested_ttl_days {
            return Err(Error::Config(
                "cache.user_corrected_ttl_days must be >= cache.ai_suggested_ttl_days".into(),
            ));
        }
        if self.classifier.timeout_secs == 0 {
            return Err(Error::Config("classifier.timeout_secs must be > 0".into()));
        }
        if self.classifier.max_concurrency == 0 {
            return Err(Error::Config("classifier.max_concurrency must be > 0".into()));
        }
        if self.orchestrator.max_batch_size == 0 {
            return Err(Error::Config("orchestrator.max_batch_size must be >= 1".into()));
        }
        check_non_negative("pricing.input_per_million", self.pricing.input_per_million)?;
        check_non_negative("pricing.output_per_million", self.pricing.output_per_million)?;
        if self.metrics.retention_days == 0 {
            return Err(Error::Config("metrics.retention_days must be > 0".into()));
        }
        if self.alerts.history_days == 0 {
            return Err(Error::Config("alerts.history_days must be > 0".into()));
        }
        self.alerts.thresholds.validate()?;
        if self.notifications.timeout_secs == 0 {
            return Err(Error::Config("notifications.timeout_secs must be > 0".into()));
        }
        if self.monitoring.enabled && self.monitoring.interval_secs == 0 {
            return Err(Error::Config("monitoring.interval_secs must be > 0".into()));
        }
        Ok(())
    }
}

fn check_range(name: &str, value: f64, min: f64, max: f64) -> Result<()> {
    if !value.is_finite() || value < min || value > max {
        return Err(Error::Config(format!(
            "{} must be between {} and {} (got {})",
            name, min, max, value
        )));
    }
    Ok(())
}

fn check_non_negative(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(Error::Config(format!(
            "{} must be a non-negative number (got {})",
            name, value
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_embedded_config_is_valid() {
        let config = TallyConfig::embedded().unwrap();
        config.validate().unwrap();
        assert_eq!(config.cache.user_corrected_ttl_days, 90);
        assert_eq!(config.cache.ai_suggested_ttl_days, 7);
        assert_eq!(config.orchestrator.max_batch_size, 100);
        assert_eq!(config.classifier.timeout_secs, 10);
        assert!(config.classifier.host.is_none());
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let err = TallyConfig::from_toml_str("[cache]\nuser_ttl = 3\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = TallyConfig::from_toml_str("[bogus]\nx = 1\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_partial_file_falls_back_to_defaults() {
        let config = TallyConfig::from_toml_str("[classifier]\nmodel = \"qwen2.5\"\n").unwrap();
        assert_eq!(config.classifier.model, "qwen2.5");
        assert_eq!(config.classifier.timeout_secs, 10);
        assert_eq!(config.alerts.thresholds.accuracy, 85.0);
    }

    #[test]
    fn test_ttl_ordering_is_validated() {
        let mut config = TallyConfig::default();
        config.cache.user_corrected_ttl_days = 3;
        config.cache.ai_suggested_ttl_days = 7;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_CLASSIFIER_BACKEND, "openai-compatible"),
            (ENV_CLASSIFIER_HOST, "http://localhost:8080"),
            (ENV_CLASSIFIER_MODEL, "gpt-4o-mini"),
            (ENV_WEBHOOK_URL, "http://hooks.local/x"),
            (ENV_ALERT_EMAIL, "  "),
        ]
        .into_iter()
        .collect();

        let mut config = TallyConfig::default();
        config
            .apply_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(
            config.classifier.backend,
            ClassifierBackendKind::OpenaiCompatible
        );
        assert_eq!(config.classifier.host.as_deref(), Some("http://localhost:8080"));
        assert_eq!(config.classifier.model, "gpt-4o-mini");
        assert_eq!(
            config.notifications.webhook_url.as_deref(),
            Some("http://hooks.local/x")
        );
        // Blank values are ignored
        assert!(config.notifications.email.is_none());
    }

    #[test]
    fn test_bad_backend_override_is_config_error() {
        let mut config = TallyConfig::default();
        let result = config.apply_overrides(|k| {
            (k == ENV_CLASSIFIER_BACKEND).then(|| "carrier-pigeon".to_string())
        });
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_threshold_merge_validates() {
        let base = AlertThresholds::default();

        let mut update = ThresholdsUpdate::default();
        assert!(update.is_empty());
        update.set("accuracy", 90.0).unwrap();
        let merged = base.merged(&update).unwrap();
        assert_eq!(merged.accuracy, 90.0);
        assert_eq!(merged.latency_ms, base.latency_ms);

        update.set("accuracy", 140.0).unwrap();
        assert!(base.merged(&update).is_err());
        assert!(update.set("vibes", 1.0).is_err());
    }

    #[test]
    fn test_thresholds_update_rejects_unknown_keys() {
        let ok: ThresholdsUpdate = serde_json::from_str(r#"{"latency_ms": 800}"#).unwrap();
        assert_eq!(ok.latency_ms, Some(800.0));

        let bad = serde_json::from_str::<ThresholdsUpdate>(r#"{"latency": 800}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_pricing_cost() {
        let pricing = PricingConfig::default();
        let cost = pricing.cost(1_000_000, 1_000_000);
        assert!((cost - 0.75).abs() < 1e-9);
        assert_eq!(pricing.cost(0, 0), 0.0);
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tally.toml");
        std::fs::write(&path, "[orchestrator]\nmax_batch_size = 25\n").unwrap();

        let config = TallyConfig::load(Some(&path)).unwrap();
        assert_eq!(config.orchestrator.max_batch_size, 25);

        let missing = dir.path().join("nope.toml");
        assert!(TallyConfig::load(Some(&missing)).is_err());
    }
}
