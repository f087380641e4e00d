//! Operational alerts
//!
//! One state machine per alert type: no alert, or one open alert. A fresh
//! metric that breaches its threshold opens an alert (and notifies); a later
//! metric back within threshold, or a manual resolve, closes it. A breach
//! after resolution opens a new alert with a new id.
//!
//! State lives in the key-value store:
//! - `alert:<id>` alert JSON (resolved alerts expire after the history window)
//! - `alerts:active:<type>` id of the open alert for a type
//! - `alerts:index` set of every retained alert id
//! - `alerts:thresholds` persisted threshold overrides

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::{AlertThresholds, AlertsConfig, NotificationsConfig, ThresholdsUpdate};
use crate::error::{Error, Result};
use crate::metrics::PerformanceReport;
use crate::store::KeyValueStore;

const ALERT_PREFIX: &str = "alert:";
const ACTIVE_PREFIX: &str = "alerts:active:";
const INDEX_KEY: &str = "alerts:index";
const THRESHOLDS_KEY: &str = "alerts:thresholds";

// Accuracy bands, percentage points below threshold
const ACCURACY_CRITICAL_GAP: f64 = 10.0;
const ACCURACY_HIGH_GAP: f64 = 5.0;
const ACCURACY_MEDIUM_GAP: f64 = 2.0;

// Multiplicative bands for cost, latency and error rate (value / threshold);
// throughput uses the inverse (threshold / value)
const CRITICAL_RATIO: f64 = 2.0;
const HIGH_RATIO: f64 = 1.5;
const MEDIUM_RATIO: f64 = 1.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    Accuracy,
    Cost,
    ErrorRate,
    Latency,
    Throughput,
}

impl AlertType {
    pub const ALL: [AlertType; 5] = [
        Self::Accuracy,
        Self::Cost,
        Self::ErrorRate,
        Self::Latency,
        Self::Throughput,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accuracy => "accuracy",
            Self::Cost => "cost",
            Self::ErrorRate => "error_rate",
            Self::Latency => "latency",
            Self::Throughput => "throughput",
        }
    }

    /// True when lower values are worse
    fn breaches_below(&self) -> bool {
        matches!(self, Self::Accuracy | Self::Throughput)
    }

    fn threshold(&self, thresholds: &AlertThresholds) -> f64 {
        match self {
            Self::Accuracy => thresholds.accuracy,
            Self::Cost => thresholds.cost_per_transaction,
            Self::ErrorRate => thresholds.error_rate,
            Self::Latency => thresholds.latency_ms,
            Self::Throughput => thresholds.throughput_per_minute,
        }
    }

    fn unit(&self) -> &'static str {
        match self {
            Self::Accuracy | Self::ErrorRate => "%",
            Self::Cost => " USD",
            Self::Latency => "ms",
            Self::Throughput => "/min",
        }
    }
}

impl std::fmt::Display for AlertType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub severity: Severity,
    pub message: String,
    pub current_value: f64,
    pub threshold: f64,
    pub created_at: DateTime<Utc>,
    pub resolved: bool,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Aggregated values an alert check compares against thresholds
///
/// Units match `AlertThresholds`. None means no data in the window; a
/// missing value neither opens nor resolves an alert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub accuracy: Option<f64>,
    pub cost_per_transaction: Option<f64>,
    pub error_rate: Option<f64>,
    pub latency_ms: Option<f64>,
    pub throughput_per_minute: Option<f64>,
}

impl MetricSnapshot {
    pub fn from_report(report: &PerformanceReport) -> Self {
        if !report.has_traffic() {
            return Self::default();
        }
        Self {
            accuracy: report.estimated_accuracy.map(|a| a * 100.0),
            cost_per_transaction: Some(report.avg_cost_per_transaction),
            error_rate: Some(report.error_rate * 100.0),
            latency_ms: Some(report.mean_latency_ms),
            throughput_per_minute: Some(report.throughput_per_minute()),
        }
    }

    pub fn value(&self, alert_type: AlertType) -> Option<f64> {
        match alert_type {
            AlertType::Accuracy => self.accuracy,
            AlertType::Cost => self.cost_per_transaction,
            AlertType::ErrorRate => self.error_rate,
            AlertType::Latency => self.latency_ms,
            AlertType::Throughput => self.throughput_per_minute,
        }
    }
}

/// Whether a value is outside its threshold
pub fn is_breach(alert_type: AlertType, value: f64, threshold: f64) -> bool {
    if alert_type.breaches_below() {
        value < threshold
    } else {
        value > threshold
    }
}

/// Severity from how far a breaching value is past its threshold
pub fn severity_for(alert_type: AlertType, value: f64, threshold: f64) -> Severity {
    match alert_type {
        AlertType::Accuracy => {
            let gap = threshold - value;
            if gap > ACCURACY_CRITICAL_GAP {
                Severity::Critical
            } else if gap > ACCURACY_HIGH_GAP {
                Severity::High
            } else if gap > ACCURACY_MEDIUM_GAP {
                Severity::Medium
            } else {
                Severity::Low
            }
        }
        AlertType::Throughput => {
            if value < threshold / CRITICAL_RATIO {
                Severity::Critical
            } else if value < threshold / HIGH_RATIO {
                Severity::High
            } else if value < threshold / MEDIUM_RATIO {
                Severity::Medium
            } else {
                Severity::Low
            }
        }
        AlertType::Cost | AlertType::ErrorRate | AlertType::Latency => {
            if value > threshold * CRITICAL_RATIO {
                Severity::Critical
            } else if value > threshold * HIGH_RATIO {
                Severity::High
            } else if value > threshold * MEDIUM_RATIO {
                Severity::Medium
            } else {
                Severity::Low
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Log,
    Webhook,
    Email,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::Webhook => "webhook",
            Self::Email => "email",
        }
    }
}

/// Channels for a severity, given what is configured
///
/// Log always; webhook from high; email only for critical.
pub fn channels_for(severity: Severity, notifications: &NotificationsConfig) -> Vec<Channel> {
    let mut channels = vec![Channel::Log];
    if severity >= Severity::High && notifications.webhook_url.is_some() {
        channels.push(Channel::Webhook);
    }
    if severity == Severity::Critical && notifications.email.is_some() {
        channels.push(Channel::Email);
    }
    channels
}

/// Body handed to a notification channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub channel: Channel,
    pub subject: String,
    pub alert: Alert,
}

impl NotificationPayload {
    pub fn new(channel: Channel, alert: &Alert) -> Self {
        Self {
            channel,
            subject: format!(
                "[tally] {} {} alert",
                alert.severity.as_str().to_uppercase(),
                alert.alert_type
            ),
            alert: alert.clone(),
        }
    }
}

/// Best-effort delivery of alert notifications
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    async fn send(&self, payload: &NotificationPayload) -> Result<()>;
}

#[derive(Debug, Serialize)]
struct EmailRequest<'a> {
    to: &'a str,
    subject: &'a str,
    body: String,
}

/// Log via tracing, webhook via JSON POST, email via an HTTP relay
pub struct DefaultTransport {
    http_client: Client,
    config: NotificationsConfig,
}

impl DefaultTransport {
    pub fn new(config: &NotificationsConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http_client,
            config: config.clone(),
        })
    }

    async fn post_json<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> Result<()> {
        let response = self
            .http_client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Notification(format!("POST {} failed: {}", url, e)))?;
        if !response.status().is_success() {
            return Err(Error::Notification(format!(
                "POST {} returned {}",
                url,
                response.status()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationTransport for DefaultTransport {
    async fn send(&self, payload: &NotificationPayload) -> Result<()> {
        match payload.channel {
            Channel::Log => {
                let alert = &payload.alert;
                warn!(
                    alert_id = %alert.id,
                    alert_type = %alert.alert_type,
                    severity = %alert.severity,
                    current_value = alert.current_value,
                    threshold = alert.threshold,
                    "{}",
                    alert.message
                );
                Ok(())
            }
            Channel::Webhook => {
                let url = self
                    .config
                    .webhook_url
                    .as_deref()
                    .ok_or_else(|| Error::Notification("no webhook_url configured".into()))?;
                self.post_json(url, payload).await
            }
            Channel::Email => {
                let to = self
                    .config
                    .email
                    .as_deref()
                    .ok_or_else(|| Error::Notification("no email configured".into()))?;
                let relay = self
                    .config
                    .email_relay_url
                    .as_deref()
                    .ok_or_else(|| Error::Notification("no email_relay_url configured".into()))?;
                let request = EmailRequest {
                    to,
                    subject: &payload.subject,
                    body: payload.alert.message.clone(),
                };
                self.post_json(relay, &request).await
            }
        }
    }
}

/// What one evaluation changed
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvaluationOutcome {
    pub opened: Vec<Alert>,
    pub resolved: Vec<Alert>,
}

pub struct AlertEngine {
    store: Arc<dyn KeyValueStore>,
    transport: Arc<dyn NotificationTransport>,
    notifications: NotificationsConfig,
    default_thresholds: AlertThresholds,
    history_ttl: Duration,
    /// Held for a whole evaluation pass so concurrent checks cannot both
    /// open an alert for the same type
    evaluating: tokio::sync::Mutex<()>,
}

impl AlertEngine {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        transport: Arc<dyn NotificationTransport>,
        alerts: &AlertsConfig,
        notifications: &NotificationsConfig,
    ) -> Self {
        Self {
            store,
            transport,
            notifications: notifications.clone(),
            default_thresholds: alerts.thresholds,
            history_ttl: alerts.history_ttl(),
            evaluating: tokio::sync::Mutex::new(()),
        }
    }

    fn alert_key(id: &str) -> String {
        format!("{}{}", ALERT_PREFIX, id)
    }

    fn active_key(alert_type: AlertType) -> String {
        format!("{}{}", ACTIVE_PREFIX, alert_type.as_str())
    }

    /// Persisted thresholds, falling back to the configured ones
    pub fn try_thresholds(&self) -> Result<AlertThresholds> {
        match self.store.get(THRESHOLDS_KEY)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(self.default_thresholds),
        }
    }

    pub fn thresholds(&self) -> AlertThresholds {
        self.try_thresholds().unwrap_or_else(|e| {
            warn!(error = %e, "Threshold store unavailable, using configured thresholds");
            self.default_thresholds
        })
    }

    /// Apply a partial update; the result is validated before it is stored
    pub fn update_thresholds(&self, update: &ThresholdsUpdate) -> Result<AlertThresholds> {
        let merged = self.try_thresholds()?.merged(update)?;
        self.store
            .set(THRESHOLDS_KEY, &serde_json::to_string(&merged)?, None)?;
        info!(?merged, "Alert thresholds updated");
        Ok(merged)
    }

    fn load(&self, id: &str) -> Result<Option<Alert>> {
        match self.store.get(&Self::alert_key(id))? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn save(&self, alert: &Alert) -> Result<()> {
        let ttl = if alert.resolved {
            Some(self.history_ttl)
        } else {
            None
        };
        self.store
            .set(&Self::alert_key(&alert.id), &serde_json::to_string(alert)?, ttl)
    }

    fn active_for(&self, alert_type: AlertType) -> Result<Option<Alert>> {
        let id = match self.store.get(&Self::active_key(alert_type))? {
            Some(id) => id,
            None => return Ok(None),
        };
        Ok(self.load(&id)?.filter(|a| !a.resolved))
    }

    /// Compare a snapshot with the thresholds, opening and resolving alerts
    pub async fn evaluate(&self, snapshot: &MetricSnapshot) -> Result<EvaluationOutcome> {
        let _pass = self.evaluating.lock().await;
        let thresholds = self.try_thresholds()?;
        let mut outcome = EvaluationOutcome::default();

        for alert_type in AlertType::ALL {
            let value = match snapshot.value(alert_type) {
                Some(value) => value,
                None => continue,
            };
            let threshold = alert_type.threshold(&thresholds);
            let active = self.active_for(alert_type)?;

            match (is_breach(alert_type, value, threshold), active) {
                (true, None) => {
                    let alert = self.open(alert_type, value, threshold)?;
                    self.notify(&alert).await;
                    outcome.opened.push(alert);
                }
                (false, Some(alert)) => {
                    let resolved = self.close(alert)?;
                    info!(alert_id = %resolved.id, alert_type = %alert_type, value, "Alert resolved automatically");
                    outcome.resolved.push(resolved);
                }
                // Still breaching, or still healthy
                _ => {}
            }
        }
        Ok(outcome)
    }

    fn open(&self, alert_type: AlertType, value: f64, threshold: f64) -> Result<Alert> {
        let severity = severity_for(alert_type, value, threshold);
        let direction = if alert_type.breaches_below() {
            "below"
        } else {
            "above"
        };
        let unit = alert_type.unit();
        let alert = Alert {
            id: Uuid::new_v4().to_string(),
            alert_type,
            severity,
            message: format!(
                "{} is {} threshold: {:.2}{} vs {:.2}{}",
                alert_type, direction, value, unit, threshold, unit
            ),
            current_value: value,
            threshold,
            created_at: Utc::now(),
            resolved: false,
            resolved_at: None,
        };

        self.save(&alert)?;
        self.store.set(&Self::active_key(alert_type), &alert.id, None)?;
        self.store.sadd(INDEX_KEY, &alert.id)?;
        warn!(
            alert_id = %alert.id,
            alert_type = %alert_type,
            severity = %severity,
            value,
            threshold,
            "Alert opened"
        );
        Ok(alert)
    }

    fn close(&self, mut alert: Alert) -> Result<Alert> {
        alert.resolved = true;
        alert.resolved_at = Some(Utc::now());
        self.save(&alert)?;

        let active_key = Self::active_key(alert.alert_type);
        if self.store.get(&active_key)?.as_deref() == Some(alert.id.as_str()) {
            self.store.delete(&active_key)?;
        }
        Ok(alert)
    }

    /// Deliver to every selected channel; failures are logged per channel
    async fn notify(&self, alert: &Alert) {
        for channel in channels_for(alert.severity, &self.notifications) {
            let payload = NotificationPayload::new(channel, alert);
            if let Err(e) = self.transport.send(&payload).await {
                error!(
                    alert_id = %alert.id,
                    channel = channel.as_str(),
                    error = %e,
                    "Notification failed"
                );
            }
        }
    }

    /// Manually resolve an alert; resolving twice is a no-op
    pub fn resolve_alert(&self, id: &str) -> Result<Alert> {
        let alert = self
            .load(id)?
            .ok_or_else(|| Error::NotFound(format!("alert {}", id)))?;
        if alert.resolved {
            return Ok(alert);
        }
        let resolved = self.close(alert)?;
        info!(alert_id = %id, "Alert resolved manually");
        Ok(resolved)
    }

    /// Every retained alert, newest first
    pub fn try_alert_history(&self) -> Result<Vec<Alert>> {
        let mut alerts = Vec::new();
        for id in self.store.smembers(INDEX_KEY)? {
            match self.load(&id)? {
                Some(alert) => alerts.push(alert),
                // expired out of the history window
                None => self.store.srem(INDEX_KEY, &id)?,
            }
        }
        alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(alerts)
    }

    pub fn try_active_alerts(&self) -> Result<Vec<Alert>> {
        let mut active = Vec::new();
        for alert_type in AlertType::ALL {
            if let Some(alert) = self.active_for(alert_type)? {
                active.push(alert);
            }
        }
        active.sort_by(|a, b| b.severity.cmp(&a.severity).then(b.created_at.cmp(&a.created_at)));
        Ok(active)
    }

    /// Open alerts, most severe first; empty when the store is unavailable
    pub fn active_alerts(&self) -> Vec<Alert> {
        self.try_active_alerts().unwrap_or_else(|e| {
            warn!(error = %e, "Alert store unavailable");
            Vec::new()
        })
    }

    pub fn alert_history(&self) -> Vec<Alert> {
        self.try_alert_history().unwrap_or_else(|e| {
            warn!(error = %e, "Alert store unavailable");
            Vec::new()
        })
    }
}
