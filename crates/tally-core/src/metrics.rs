//! Pipeline metrics
//!
//! Samples are appended to one list per calendar day
//! (`metrics:samples:YYYY-MM-DD`), each list expiring after the retention
//! window. Reports aggregate the samples that fall inside the requested
//! period. Lifetime counters live next to them under `metrics:counter:*`.
//!
//! Recording is best-effort: a failing store is logged and the sample is
//! dropped. Reports degrade to an empty report the same way.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::MetricsConfig;
use crate::error::{Error, Result};
use crate::models::TokenUsage;
use crate::store::KeyValueStore;

const SAMPLES_PREFIX: &str = "metrics:samples:";
const COUNTER_PREFIX: &str = "metrics:counter:";

/// Operational targets used for recommendations
pub const TARGET_COST_PER_TRANSACTION: f64 = 0.10;
pub const TARGET_CACHE_HIT_RATE: f64 = 0.30;
pub const TARGET_LATENCY_MS: f64 = 500.0;
pub const TARGET_ERROR_RATE: f64 = 0.01;
pub const TARGET_THROUGHPUT_PER_MINUTE: f64 = 1000.0;

/// Pipeline step a sample describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// One whole transaction through the pipeline
    Classify,
    CacheLookup,
    ClassifierCall,
    Feedback,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Classify => "classify",
            Self::CacheLookup => "cache_lookup",
            Self::ClassifierCall => "classifier_call",
            Self::Feedback => "feedback",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSample {
    pub timestamp: DateTime<Utc>,
    pub operation: Operation,
    pub duration_ms: f64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<TokenUsage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_hit: Option<bool>,
}

impl MetricSample {
    pub fn new(operation: Operation, duration: Duration, success: bool) -> Self {
        Self {
            timestamp: Utc::now(),
            operation,
            duration_ms: duration.as_secs_f64() * 1000.0,
            success,
            cost: None,
            tokens: None,
            cache_hit: None,
        }
    }

    pub fn with_cache_hit(mut self, hit: bool) -> Self {
        self.cache_hit = Some(hit);
        self
    }

    pub fn with_usage(mut self, tokens: TokenUsage, cost: f64) -> Self {
        self.tokens = Some(tokens);
        self.cost = Some(cost);
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Report window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportPeriod {
    Hour,
    #[default]
    Day,
    Week,
    Month,
}

impl ReportPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
        }
    }

    pub fn duration(&self) -> chrono::Duration {
        match self {
            Self::Hour => chrono::Duration::hours(1),
            Self::Day => chrono::Duration::days(1),
            Self::Week => chrono::Duration::weeks(1),
            Self::Month => chrono::Duration::days(30),
        }
    }

    pub fn seconds(&self) -> f64 {
        self.duration().num_seconds() as f64
    }
}

impl std::str::FromStr for ReportPeriod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hour" | "1h" => Ok(Self::Hour),
            "day" | "24h" => Ok(Self::Day),
            "week" | "7d" => Ok(Self::Week),
            "month" | "30d" => Ok(Self::Month),
            _ => Err(format!("Unknown report period: {} (use hour, day, week or month)", s)),
        }
    }
}

impl std::fmt::Display for ReportPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Monotonic counters since the store was created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifetimeCounters {
    pub classifications: i64,
    pub cache_hits: i64,
    pub cache_lookups: i64,
    pub classifier_calls: i64,
    pub corrections: i64,
}

impl LifetimeCounters {
    const NAMES: [&'static str; 5] = [
        "classifications",
        "cache_hits",
        "cache_lookups",
        "classifier_calls",
        "corrections",
    ];
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperationStats {
    pub count: u64,
    pub errors: u64,
    pub mean_latency_ms: f64,
}

/// Aggregated view of one report window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub period: ReportPeriod,
    pub window_start: DateTime<Utc>,
    pub generated_at: DateTime<Utc>,
    /// Transactions classified in the window
    pub total: u64,
    pub successes: u64,
    pub errors: u64,
    pub success_rate: f64,
    pub error_rate: f64,
    pub cache_hits: u64,
    pub cache_lookups: u64,
    pub cache_hit_rate: f64,
    pub mean_latency_ms: f64,
    pub p50_latency_ms: f64,
    pub p95_latency_ms: f64,
    pub total_cost_usd: f64,
    pub avg_cost_per_transaction: f64,
    pub total_tokens: u64,
    /// Transactions per second over the whole period
    pub throughput: f64,
    pub corrections: u64,
    /// `1 - corrections / total`; None without traffic
    pub estimated_accuracy: Option<f64>,
    pub operations: BTreeMap<Operation, OperationStats>,
    pub counters: LifetimeCounters,
    pub recommendations: Vec<String>,
}

impl PerformanceReport {
    pub fn empty(period: ReportPeriod, now: DateTime<Utc>) -> Self {
        aggregate(period, now, &[], LifetimeCounters::default())
    }

    pub fn throughput_per_minute(&self) -> f64 {
        self.throughput * 60.0
    }

    pub fn has_traffic(&self) -> bool {
        self.total > 0
    }
}

/// Nearest-rank percentile of an ascending slice (0.0 when empty)
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (p * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Aggregate samples already filtered to the report window
pub fn aggregate(
    period: ReportPeriod,
    now: DateTime<Utc>,
    samples: &[MetricSample],
    counters: LifetimeCounters,
) -> PerformanceReport {
    let mut operations: BTreeMap<Operation, OperationStats> = BTreeMap::new();
    let mut latencies = Vec::new();
    let mut successes = 0u64;
    let mut cache_hits = 0u64;
    let mut cache_lookups = 0u64;
    let mut total_cost = 0.0;
    let mut total_tokens = 0u64;
    let mut corrections = 0u64;

    for sample in samples {
        let stats = operations.entry(sample.operation).or_default();
        stats.count += 1;
        if !sample.success {
            stats.errors += 1;
        }
        // running mean
        stats.mean_latency_ms += (sample.duration_ms - stats.mean_latency_ms) / stats.count as f64;

        match sample.operation {
            Operation::Classify => {
                latencies.push(sample.duration_ms);
                if sample.success {
                    successes += 1;
                }
            }
            Operation::Feedback => corrections += 1,
            _ => {}
        }
        if let Some(hit) = sample.cache_hit {
            cache_lookups += 1;
            if hit {
                cache_hits += 1;
            }
        }
        if let Some(cost) = sample.cost {
            total_cost += cost;
        }
        if let Some(tokens) = sample.tokens {
            total_tokens += u64::from(tokens.total);
        }
    }

    latencies.sort_by(|a, b| a.total_cmp(b));
    let total = latencies.len() as u64;
    let errors = total - successes;
    let mean_latency_ms = if latencies.is_empty() {
        0.0
    } else {
        latencies.iter().sum::<f64>() / latencies.len() as f64
    };

    let mut report = PerformanceReport {
        period,
        window_start: now - period.duration(),
        generated_at: now,
        total,
        successes,
        errors,
        success_rate: ratio(successes, total),
        error_rate: ratio(errors, total),
        cache_hits,
        cache_lookups,
        cache_hit_rate: ratio(cache_hits, cache_lookups),
        mean_latency_ms,
        p50_latency_ms: percentile(&latencies, 0.50),
        p95_latency_ms: percentile(&latencies, 0.95),
        total_cost_usd: total_cost,
        avg_cost_per_transaction: if total == 0 { 0.0 } else { total_cost / total as f64 },
        total_tokens,
        throughput: total as f64 / period.seconds(),
        corrections,
        estimated_accuracy: if total == 0 {
            None
        } else {
            Some((1.0 - corrections as f64 / total as f64).max(0.0))
        },
        operations,
        counters,
        recommendations: Vec::new(),
    };
    report.recommendations = recommendations(&report);
    report
}

/// One suggestion per missed operational target
pub fn recommendations(report: &PerformanceReport) -> Vec<String> {
    let mut out = Vec::new();
    if !report.has_traffic() {
        return out;
    }

    if report.avg_cost_per_transaction > TARGET_COST_PER_TRANSACTION {
        out.push(format!(
            "Average cost per transaction ${:.4} exceeds ${:.2}: add merchant rules for frequent classifier hits",
            report.avg_cost_per_transaction, TARGET_COST_PER_TRANSACTION
        ));
    }
    if report.cache_lookups > 0 && report.cache_hit_rate < TARGET_CACHE_HIT_RATE {
        out.push(format!(
            "Cache hit rate {:.1}% is below {:.0}%: review cache TTLs or pre-warm common merchants",
            report.cache_hit_rate * 100.0,
            TARGET_CACHE_HIT_RATE * 100.0
        ));
    }
    if report.mean_latency_ms > TARGET_LATENCY_MS {
        out.push(format!(
            "Mean latency {:.0}ms exceeds {:.0}ms: check classifier response times",
            report.mean_latency_ms, TARGET_LATENCY_MS
        ));
    }
    if report.error_rate > TARGET_ERROR_RATE {
        out.push(format!(
            "Error rate {:.1}% exceeds {:.0}%: check classifier availability and input validation",
            report.error_rate * 100.0,
            TARGET_ERROR_RATE * 100.0
        ));
    }
    if report.throughput_per_minute() < TARGET_THROUGHPUT_PER_MINUTE {
        out.push(format!(
            "Throughput {:.1}/min is below {:.0}/min: raise classifier concurrency or batch more",
            report.throughput_per_minute(),
            TARGET_THROUGHPUT_PER_MINUTE
        ));
    }
    out
}

/// Render a report in the Prometheus text exposition format
///
/// Fixed metric order; each metric is exactly a HELP line, a TYPE line and
/// a value line.
pub fn export_prometheus(report: &PerformanceReport, active_alerts: usize) -> String {
    enum Value {
        Counter(i64),
        Gauge(f64),
    }

    let metrics: [(&str, &str, Value); 14] = [
        ("tally_classifications_total", "Transactions classified since start", Value::Counter(report.counters.classifications)),
        ("tally_cache_hits_total", "Cache hits since start", Value::Counter(report.counters.cache_hits)),
        ("tally_cache_lookups_total", "Cache lookups since start", Value::Counter(report.counters.cache_lookups)),
        ("tally_classifier_calls_total", "Remote classifier calls since start", Value::Counter(report.counters.classifier_calls)),
        ("tally_corrections_total", "User corrections since start", Value::Counter(report.counters.corrections)),
        ("tally_success_rate", "Share of classifications without error in the report window", Value::Gauge(report.success_rate)),
        ("tally_error_rate", "Share of classifications with error in the report window", Value::Gauge(report.error_rate)),
        ("tally_cache_hit_rate", "Cache hit rate in the report window", Value::Gauge(report.cache_hit_rate)),
        ("tally_latency_mean_ms", "Mean classification latency in milliseconds", Value::Gauge(report.mean_latency_ms)),
        ("tally_latency_p95_ms", "95th percentile classification latency in milliseconds", Value::Gauge(report.p95_latency_ms)),
        ("tally_cost_total_usd", "Classifier cost in the report window in USD", Value::Gauge(report.total_cost_usd)),
        ("tally_cost_per_transaction_usd", "Average classifier cost per transaction in USD", Value::Gauge(report.avg_cost_per_transaction)),
        ("tally_throughput_per_minute", "Transactions classified per minute", Value::Gauge(report.throughput_per_minute())),
        ("tally_active_alerts", "Currently open alerts", Value::Gauge(active_alerts as f64)),
    ];

    let mut out = String::new();
    for (name, help, value) in metrics {
        let (kind, rendered) = match value {
            Value::Counter(v) => ("counter", v.to_string()),
            Value::Gauge(v) => ("gauge", v.to_string()),
        };
        // Writing to a String cannot fail
        let _ = writeln!(out, "# HELP {} {}", name, help);
        let _ = writeln!(out, "# TYPE {} {}", name, kind);
        let _ = writeln!(out, "{} {}", name, rendered);
    }
    out
}

pub struct MetricsRecorder {
    store: Arc<dyn KeyValueStore>,
    retention: Duration,
}

impl MetricsRecorder {
    pub fn new(store: Arc<dyn KeyValueStore>, config: &MetricsConfig) -> Self {
        Self {
            store,
            retention: config.retention(),
        }
    }

    fn day_key(day: NaiveDate) -> String {
        format!("{}{}", SAMPLES_PREFIX, day.format("%Y-%m-%d"))
    }

    fn counter_key(name: &str) -> String {
        format!("{}{}", COUNTER_PREFIX, name)
    }

    /// Append a sample and bump the matching lifetime counters
    pub fn try_record(&self, sample: &MetricSample) -> Result<()> {
        let key = Self::day_key(sample.timestamp.date_naive());
        let payload = serde_json::to_string(sample)?;
        self.store.rpush(&key, &payload)?;
        self.store.expire(&key, self.retention)?;

        match sample.operation {
            Operation::Classify => {
                self.store.incr(&Self::counter_key("classifications"), 1)?;
            }
            Operation::ClassifierCall => {
                self.store.incr(&Self::counter_key("classifier_calls"), 1)?;
            }
            Operation::Feedback => {
                self.store.incr(&Self::counter_key("corrections"), 1)?;
            }
            Operation::CacheLookup => {}
        }
        if let Some(hit) = sample.cache_hit {
            self.store.incr(&Self::counter_key("cache_lookups"), 1)?;
            if hit {
                self.store.incr(&Self::counter_key("cache_hits"), 1)?;
            }
        }
        Ok(())
    }

    /// Append a sample, logging and dropping it on failure
    pub fn record(&self, sample: MetricSample) {
        if let Err(e) = self.try_record(&sample) {
            warn!(operation = %sample.operation, error = %e, "Failed to record metric sample");
        }
    }

    pub fn counters(&self) -> Result<LifetimeCounters> {
        let mut values = [0i64; 5];
        for (slot, name) in values.iter_mut().zip(LifetimeCounters::NAMES) {
            *slot = match self.store.get(&Self::counter_key(name))? {
                Some(raw) => raw.parse().map_err(|_| {
                    Error::InvalidData(format!("Counter {} is not an integer: {}", name, raw))
                })?,
                None => 0,
            };
        }
        let [classifications, cache_hits, cache_lookups, classifier_calls, corrections] = values;
        Ok(LifetimeCounters {
            classifications,
            cache_hits,
            cache_lookups,
            classifier_calls,
            corrections,
        })
    }

    /// Samples with `timestamp >= since`, oldest partition first
    pub fn samples_since(&self, since: DateTime<Utc>, now: DateTime<Utc>) -> Result<Vec<MetricSample>> {
        let mut samples = Vec::new();
        let mut day = since.date_naive();
        let last = now.date_naive();

        while day <= last {
            for raw in self.store.lrange_all(&Self::day_key(day))? {
                match serde_json::from_str::<MetricSample>(&raw) {
                    Ok(sample) if sample.timestamp >= since && sample.timestamp <= now => {
                        samples.push(sample)
                    }
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "Skipping unreadable metric sample"),
                }
            }
            day = match day.succ_opt() {
                Some(next) => next,
                None => break,
            };
        }
        Ok(samples)
    }

    pub fn try_report_at(&self, period: ReportPeriod, now: DateTime<Utc>) -> Result<PerformanceReport> {
        let samples = self.samples_since(now - period.duration(), now)?;
        let counters = self.counters()?;
        Ok(aggregate(period, now, &samples, counters))
    }

    pub fn try_report(&self, period: ReportPeriod) -> Result<PerformanceReport> {
        self.try_report_at(period, Utc::now())
    }

    /// Report for the period ending now; an unavailable store yields an
    /// empty report
    pub fn report(&self, period: ReportPeriod) -> PerformanceReport {
        let now = Utc::now();
        match self.try_report_at(period, now) {
            Ok(report) => report,
            Err(e) => {
                warn!(period = %period, error = %e, "Metrics unavailable, returning empty report");
                PerformanceReport::empty(period, now)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn recorder() -> (MetricsRecorder, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (MetricsRecorder::new(store.clone(), &MetricsConfig::default()), store)
    }

    fn classify_sample(ms: u64, success: bool, hit: bool) -> MetricSample {
        MetricSample::new(Operation::Classify, Duration::from_millis(ms), success).with_cache_hit(hit)
    }

    #[test]
    fn test_percentile_nearest_rank() {
        let values: Vec<f64> = (1..=100).map(f64::from).collect();
        assert_eq!(percentile(&values, 0.50), 50.0);
        assert_eq!(percentile(&values, 0.95), 95.0);
        assert_eq!(percentile(&values, 0.99), 99.0);
        assert_eq!(percentile(&[7.0], 0.95), 7.0);
        assert_eq!(percentile(&[], 0.95), 0.0);
    }

    #[test]
    fn test_report_aggregates_window() {
        let (recorder, _) = recorder();
        recorder.record(classify_sample(100, true, true));
        recorder.record(classify_sample(300, true, false));
        recorder.record(classify_sample(200, false, false));
        recorder.record(
            MetricSample::new(Operation::ClassifierCall, Duration::from_millis(250), true)
                .with_usage(TokenUsage::new(100, 10), 0.002),
        );
        recorder.record(MetricSample::new(Operation::Feedback, Duration::from_millis(5), true));

        let report = recorder.try_report(ReportPeriod::Hour).unwrap();
        assert_eq!(report.total, 3);
        assert_eq!(report.successes, 2);
        assert_eq!(report.errors, 1);
        assert!((report.error_rate - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(report.cache_lookups, 3);
        assert_eq!(report.cache_hits, 1);
        assert!((report.mean_latency_ms - 200.0).abs() < 1e-6);
        assert!((report.total_cost_usd - 0.002).abs() < 1e-12);
        assert_eq!(report.total_tokens, 110);
        assert!((report.throughput - 3.0 / 3600.0).abs() < 1e-12);
        assert_eq!(report.corrections, 1);
        let accuracy = report.estimated_accuracy.unwrap();
        assert!((accuracy - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(report.operations[&Operation::ClassifierCall].count, 1);

        assert_eq!(report.counters.classifications, 3);
        assert_eq!(report.counters.classifier_calls, 1);
        assert_eq!(report.counters.corrections, 1);
        assert_eq!(report.counters.cache_hits, 1);
    }

    #[test]
    fn test_samples_outside_window_are_ignored() {
        let (recorder, _) = recorder();
        let now = Utc::now();
        recorder.record(classify_sample(10, true, false).at(now - chrono::Duration::hours(3)));
        recorder.record(classify_sample(10, true, false).at(now - chrono::Duration::minutes(5)));

        assert_eq!(recorder.try_report_at(ReportPeriod::Hour, now).unwrap().total, 1);
        assert_eq!(recorder.try_report_at(ReportPeriod::Day, now).unwrap().total, 2);
    }

    #[test]
    fn test_partitions_expire_after_retention() {
        let (recorder, store) = recorder();
        recorder.record(classify_sample(10, true, false));
        let key = MetricsRecorder::day_key(Utc::now().date_naive());
        let ttl = store.ttl(&key).unwrap().unwrap();
        assert!(ttl <= Duration::from_secs(30 * 24 * 3600));
        assert!(ttl > Duration::from_secs(29 * 24 * 3600));
    }

    #[test]
    fn test_recommendations_per_missed_target() {
        let now = Utc::now();
        let samples = vec![
            classify_sample(900, false, false).at(now),
            MetricSample::new(Operation::ClassifierCall, Duration::from_millis(900), true)
                .with_usage(TokenUsage::new(1_000_000, 0), 0.15)
                .at(now),
        ];
        let report = aggregate(ReportPeriod::Hour, now, &samples, LifetimeCounters::default());
        // cost, cache hit rate, latency, error rate, throughput
        assert_eq!(report.recommendations.len(), 5);

        let empty = aggregate(ReportPeriod::Hour, now, &[], LifetimeCounters::default());
        assert!(empty.recommendations.is_empty());
        assert!(empty.estimated_accuracy.is_none());
    }

    #[test]
    fn test_unavailable_store_degrades_to_empty_report() {
        let (recorder, store) = recorder();
        recorder.record(classify_sample(10, true, false));
        store.set_available(false);

        // Must not panic
        recorder.record(classify_sample(10, true, false));
        let report = recorder.report(ReportPeriod::Day);
        assert_eq!(report.total, 0);
        assert!(recorder.try_report(ReportPeriod::Day).is_err());
    }

    #[test]
    fn test_prometheus_layout() {
        let now = Utc::now();
        let samples = vec![classify_sample(120, true, true).at(now)];
        let counters = LifetimeCounters {
            classifications: 42,
            cache_hits: 7,
            ..Default::default()
        };
        let report = aggregate(ReportPeriod::Hour, now, &samples, counters);
        let text = export_prometheus(&report, 2);

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 14 * 3);
        assert!(text.ends_with('\n'));
        assert!(!text.contains("\n\n"));
        assert_eq!(lines[0], "# HELP tally_classifications_total Transactions classified since start");
        assert_eq!(lines[1], "# TYPE tally_classifications_total counter");
        assert_eq!(lines[2], "tally_classifications_total 42");
        assert_eq!(lines[5], "tally_cache_hits_total 7");
        assert!(lines.contains(&"# TYPE tally_cache_hit_rate gauge"));
        assert!(lines.contains(&"tally_cache_hit_rate 1"));
        assert!(lines.contains(&"tally_latency_mean_ms 120"));
        assert_eq!(lines[lines.len() - 1], "tally_active_alerts 2");

        for chunk in lines.chunks(3) {
            assert!(chunk[0].starts_with("# HELP "));
            assert!(chunk[1].starts_with("# TYPE "));
            assert!(!chunk[2].starts_with('#'));
        }
    }

    #[test]
    fn test_period_parsing() {
        assert_eq!("hour".parse::<ReportPeriod>(), Ok(ReportPeriod::Hour));
        assert_eq!("WEEK".parse::<ReportPeriod>(), Ok(ReportPeriod::Week));
        assert_eq!("30d".parse::<ReportPeriod>(), Ok(ReportPeriod::Month));
        assert!("fortnight".parse::<ReportPeriod>().is_err());
    }
}
