//! Validation harness
//!
//! Builds labelled datasets (seeded synthetic merchants plus a fixed set of
//! awkward edge cases), drives them through the categorization pipeline and
//! scores the run: accuracy overall and per category, cost per transaction
//! and per statement, cache hit rate movement, tail latency and a
//! production-readiness verdict.
//!
//! Datasets round-trip through CSV with the columns
//! `id,description,amount,date,ground_truth,source`.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use csv::{ReaderBuilder, WriterBuilder};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::metrics::{percentile, MetricsRecorder, TARGET_COST_PER_TRANSACTION, TARGET_ERROR_RATE};
use crate::models::{Category, ResultSource, Transaction};
use crate::orchestrator::CategorizationOrchestrator;

/// Transactions assumed on one monthly statement
pub const TRANSACTIONS_PER_STATEMENT: f64 = 100.0;

/// Minimum accuracy for a production-ready verdict
pub const TARGET_ACCURACY: f64 = 0.85;

/// Mismatches kept on the report
pub const MAX_REPORTED_FAILURES: usize = 20;

pub const SOURCE_SYNTHETIC: &str = "synthetic";
pub const SOURCE_EDGE_CASE: &str = "edge_case";

/// One labelled transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRecord {
    pub id: String,
    pub description: String,
    pub amount: f64,
    pub date: String,
    pub ground_truth: Category,
    /// `synthetic`, `edge_case`, or whatever an imported file says
    pub source: String,
}

impl ValidationRecord {
    pub fn transaction(&self) -> Transaction {
        Transaction::new(&self.id, &self.description, self.amount, &self.date)
    }
}

struct Archetype {
    /// `{n}` is replaced with a store or reference number
    template: &'static str,
    category: Category,
    min_amount: f64,
    max_amount: f64,
}

const fn archetype(
    template: &'static str,
    category: Category,
    min_amount: f64,
    max_amount: f64,
) -> Archetype {
    Archetype {
        template,
        category,
        min_amount,
        max_amount,
    }
}

const ARCHETYPES: &[Archetype] = &[
    archetype("LOBLAWS #{n} TORONTO ON", Category::Groceries, 18.0, 180.0),
    archetype("NO FRILLS {n}", Category::Groceries, 12.0, 120.0),
    archetype("SOBEYS #{n}", Category::Groceries, 15.0, 150.0),
    archetype("COSTCO WHOLESALE W{n}", Category::Groceries, 60.0, 400.0),
    archetype("STARBUCKS STORE {n}", Category::DiningOut, 4.0, 12.0),
    archetype("TIM HORTONS #{n}", Category::DiningOut, 2.0, 15.0),
    archetype("UBER EATS ORDER {n}", Category::DiningOut, 15.0, 60.0),
    archetype("PIZZA PIZZA {n}", Category::DiningOut, 12.0, 45.0),
    archetype("UBER TRIP {n}", Category::Transportation, 8.0, 45.0),
    archetype("PRESTO FARE {n}", Category::Transportation, 3.3, 3.35),
    archetype("SHELL {n} QUEEN ST", Category::Transportation, 30.0, 95.0),
    archetype("TORONTO HYDRO BILL {n}", Category::Utilities, 60.0, 200.0),
    archetype("ROGERS WIRELESS {n}", Category::Utilities, 50.0, 120.0),
    archetype("NETFLIX.COM {n}", Category::Entertainment, 10.0, 25.0),
    archetype("CINEPLEX {n}", Category::Entertainment, 12.0, 40.0),
    archetype("AMAZON.CA ORDER {n}", Category::Shopping, 10.0, 250.0),
    archetype("CANADIAN TIRE #{n}", Category::Shopping, 15.0, 300.0),
    archetype("SHOPPERS DRUG MART #{n}", Category::HealthWellness, 6.0, 90.0),
    archetype("RENT PAYMENT {n}", Category::Housing, 1200.0, 2400.0),
    archetype("PAYROLL DEPOSIT {n}", Category::Income, -3500.0, -1500.0),
    archetype("INTERAC E-TRANSFER {n}", Category::Transfers, 50.0, 500.0),
    archetype("MONTHLY SERVICE FEE", Category::Services, 4.0, 16.0),
    archetype("INSURANCE PREMIUM {n}", Category::Services, 40.0, 220.0),
];

/// Unknown merchants, refunds, cryptic terminals, processor prefixes and
/// deposits
const EDGE_CASES: &[(&str, Category, f64)] = &[
    ("UNKNOWN MERCHANT XYZ", Category::Other, 25.99),
    ("AMAZON.CA REFUND", Category::Shopping, -45.0),
    ("POS 00421 RDR", Category::Transportation, 3.35),
    ("SQ *CORNER BAKERY", Category::Groceries, 8.75),
    ("PAYPAL *SPOTIFY", Category::Entertainment, 11.99),
    ("MOBILE DEPOSIT", Category::Income, -800.0),
    ("TFR-FR 12345678", Category::Transfers, -200.0),
];

fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default()
}

/// The fixed edge-case set, dated from the start of the dataset year
pub fn edge_cases() -> Vec<ValidationRecord> {
    EDGE_CASES
        .iter()
        .enumerate()
        .map(|(i, (description, category, amount))| ValidationRecord {
            id: format!("edge-{:03}", i + 1),
            description: description.to_string(),
            amount: *amount,
            date: (epoch() + ChronoDuration::days(i as i64))
                .format("%Y-%m-%d")
                .to_string(),
            ground_truth: *category,
            source: SOURCE_EDGE_CASE.to_string(),
        })
        .collect()
}

/// Generate `size` records: synthetic archetypes followed by the edge-case
/// set. The same seed always yields the same dataset.
pub fn generate_dataset(size: usize, seed: u64) -> Vec<ValidationRecord> {
    let mut rng = StdRng::seed_from_u64(seed);
    let edges = edge_cases();
    let synthetic = size.saturating_sub(edges.len());

    let mut records = Vec::with_capacity(size);
    for i in 0..synthetic {
        let archetype = &ARCHETYPES[rng.gen_range(0..ARCHETYPES.len())];
        let number: u32 = rng.gen_range(100..10_000);
        let amount = round_cents(rng.gen_range(archetype.min_amount..=archetype.max_amount));
        let date = epoch() + ChronoDuration::days(rng.gen_range(0..366));

        records.push(ValidationRecord {
            id: format!("val-{:05}", i + 1),
            description: archetype.template.replace("{n}", &number.to_string()),
            amount,
            date: date.format("%Y-%m-%d").to_string(),
            ground_truth: archetype.category,
            source: SOURCE_SYNTHETIC.to_string(),
        });
    }
    records.extend(edges.into_iter().take(size - synthetic));

    debug!(size, seed, synthetic, "Generated validation dataset");
    records
}

/// CSV row; labels are parsed leniently on import
#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    id: String,
    description: String,
    amount: f64,
    date: String,
    ground_truth: String,
    #[serde(default)]
    source: String,
}

/// Parse a labelled dataset from CSV
pub fn read_dataset<R: Read>(reader: R) -> Result<Vec<ValidationRecord>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut records = Vec::new();
    for (line, row) in rdr.deserialize::<CsvRow>().enumerate() {
        let row = row?;
        let ground_truth: Category = row.ground_truth.parse().map_err(|e: String| {
            Error::InvalidData(format!("row {}: {}", line + 1, e))
        })?;
        records.push(ValidationRecord {
            id: row.id,
            description: row.description,
            amount: row.amount,
            date: row.date,
            ground_truth,
            source: if row.source.is_empty() {
                "imported".to_string()
            } else {
                row.source
            },
        });
    }

    debug!("Parsed {} validation records", records.len());
    Ok(records)
}

/// Write a dataset as CSV
pub fn write_dataset<W: Write>(writer: W, records: &[ValidationRecord]) -> Result<()> {
    let mut wtr = WriterBuilder::new().has_headers(true).from_writer(writer);
    for record in records {
        wtr.serialize(CsvRow {
            id: record.id.clone(),
            description: record.description.clone(),
            amount: record.amount,
            date: record.date.clone(),
            ground_truth: record.ground_truth.as_str().to_string(),
            source: record.source.clone(),
        })?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn load_dataset(path: &Path) -> Result<Vec<ValidationRecord>> {
    read_dataset(File::open(path)?)
}

pub fn export_dataset(path: &Path, records: &[ValidationRecord]) -> Result<()> {
    write_dataset(File::create(path)?, records)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryAccuracy {
    pub total: usize,
    pub correct: usize,
    pub accuracy: f64,
}

/// A record the pipeline got wrong
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationFailure {
    pub id: String,
    pub description: String,
    pub expected: Category,
    pub actual: Category,
    pub source: Option<ResultSource>,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub scenario: String,
    pub total: usize,
    pub correct: usize,
    pub accuracy: f64,
    pub total_cost_usd: f64,
    pub cost_per_transaction: f64,
    /// Cost per transaction times `TRANSACTIONS_PER_STATEMENT`
    pub cost_per_statement: f64,
    /// Lifetime cache hit rate before the run
    pub cache_hit_rate_before: f64,
    pub cache_hit_rate_after: f64,
    pub cache_hit_rate_delta: f64,
    pub per_category: BTreeMap<Category, CategoryAccuracy>,
    /// Result count per source (`cache`, `rule`, `ai`, `hybrid`, `none`)
    pub sources: BTreeMap<String, usize>,
    pub p50_latency_ms: f64,
    pub p95_latency_ms: f64,
    pub p99_latency_ms: f64,
    pub errors: usize,
    pub error_rate: f64,
    /// First mismatches, in dataset order
    pub failures: Vec<ValidationFailure>,
    pub production_ready: bool,
    pub duration_ms: u64,
}

/// Accuracy, cost and error-rate targets all met
pub fn is_production_ready(accuracy: f64, cost_per_transaction: f64, error_rate: f64) -> bool {
    accuracy >= TARGET_ACCURACY
        && cost_per_transaction <= TARGET_COST_PER_TRANSACTION
        && error_rate <= TARGET_ERROR_RATE
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

pub struct ValidationHarness {
    orchestrator: Arc<CategorizationOrchestrator>,
    metrics: Arc<MetricsRecorder>,
}

impl ValidationHarness {
    pub fn new(orchestrator: Arc<CategorizationOrchestrator>, metrics: Arc<MetricsRecorder>) -> Self {
        Self {
            orchestrator,
            metrics,
        }
    }

    fn lifetime_hit_rate(&self) -> f64 {
        match self.metrics.counters() {
            Ok(c) if c.cache_lookups > 0 => c.cache_hits as f64 / c.cache_lookups as f64,
            Ok(_) => 0.0,
            Err(e) => {
                warn!(error = %e, "Metrics unavailable, cache hit rate unknown");
                0.0
            }
        }
    }

    /// Classify every record in order and score the run
    pub async fn run(&self, records: &[ValidationRecord], scenario: &str) -> Result<ValidationReport> {
        if records.is_empty() {
            return Err(Error::InvalidData("Validation dataset is empty".into()));
        }

        let started = Instant::now();
        let hit_rate_before = self.lifetime_hit_rate();

        let mut correct = 0usize;
        let mut errors = 0usize;
        let mut total_cost = 0.0;
        let mut latencies = Vec::with_capacity(records.len());
        let mut per_category: BTreeMap<Category, CategoryAccuracy> = BTreeMap::new();
        let mut sources: BTreeMap<String, usize> = BTreeMap::new();
        let mut failures = Vec::new();

        for record in records {
            let item_started = Instant::now();
            let result = self.orchestrator.classify(&record.transaction()).await;
            latencies.push(item_started.elapsed().as_secs_f64() * 1000.0);

            total_cost += result.cost_usd;
            if result.is_error() {
                errors += 1;
            }
            let source = result.source.map(|s| s.as_str()).unwrap_or("none");
            *sources.entry(source.to_string()).or_default() += 1;

            let bucket = per_category.entry(record.ground_truth).or_default();
            bucket.total += 1;
            if result.category == record.ground_truth {
                correct += 1;
                bucket.correct += 1;
            } else if failures.len() < MAX_REPORTED_FAILURES {
                failures.push(ValidationFailure {
                    id: record.id.clone(),
                    description: record.description.clone(),
                    expected: record.ground_truth,
                    actual: result.category,
                    source: result.source,
                    confidence: result.confidence,
                });
            }
        }

        for bucket in per_category.values_mut() {
            bucket.accuracy = ratio(bucket.correct, bucket.total);
        }
        latencies.sort_by(|a, b| a.total_cmp(b));

        let total = records.len();
        let accuracy = ratio(correct, total);
        let cost_per_transaction = total_cost / total as f64;
        let error_rate = ratio(errors, total);
        let hit_rate_after = self.lifetime_hit_rate();

        let report = ValidationReport {
            scenario: scenario.to_string(),
            total,
            correct,
            accuracy,
            total_cost_usd: total_cost,
            cost_per_transaction,
            cost_per_statement: cost_per_transaction * TRANSACTIONS_PER_STATEMENT,
            cache_hit_rate_before: hit_rate_before,
            cache_hit_rate_after: hit_rate_after,
            cache_hit_rate_delta: hit_rate_after - hit_rate_before,
            per_category,
            sources,
            p50_latency_ms: percentile(&latencies, 0.50),
            p95_latency_ms: percentile(&latencies, 0.95),
            p99_latency_ms: percentile(&latencies, 0.99),
            errors,
            error_rate,
            failures,
            production_ready: is_production_ready(accuracy, cost_per_transaction, error_rate),
            duration_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            scenario = %scenario,
            total,
            accuracy = report.accuracy,
            cost_per_transaction = report.cost_per_transaction,
            errors,
            production_ready = report.production_ready,
            finished_at = %Utc::now(),
            "Validation run complete"
        );
        Ok(report)
    }
}
