//! Validation command implementation

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tally_core::validation::{export_dataset, generate_dataset, load_dataset};
use tally_core::{Engine, ValidationRecord, ValidationReport};

use super::{pct, print_json, truncate};

/// Where the labelled records come from
#[derive(Debug, Clone, PartialEq)]
pub enum DatasetSource {
    Generated { size: usize, seed: u64 },
    File(PathBuf),
}

impl DatasetSource {
    pub fn load(&self) -> Result<Vec<ValidationRecord>> {
        match self {
            Self::Generated { size, seed } => {
                if *size == 0 {
                    anyhow::bail!("--size must be at least 1");
                }
                Ok(generate_dataset(*size, *seed))
            }
            Self::File(path) => load_dataset(path)
                .with_context(|| format!("Failed to load dataset {}", path.display())),
        }
    }
}

pub async fn cmd_validate(
    engine: &Engine,
    source: &DatasetSource,
    export: Option<&Path>,
    scenario: &str,
    json: bool,
) -> Result<()> {
    let records = source.load()?;

    if let Some(path) = export {
        export_dataset(path, &records)
            .with_context(|| format!("Failed to export dataset to {}", path.display()))?;
        if !json {
            println!("💾 Wrote {} records to {}", records.len(), path.display());
        }
    }

    let report = engine.run_validation(&records, scenario).await?;

    if json {
        return print_json(&report);
    }

    print_report(&report);
    Ok(())
}

fn print_report(report: &ValidationReport) {
    println!();
    println!("🧪 Validation: {} ({} records)", report.scenario, report.total);
    println!("   ─────────────────────────────────────────────────────────────");
    println!(
        "   Accuracy:        {} ({}/{})",
        pct(report.accuracy),
        report.correct,
        report.total
    );
    println!(
        "   Cost:            ${:.4} total, ${:.6}/transaction, ${:.4}/statement",
        report.total_cost_usd, report.cost_per_transaction, report.cost_per_statement
    );
    println!(
        "   Cache hit rate:  {} → {} ({:+.1} pts)",
        pct(report.cache_hit_rate_before),
        pct(report.cache_hit_rate_after),
        report.cache_hit_rate_delta * 100.0
    );
    println!(
        "   Latency:         p50 {:.0}ms, p95 {:.0}ms, p99 {:.0}ms",
        report.p50_latency_ms, report.p95_latency_ms, report.p99_latency_ms
    );
    println!(
        "   Errors:          {} ({})",
        report.errors,
        pct(report.error_rate)
    );
    println!("   Duration:        {}ms", report.duration_ms);

    println!();
    println!("   By source:");
    for (source, count) in &report.sources {
        println!("     {:<10} {:>6}", source, count);
    }

    println!();
    println!("   By category:");
    for (category, acc) in &report.per_category {
        println!(
            "     {:<20} {:>6}  ({}/{})",
            category.as_str(),
            pct(acc.accuracy),
            acc.correct,
            acc.total
        );
    }

    if !report.failures.is_empty() {
        println!();
        println!("   Mismatches (first {}):", report.failures.len());
        for failure in &report.failures {
            println!(
                "     {:<32} expected {:<18} got {:<18} {}",
                truncate(&failure.description, 32),
                failure.expected.as_str(),
                failure.actual.as_str(),
                failure.source.map(|s| s.as_str()).unwrap_or("none")
            );
        }
    }

    println!();
    if report.production_ready {
        println!("   ✅ Production ready");
    } else {
        println!("   ⚠️  Not production ready (targets: accuracy ≥ 85%, cost ≤ $0.10, errors ≤ 1%)");
    }
}
