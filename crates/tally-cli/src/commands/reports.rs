//! Report command implementations

use anyhow::Result;
use tally_core::{Engine, ReportPeriod};

use super::{pct, print_json};

pub fn cmd_report(engine: &Engine, period: ReportPeriod, json: bool) -> Result<()> {
    let report = engine.metrics().try_report(period)?;

    if json {
        return print_json(&report);
    }

    println!();
    println!("📊 Performance report (last {})", report.period);
    println!("   ─────────────────────────────────────────────────────────────");

    if !report.has_traffic() {
        println!("   No classifications recorded in this period");
        return Ok(());
    }

    println!("   Classified:      {}", report.total);
    println!(
        "   Success rate:    {} ({} errors)",
        pct(report.success_rate),
        report.errors
    );
    println!(
        "   Cache hit rate:  {} ({}/{})",
        pct(report.cache_hit_rate),
        report.cache_hits,
        report.cache_lookups
    );
    println!(
        "   Latency:         mean {:.0}ms, p50 {:.0}ms, p95 {:.0}ms",
        report.mean_latency_ms, report.p50_latency_ms, report.p95_latency_ms
    );
    println!(
        "   Cost:            ${:.4} total, ${:.6} per transaction",
        report.total_cost_usd, report.avg_cost_per_transaction
    );
    println!("   Tokens:          {}", report.total_tokens);
    println!("   Throughput:      {:.2}/min", report.throughput_per_minute());
    match report.estimated_accuracy {
        Some(accuracy) => println!(
            "   Est. accuracy:   {} ({} corrections)",
            pct(accuracy),
            report.corrections
        ),
        None => println!("   Est. accuracy:   n/a"),
    }

    if !report.operations.is_empty() {
        println!();
        println!("   Operations:");
        for (operation, stats) in &report.operations {
            println!(
                "     {:<16} {:>6} calls  {:>4} errors  {:>8.1}ms mean",
                operation.as_str(),
                stats.count,
                stats.errors,
                stats.mean_latency_ms
            );
        }
    }

    if !report.recommendations.is_empty() {
        println!();
        println!("   💡 Recommendations:");
        for rec in &report.recommendations {
            println!("     - {}", rec);
        }
    }

    Ok(())
}

pub fn cmd_metrics(engine: &Engine) -> Result<()> {
    print!("{}", engine.prometheus());
    Ok(())
}
