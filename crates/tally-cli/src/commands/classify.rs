//! Classification commands (classify, batch, rules test)

use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Deserialize;
use tally_core::{CategorizationResult, Engine, Transaction, TransactionInput};

use super::{pct, print_json, truncate};

/// Build a transaction from command-line arguments
pub fn build_transaction(
    id: Option<String>,
    description: &str,
    amount: f64,
    date: Option<String>,
    merchant: Option<String>,
) -> Transaction {
    let now = Utc::now();
    let id = id.unwrap_or_else(|| format!("cli-{}", now.format("%Y%m%d%H%M%S%f")));
    let date = date.unwrap_or_else(|| now.format("%Y-%m-%d").to_string());
    let mut transaction = Transaction::new(&id, description, amount, &date);
    transaction.merchant = merchant.filter(|m| !m.trim().is_empty());
    transaction
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    amount: Option<String>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    merchant: Option<String>,
}

impl From<CsvRow> for TransactionInput {
    fn from(row: CsvRow) -> Self {
        Self {
            id: row.id,
            description: row.description,
            amount: row.amount.map(serde_json::Value::String).unwrap_or_default(),
            date: row.date,
            merchant: row.merchant,
        }
    }
}

/// One CSV row: either a transaction to classify or a row rejected up front
#[derive(Debug)]
pub enum BatchRow {
    Transaction(Transaction),
    Rejected(CategorizationResult),
}

/// Read `id,description,amount,date[,merchant]` rows
///
/// Rows with missing or non-numeric fields become transactions that fail
/// preprocessing; rows the reader cannot decode are rejected in place.
pub fn read_transactions<R: Read>(reader: R) -> Result<Vec<BatchRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);
    rdr.headers().context("Failed to read CSV header")?;

    let rows = rdr
        .deserialize::<CsvRow>()
        .enumerate()
        .map(|(i, row)| match row {
            Ok(row) => BatchRow::Transaction(Transaction::from(TransactionInput::from(row))),
            // Header is line 1
            Err(e) => BatchRow::Rejected(CategorizationResult::preprocessing_failed(
                &format!("line-{}", i + 2),
                &e.to_string(),
            )),
        })
        .collect();
    Ok(rows)
}

fn print_result(result: &CategorizationResult) {
    let source = result.source.map(|s| s.as_str()).unwrap_or("none");
    let mut line = format!(
        "{:<24} {:<20} {:>6}  {}",
        truncate(&result.transaction_id, 24),
        result.category.as_str(),
        pct(result.confidence),
        source
    );
    if let Some(reason) = result.fallback {
        line.push_str(&format!("  (fallback: {})", reason.as_str()));
    }
    if let Some(err) = &result.error {
        line.push_str(&format!("  ❌ {}", err));
    }
    println!("   {}", line);
}

pub async fn cmd_classify(engine: &Engine, transaction: &Transaction, json: bool) -> Result<()> {
    let result = engine.classify(transaction).await;

    if json {
        return print_json(&result);
    }

    if let Some(err) = &result.error {
        anyhow::bail!("{}", err);
    }

    println!("🏷️  {}", transaction.description);
    println!("   ID:         {}", result.transaction_id);
    println!("   Category:   {}", result.category);
    println!("   Confidence: {}", pct(result.confidence));
    if let Some(source) = result.source {
        println!("   Source:     {}", source);
    }
    if let Some(reason) = result.fallback {
        println!("   ⚠️  Fallback: {}", reason.as_str());
    }
    if result.cost_usd > 0.0 {
        println!("   Cost:       ${:.6}", result.cost_usd);
    }

    Ok(())
}

pub async fn cmd_batch(engine: &Engine, file: &Path, json: bool) -> Result<()> {
    let reader =
        File::open(file).with_context(|| format!("Failed to open {}", file.display()))?;
    let rows = read_transactions(reader)?;
    if rows.is_empty() {
        anyhow::bail!("No transactions found in {}", file.display());
    }

    let transactions: Vec<Transaction> = rows
        .iter()
        .filter_map(|row| match row {
            BatchRow::Transaction(tx) => Some(tx.clone()),
            BatchRow::Rejected(_) => None,
        })
        .collect();

    // Chunk to the engine's batch limit; order is kept across chunks
    let chunk_size = engine.config().orchestrator.max_batch_size.max(1);
    let mut classified = Vec::with_capacity(transactions.len());
    for chunk in transactions.chunks(chunk_size) {
        classified.extend(engine.classify_batch(chunk).await?);
    }

    let mut classified = classified.into_iter();
    let results: Vec<CategorizationResult> = rows
        .into_iter()
        .filter_map(|row| match row {
            BatchRow::Transaction(_) => classified.next(),
            BatchRow::Rejected(result) => Some(result),
        })
        .collect();

    if json {
        return print_json(&results);
    }

    println!("📥 Classified {} transactions from {}", results.len(), file.display());
    println!();
    for result in &results {
        print_result(result);
    }

    let degraded = results.iter().filter(|r| r.is_degraded()).count();
    let rejected = results.iter().filter(|r| r.error.is_some()).count();
    let cost: f64 = results.iter().map(|r| r.cost_usd).sum();
    println!();
    println!(
        "   Total: {}  Degraded: {}  Rejected: {}  Cost: ${:.6}",
        results.len(),
        degraded,
        rejected,
        cost
    );

    Ok(())
}

pub fn cmd_rules_test(engine: &Engine, description: &str, amount: f64, json: bool) -> Result<()> {
    let result = engine.test_rules(description, amount);

    if json {
        return print_json(&result);
    }

    println!("🧪 Testing rules against: {}", description);
    println!("   Normalized: {}", result.normalized);

    if result.candidates.is_empty() {
        println!("   No rules matched");
        return Ok(());
    }

    println!();
    for (i, candidate) in result.candidates.iter().enumerate() {
        let marker = if i == 0 { "→" } else { " " };
        println!(
            "   {} {:<24} {:<20} {:>3}%  {}",
            marker,
            truncate(&candidate.rule, 24),
            candidate.category.as_str(),
            candidate.confidence,
            candidate.tier
        );
    }
    println!();
    if result.short_circuits {
        println!("   ✅ Winning rule short-circuits the classifier");
    } else {
        println!("   The classifier would still be consulted");
    }

    Ok(())
}
