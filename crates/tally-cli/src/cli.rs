//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tally_core::ReportPeriod;

/// Tally - Categorize bank transactions with rules, a cache and an AI classifier
#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Hybrid bank transaction categorization engine", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path (defaults to the platform data directory)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Engine config file (defaults to the data-dir override, then built-in defaults)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Rule set file (defaults to the data-dir override, then built-in rules)
    #[arg(long, global = true)]
    pub rules: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Classify a single transaction
    Classify {
        /// Transaction description as it appears on the statement
        description: String,

        /// Amount (positive = money out, negative = refund/credit)
        #[arg(short, long, allow_hyphen_values = true)]
        amount: f64,

        /// Transaction date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,

        /// Transaction id (generated when omitted)
        #[arg(long)]
        id: Option<String>,

        /// Explicit merchant name, preferred over the description
        #[arg(long)]
        merchant: Option<String>,
    },

    /// Classify transactions from a CSV file (id,description,amount,date[,merchant])
    Batch {
        /// CSV file to classify
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Correct the category of a classified transaction
    Feedback {
        /// Transaction ID
        transaction_id: String,

        /// Correct category (e.g., "Groceries" or "dining out")
        category: String,

        /// Category the engine assigned, if known
        #[arg(long)]
        original: Option<String>,

        /// How sure you are about the correction (1-5)
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=5))]
        rating: Option<u8>,
    },

    /// Inspect the rule set
    Rules {
        #[command(subcommand)]
        action: RulesAction,
    },

    /// Show the performance report for a period
    Report {
        /// Period: hour, day, week, month
        #[arg(short, long, default_value = "day")]
        period: ReportPeriod,
    },

    /// Print metrics in Prometheus text format
    Metrics,

    /// List active alerts
    Alerts {
        /// Show every alert, resolved ones included
        #[arg(long)]
        history: bool,

        #[command(subcommand)]
        action: Option<AlertsAction>,
    },

    /// Show or update alert thresholds
    Thresholds {
        /// Update a threshold, e.g. --set error_rate=2.5 (repeatable)
        #[arg(long = "set", value_parser = parse_threshold)]
        set: Vec<(String, f64)>,
    },

    /// Run one monitoring check against the last hour of metrics
    Monitor,

    /// Measure accuracy, cost and latency over a labelled dataset
    Validate {
        /// Size of the generated dataset
        #[arg(long, default_value = "100", conflicts_with = "dataset")]
        size: usize,

        /// Seed for the generated dataset
        #[arg(long, default_value = "42", conflicts_with = "dataset")]
        seed: u64,

        /// Labelled CSV dataset (id,description,amount,date,ground_truth,source)
        #[arg(long)]
        dataset: Option<PathBuf>,

        /// Write the dataset used to a CSV file
        #[arg(long)]
        export: Option<PathBuf>,

        /// Scenario name recorded in the report
        #[arg(long, default_value = "cli")]
        scenario: String,
    },

    /// Start the web server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Allowed CORS origin (repeatable, same-origin only when omitted)
        #[arg(long = "allowed-origin")]
        allowed_origins: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum RulesAction {
    /// Dry-run the rule set against a description
    Test {
        /// Description to test
        description: String,

        /// Amount to test amount-tier rules with
        #[arg(short, long, default_value = "0", allow_hyphen_values = true)]
        amount: f64,
    },
}

#[derive(Subcommand)]
pub enum AlertsAction {
    /// Resolve an alert by id
    Resolve {
        /// Alert ID
        id: String,
    },
}

/// Parse `key=value` for `thresholds --set`
pub fn parse_threshold(s: &str) -> Result<(String, f64), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", s))?;
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid number '{}' for {}", value.trim(), key.trim()))?;
    Ok((key.trim().to_string(), value))
}
