//! Tally CLI - Hybrid transaction categorization
//!
//! Usage:
//!   tally init                          Initialize database
//!   tally classify "LOBLAWS 1021" -a 84.12
//!   tally batch --file statement.csv    Classify a CSV of transactions
//!   tally validate --size 500           Accuracy/cost/latency run
//!   tally serve --port 3000             Start web server

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let paths = commands::EnginePaths::from_cli(&cli);

    match cli.command {
        Commands::Init => commands::cmd_init(&paths),
        Commands::Classify {
            description,
            amount,
            date,
            id,
            merchant,
        } => {
            let engine = commands::open_engine(&paths)?;
            let transaction =
                commands::build_transaction(id, &description, amount, date, merchant);
            commands::cmd_classify(&engine, &transaction, cli.json).await
        }
        Commands::Batch { file } => {
            let engine = commands::open_engine(&paths)?;
            commands::cmd_batch(&engine, &file, cli.json).await
        }
        Commands::Feedback {
            transaction_id,
            category,
            original,
            rating,
        } => {
            let engine = commands::open_engine(&paths)?;
            commands::cmd_feedback(&engine, &transaction_id, &category, original, rating, cli.json)
                .await
        }
        Commands::Rules { action } => match action {
            RulesAction::Test {
                description,
                amount,
            } => {
                let engine = commands::open_engine(&paths)?;
                commands::cmd_rules_test(&engine, &description, amount, cli.json)
            }
        },
        Commands::Report { period } => {
            let engine = commands::open_engine(&paths)?;
            commands::cmd_report(&engine, period, cli.json)
        }
        Commands::Metrics => {
            let engine = commands::open_engine(&paths)?;
            commands::cmd_metrics(&engine)
        }
        Commands::Alerts { history, action } => {
            let engine = commands::open_engine(&paths)?;
            match action {
                Some(AlertsAction::Resolve { id }) => {
                    commands::cmd_alerts_resolve(&engine, &id, cli.json)
                }
                None => commands::cmd_alerts(&engine, history, cli.json),
            }
        }
        Commands::Thresholds { set } => {
            let engine = commands::open_engine(&paths)?;
            commands::cmd_thresholds(&engine, &set, cli.json)
        }
        Commands::Monitor => {
            let engine = commands::open_engine(&paths)?;
            commands::cmd_monitor(&engine, cli.json).await
        }
        Commands::Validate {
            size,
            seed,
            dataset,
            export,
            scenario,
        } => {
            let engine = commands::open_engine(&paths)?;
            let source = match dataset {
                Some(path) => commands::DatasetSource::File(path),
                None => commands::DatasetSource::Generated { size, seed },
            };
            commands::cmd_validate(&engine, &source, export.as_deref(), &scenario, cli.json).await
        }
        Commands::Serve {
            port,
            host,
            allowed_origins,
        } => commands::cmd_serve(&paths, &host, port, allowed_origins).await,
    }
}
