//! Engine assembly and `init`

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tally_core::config::default_db_path;
use tally_core::{Database, Engine, PatternRuleMatcher, TallyConfig};

use crate::cli::Cli;

/// File locations shared by every command
#[derive(Debug, Clone)]
pub struct EnginePaths {
    pub db: PathBuf,
    pub config: Option<PathBuf>,
    pub rules: Option<PathBuf>,
}

impl EnginePaths {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            db: cli.db.clone().unwrap_or_else(default_db_path),
            config: cli.config.clone(),
            rules: cli.rules.clone(),
        }
    }
}

/// Open the database, creating its parent directory if needed
pub fn open_db(db_path: &Path) -> Result<Database> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    Database::new(&db_path.to_string_lossy()).context("Failed to open database")
}

/// Load config and rules, open the database and wire the engine
pub fn open_engine(paths: &EnginePaths) -> Result<Engine> {
    let config = TallyConfig::load(paths.config.as_deref()).context("Failed to load config")?;
    let rules = PatternRuleMatcher::load(paths.rules.as_deref()).context("Failed to load rules")?;
    let db = open_db(&paths.db)?;
    Engine::open(config, db, rules).context("Failed to start engine")
}

pub fn cmd_init(paths: &EnginePaths) -> Result<()> {
    println!("🔧 Initializing database at {}...", paths.db.display());

    // Validate config and rules before touching the database
    let config = TallyConfig::load(paths.config.as_deref()).context("Failed to load config")?;
    let rules = PatternRuleMatcher::load(paths.rules.as_deref()).context("Failed to load rules")?;
    open_db(&paths.db)?;

    println!("   Rules loaded: {}", rules.len());
    match &config.classifier.host {
        Some(host) => println!(
            "   Classifier: {} at {} (model {})",
            config.classifier.backend.as_str(),
            host,
            config.classifier.model
        ),
        None => println!("   Classifier: not configured (rules and cache only)"),
    }

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Classify a statement: tally batch --file statement.csv");
    println!("  2. Check accuracy: tally validate --size 500");
    println!("  3. Start the API: tally serve");

    Ok(())
}
