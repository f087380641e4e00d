//! Database access layer with connection pooling and migrations
//!
//! This module is organized by domain:
//! - `kv` - Key-value entries backing the cache, metrics and alert state
//! - `transactions` - Transaction records and the category taxonomy
//! - `feedback` - User corrections
//! - `patterns` - Merchant/keyword learning counters

use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use tracing::info;

use crate::error::Result;
use crate::models::{Category, FeedbackRecord, LearningPattern, PatternKind, Transaction};

mod feedback;
mod kv;
mod patterns;
mod transactions;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Parse a SQLite datetime string into a DateTime<Utc>
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    // SQLite stores as "YYYY-MM-DD HH:MM:SS" format
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.and_utc())
        .unwrap_or_else(|_| Utc::now())
}

/// Relational records the feedback loop depends on
///
/// Schema ownership stays with the implementation; callers only need id
/// lookups, inserts and counter updates.
pub trait RecordStore: Send + Sync {
    fn get_transaction(&self, id: &str) -> Result<Option<Transaction>>;

    /// Whether `name` is part of the configured taxonomy
    fn category_exists(&self, name: &str) -> Result<bool>;

    /// Persist a correction, returning its id
    fn insert_feedback(&self, feedback: &FeedbackRecord) -> Result<i64>;

    fn mark_feedback_processed(&self, id: i64) -> Result<()>;

    /// Bump the counters for (kind, key, category), creating the row on
    /// first sight, and return the updated pattern
    fn upsert_learning_pattern(
        &self,
        kind: PatternKind,
        pattern_key: &str,
        category: Category,
        success: bool,
    ) -> Result<LearningPattern>;
}

/// Database wrapper with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    /// Path to the database file
    db_path: String,
}

impl Database {
    /// Open (or create) a database file and run migrations
    pub fn new(path: &str) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder().max_size(10).build(manager)?;

        let db = Self {
            pool,
            db_path: path.to_string(),
        };
        db.run_migrations()?;

        Ok(db)
    }

    /// Get the path to the database file
    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Create a throwaway database (for testing)
    ///
    /// Uses a temporary file rather than `:memory:` so every pooled
    /// connection sees the same data.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "tally_test_{}_{}.db",
            std::process::id(),
            id
        ));
        let path = path.to_string_lossy().to_string();

        // Remove any leftover file from a previous run
        let _ = std::fs::remove_file(&path);

        Self::new(&path)
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- WAL mode: readers don't block writers
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;

            -- Generic key-value entries (cache, metrics buckets, alerts)
            CREATE TABLE IF NOT EXISTS kv_entries (
                key TEXT PRIMARY KEY,
                kind TEXT NOT NULL,                 -- string, set, list
                value TEXT NOT NULL,                -- raw string or JSON array
                expires_at INTEGER                  -- unix millis, NULL = no expiry
            );

            CREATE INDEX IF NOT EXISTS idx_kv_entries_expires ON kv_entries(expires_at);

            -- Category taxonomy
            CREATE TABLE IF NOT EXISTS categories (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            -- Transactions seen by the engine
            CREATE TABLE IF NOT EXISTS transactions (
                id TEXT PRIMARY KEY,
                description TEXT NOT NULL,
                amount REAL NOT NULL,
                date TEXT NOT NULL,
                merchant TEXT,
                category TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_transactions_date ON transactions(date);

            -- User corrections
            CREATE TABLE IF NOT EXISTS feedback (
                id INTEGER PRIMARY KEY,
                transaction_id TEXT NOT NULL,
                original_category TEXT,
                corrected_category TEXT NOT NULL,
                confidence_rating INTEGER,
                source TEXT NOT NULL DEFAULT 'user',
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                processed_at DATETIME
            );

            CREATE INDEX IF NOT EXISTS idx_feedback_transaction ON feedback(transaction_id);

            -- Frequency-weighted learning counters
            CREATE TABLE IF NOT EXISTS learning_patterns (
                id INTEGER PRIMARY KEY,
                kind TEXT NOT NULL,                 -- merchant, keyword
                pattern_key TEXT NOT NULL,
                category TEXT NOT NULL,
                occurrence_count INTEGER NOT NULL DEFAULT 0,
                success_count INTEGER NOT NULL DEFAULT 0,
                confidence_score REAL NOT NULL DEFAULT 0,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(kind, pattern_key, category)
            );

            CREATE INDEX IF NOT EXISTS idx_learning_patterns_key ON learning_patterns(pattern_key);
            "#,
        )?;

        for category in Category::ALL {
            conn.execute(
                "INSERT OR IGNORE INTO categories (name) VALUES (?)",
                params![category.as_str()],
            )?;
        }

        info!(path = %self.db_path, "Database migrations complete");
        Ok(())
    }
}

impl RecordStore for Database {
    fn get_transaction(&self, id: &str) -> Result<Option<Transaction>> {
        self.find_transaction(id)
    }

    fn category_exists(&self, name: &str) -> Result<bool> {
        self.has_category(name)
    }

    fn insert_feedback(&self, feedback: &FeedbackRecord) -> Result<i64> {
        self.create_feedback(feedback)
    }

    fn mark_feedback_processed(&self, id: i64) -> Result<()> {
        self.set_feedback_processed(id)
    }

    fn upsert_learning_pattern(
        &self,
        kind: PatternKind,
        pattern_key: &str,
        category: Category,
        success: bool,
    ) -> Result<LearningPattern> {
        self.bump_learning_pattern(kind, pattern_key, category, success)
    }
}
