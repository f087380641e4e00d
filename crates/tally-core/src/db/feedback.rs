//! User feedback operations

use rusqlite::params;

use super::{parse_datetime, Database};
use crate::error::Result;
use crate::models::{FeedbackRecord, StoredFeedback};

impl Database {
    /// Create a new feedback record
    pub fn create_feedback(&self, feedback: &FeedbackRecord) -> Result<i64> {
        let conn = self.conn()?;

        conn.execute(
            r#"
            INSERT INTO feedback (
                transaction_id, original_category, corrected_category,
                confidence_rating, source
            ) VALUES (?, ?, ?, ?, ?)
            "#,
            params![
                feedback.transaction_id,
                feedback.original_category,
                feedback.corrected_category,
                feedback.confidence_rating,
                feedback.source,
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// Stamp a feedback record as processed
    pub fn set_feedback_processed(&self, id: i64) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE feedback SET processed_at = CURRENT_TIMESTAMP WHERE id = ?",
            params![id],
        )?;
        Ok(())
    }

    /// List feedback, newest first
    pub fn list_feedback(&self, limit: i64) -> Result<Vec<StoredFeedback>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT id, transaction_id, original_category, corrected_category,
                   confidence_rating, source, created_at, processed_at
            FROM feedback
            ORDER BY id DESC
            LIMIT ?
            "#,
        )?;

        let feedback = stmt
            .query_map(params![limit], |row| {
                let created_at_str: String = row.get(6)?;
                let processed_at_str: Option<String> = row.get(7)?;

                Ok(StoredFeedback {
                    id: row.get(0)?,
                    transaction_id: row.get(1)?,
                    original_category: row.get(2)?,
                    corrected_category: row.get(3)?,
                    confidence_rating: row.get(4)?,
                    source: row.get(5)?,
                    created_at: parse_datetime(&created_at_str),
                    processed_at: processed_at_str.map(|s| parse_datetime(&s)),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(feedback)
    }

    /// Count feedback records that were never marked processed
    pub fn count_unprocessed_feedback(&self) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM feedback WHERE processed_at IS NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
