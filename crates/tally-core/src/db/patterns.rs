//! Learning pattern counters

use rusqlite::{params, OptionalExtension, Row};

use super::{parse_datetime, Database};
use crate::error::Result;
use crate::models::{Category, LearningPattern, PatternKind};

fn row_to_pattern(row: &Row) -> rusqlite::Result<LearningPattern> {
    let kind_str: String = row.get(0)?;
    let category_str: String = row.get(2)?;
    let updated_at_str: String = row.get(6)?;

    Ok(LearningPattern {
        kind: kind_str.parse().unwrap_or(PatternKind::Keyword),
        pattern_key: row.get(1)?,
        category: category_str.parse().unwrap_or(Category::Other),
        occurrence_count: row.get(3)?,
        success_count: row.get(4)?,
        confidence_score: row.get(5)?,
        updated_at: parse_datetime(&updated_at_str),
    })
}

impl Database {
    /// Increment counters for a pattern and recompute its confidence score
    pub fn bump_learning_pattern(
        &self,
        kind: PatternKind,
        pattern_key: &str,
        category: Category,
        success: bool,
    ) -> Result<LearningPattern> {
        let conn = self.conn()?;
        let success_inc: i64 = if success { 1 } else { 0 };

        conn.execute(
            r#"
            INSERT INTO learning_patterns (
                kind, pattern_key, category, occurrence_count, success_count, confidence_score
            ) VALUES (?1, ?2, ?3, 1, ?4, CAST(?4 AS REAL))
            ON CONFLICT(kind, pattern_key, category) DO UPDATE SET
                occurrence_count = occurrence_count + 1,
                success_count = success_count + ?4,
                confidence_score = CAST(success_count + ?4 AS REAL) / (occurrence_count + 1),
                updated_at = CURRENT_TIMESTAMP
            "#,
            params![kind.as_str(), pattern_key, category.as_str(), success_inc],
        )?;

        let pattern = conn.query_row(
            r#"
            SELECT kind, pattern_key, category, occurrence_count, success_count,
                   confidence_score, updated_at
            FROM learning_patterns
            WHERE kind = ? AND pattern_key = ? AND category = ?
            "#,
            params![kind.as_str(), pattern_key, category.as_str()],
            row_to_pattern,
        )?;

        Ok(pattern)
    }

    /// Get a single learning pattern
    pub fn get_learning_pattern(
        &self,
        kind: PatternKind,
        pattern_key: &str,
        category: Category,
    ) -> Result<Option<LearningPattern>> {
        let conn = self.conn()?;
        let pattern = conn
            .query_row(
                r#"
                SELECT kind, pattern_key, category, occurrence_count, success_count,
                       confidence_score, updated_at
                FROM learning_patterns
                WHERE kind = ? AND pattern_key = ? AND category = ?
                "#,
                params![kind.as_str(), pattern_key, category.as_str()],
                row_to_pattern,
            )
            .optional()?;
        Ok(pattern)
    }

    /// List learning patterns, most frequent first
    pub fn list_learning_patterns(
        &self,
        kind: Option<PatternKind>,
        limit: i64,
    ) -> Result<Vec<LearningPattern>> {
        let conn = self.conn()?;

        let mut sql = String::from(
            r#"
            SELECT kind, pattern_key, category, occurrence_count, success_count,
                   confidence_score, updated_at
            FROM learning_patterns
            WHERE 1=1
            "#,
        );

        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(k) = kind {
            sql.push_str(" AND kind = ?");
            params_vec.push(Box::new(k.as_str().to_string()));
        }

        sql.push_str(" ORDER BY occurrence_count DESC, pattern_key ASC LIMIT ?");
        params_vec.push(Box::new(limit));

        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();

        let mut stmt = conn.prepare(&sql)?;
        let patterns = stmt
            .query_map(params_refs.as_slice(), row_to_pattern)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(patterns)
    }
}
