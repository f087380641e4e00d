//! Transaction records and the category taxonomy

use rusqlite::{params, OptionalExtension};

use super::Database;
use crate::error::Result;
use crate::models::{Category, Transaction};

impl Database {
    /// Insert or replace a transaction, optionally with the category it was
    /// assigned
    pub fn insert_transaction(&self, tx: &Transaction, category: Option<Category>) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO transactions (id, description, amount, date, merchant, category)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                description = excluded.description,
                amount = excluded.amount,
                date = excluded.date,
                merchant = excluded.merchant,
                category = COALESCE(excluded.category, transactions.category)
            "#,
            params![
                tx.id,
                tx.description,
                tx.amount,
                tx.date,
                tx.merchant,
                category.map(|c| c.as_str()),
            ],
        )?;
        Ok(())
    }

    /// Look up a transaction by id
    pub fn find_transaction(&self, id: &str) -> Result<Option<Transaction>> {
        let conn = self.conn()?;
        let tx = conn
            .query_row(
                "SELECT id, description, amount, date, merchant FROM transactions WHERE id = ?",
                params![id],
                |row| {
                    Ok(Transaction {
                        id: row.get(0)?,
                        description: row.get(1)?,
                        amount: row.get(2)?,
                        date: row.get(3)?,
                        merchant: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(tx)
    }

    /// Category currently stored for a transaction
    pub fn transaction_category(&self, id: &str) -> Result<Option<Category>> {
        let conn = self.conn()?;
        let stored: Option<Option<String>> = conn
            .query_row(
                "SELECT category FROM transactions WHERE id = ?",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(stored.flatten().and_then(|s| s.parse().ok()))
    }

    /// Update the stored category of a transaction
    pub fn set_transaction_category(&self, id: &str, category: Category) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE transactions SET category = ? WHERE id = ?",
            params![category.as_str(), id],
        )?;
        Ok(())
    }

    /// Category names in the taxonomy, in id order
    pub fn list_categories(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT name FROM categories ORDER BY id")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(names)
    }

    /// Whether a category name is part of the taxonomy
    pub fn has_category(&self, name: &str) -> Result<bool> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM categories WHERE name = ?",
            params![name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}
