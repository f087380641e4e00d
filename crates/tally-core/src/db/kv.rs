//! SQLite-backed key-value entries
//!
//! Strings are stored raw; sets and lists as JSON arrays. Expiry is
//! checked on every read and expired rows are purged by the next write
//! that touches the key.

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use super::Database;
use crate::error::{Error, Result};
use crate::store::KeyValueStore;

const KIND_STRING: &str = "string";
const KIND_SET: &str = "set";
const KIND_LIST: &str = "list";

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn expiry_ms(ttl: Duration) -> i64 {
    now_ms().saturating_add(i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX))
}

struct Row {
    kind: String,
    value: String,
    expires_at: Option<i64>,
}

fn read_live(conn: &Connection, key: &str) -> Result<Option<Row>> {
    let row = conn
        .query_row(
            r#"
            SELECT kind, value, expires_at FROM kv_entries
            WHERE key = ?1 AND (expires_at IS NULL OR expires_at > ?2)
            "#,
            params![key, now_ms()],
            |row| {
                Ok(Row {
                    kind: row.get(0)?,
                    value: row.get(1)?,
                    expires_at: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}

fn purge_expired(conn: &Connection, key: &str) -> Result<()> {
    conn.execute(
        "DELETE FROM kv_entries WHERE key = ?1 AND expires_at IS NOT NULL AND expires_at <= ?2",
        params![key, now_ms()],
    )?;
    Ok(())
}

fn write(conn: &Connection, key: &str, kind: &str, value: &str, expires_at: Option<i64>) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO kv_entries (key, kind, value, expires_at) VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT(key) DO UPDATE SET
            kind = excluded.kind, value = excluded.value, expires_at = excluded.expires_at
        "#,
        params![key, kind, value, expires_at],
    )?;
    Ok(())
}

fn wrong_type(key: &str) -> Error {
    Error::InvalidData(format!("Key '{}' holds a different kind of value", key))
}

fn decode_set(row: &Row, key: &str) -> Result<BTreeSet<String>> {
    if row.kind != KIND_SET {
        return Err(wrong_type(key));
    }
    Ok(serde_json::from_str(&row.value)?)
}

fn decode_list(row: &Row, key: &str) -> Result<Vec<String>> {
    if row.kind != KIND_LIST {
        return Err(wrong_type(key));
    }
    Ok(serde_json::from_str(&row.value)?)
}

impl Database {
    /// Run `f` inside an immediate transaction with `key` purged if expired
    fn with_key_tx<T>(&self, key: &str, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        purge_expired(&tx, key)?;
        let out = f(&*tx)?;
        tx.commit()?;
        Ok(out)
    }

    /// Drop every expired entry
    pub fn purge_expired_entries(&self) -> Result<usize> {
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM kv_entries WHERE expires_at IS NOT NULL AND expires_at <= ?1",
            params![now_ms()],
        )?;
        Ok(removed)
    }
}

impl KeyValueStore for Database {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        match read_live(&conn, key)? {
            None => Ok(None),
            Some(row) if row.kind == KIND_STRING => Ok(Some(row.value)),
            Some(_) => Err(wrong_type(key)),
        }
    }

    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let conn = self.conn()?;
        write(&conn, key, KIND_STRING, value, ttl.map(expiry_ms))
    }

    fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        let conn = self.conn()?;
        let remaining = read_live(&conn, key)?
            .and_then(|row| row.expires_at)
            .map(|at| Duration::from_millis(u64::try_from(at - now_ms()).unwrap_or(0)));
        Ok(remaining)
    }

    fn delete(&self, key: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM kv_entries WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn incr(&self, key: &str, by: i64) -> Result<i64> {
        self.with_key_tx(key, |conn| {
            let (current, expires_at) = match read_live(conn, key)? {
                None => (0, None),
                Some(row) if row.kind == KIND_STRING => {
                    let n = row.value.parse::<i64>().map_err(|_| {
                        Error::InvalidData(format!("Key '{}' is not an integer", key))
                    })?;
                    (n, row.expires_at)
                }
                Some(_) => return Err(wrong_type(key)),
            };
            let next = current + by;
            write(conn, key, KIND_STRING, &next.to_string(), expires_at)?;
            Ok(next)
        })
    }

    fn sadd(&self, key: &str, member: &str) -> Result<()> {
        self.with_key_tx(key, |conn| {
            let (mut set, expires_at) = match read_live(conn, key)? {
                None => (BTreeSet::new(), None),
                Some(row) => (decode_set(&row, key)?, row.expires_at),
            };
            if set.insert(member.to_string()) {
                write(conn, key, KIND_SET, &serde_json::to_string(&set)?, expires_at)?;
            }
            Ok(())
        })
    }

    fn srem(&self, key: &str, member: &str) -> Result<()> {
        self.with_key_tx(key, |conn| {
            if let Some(row) = read_live(conn, key)? {
                let mut set = decode_set(&row, key)?;
                if set.remove(member) {
                    write(conn, key, KIND_SET, &serde_json::to_string(&set)?, row.expires_at)?;
                }
            }
            Ok(())
        })
    }

    fn smembers(&self, key: &str) -> Result<Vec<String>> {
        let conn = self.conn()?;
        match read_live(&conn, key)? {
            None => Ok(Vec::new()),
            Some(row) => Ok(decode_set(&row, key)?.into_iter().collect()),
        }
    }

    fn rpush(&self, key: &str, value: &str) -> Result<()> {
        self.with_key_tx(key, |conn| {
            let (mut list, expires_at) = match read_live(conn, key)? {
                None => (Vec::new(), None),
                Some(row) => (decode_list(&row, key)?, row.expires_at),
            };
            list.push(value.to_string());
            write(conn, key, KIND_LIST, &serde_json::to_string(&list)?, expires_at)
        })
    }

    fn lrange_all(&self, key: &str) -> Result<Vec<String>> {
        let conn = self.conn()?;
        match read_live(&conn, key)? {
            None => Ok(Vec::new()),
            Some(row) => decode_list(&row, key),
        }
    }

    fn expire(&self, key: &str, ttl: Duration) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            UPDATE kv_entries SET expires_at = ?2
            WHERE key = ?1 AND (expires_at IS NULL OR expires_at > ?3)
            "#,
            params![key, expiry_ms(ttl), now_ms()],
        )?;
        Ok(())
    }
}
