//! Key-value store abstraction
//!
//! The cache, metrics recorder and alert engine all sit on top of a generic
//! key-value store with per-key expiry, counters, sets and append-only lists.
//! Every operation returns a `Result` so an unavailable store surfaces as
//! `Error::StoreUnavailable` (or a database error) instead of a panic; the
//! callers decide how to degrade.
//!
//! Implementations:
//! - `MemoryStore`: process-local, for single-node deployments and tests
//! - `Database`: SQLite-backed, survives restarts (see `db::kv`)

mod memory;

pub use memory::MemoryStore;

use std::time::Duration;

use crate::error::Result;

/// Generic key-value store with TTL support
///
/// Expired keys are invisible to every read. There is no eviction pass;
/// implementations drop expired entries lazily when they touch them.
pub trait KeyValueStore: Send + Sync {
    /// Get a string value
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Set a string value, replacing any previous value and expiry
    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;

    /// Remaining time to live (None when the key is missing or has no expiry)
    fn ttl(&self, key: &str) -> Result<Option<Duration>>;

    /// Delete a key of any kind
    fn delete(&self, key: &str) -> Result<()>;

    /// Increment an integer counter, creating it at zero; keeps any expiry
    fn incr(&self, key: &str, by: i64) -> Result<i64>;

    /// Add a member to a set
    fn sadd(&self, key: &str, member: &str) -> Result<()>;

    /// Remove a member from a set
    fn srem(&self, key: &str, member: &str) -> Result<()>;

    /// All members of a set, sorted
    fn smembers(&self, key: &str) -> Result<Vec<String>>;

    /// Append to a list
    fn rpush(&self, key: &str, value: &str) -> Result<()>;

    /// Every element of a list, in insertion order
    fn lrange_all(&self, key: &str) -> Result<Vec<String>>;

    /// Set the expiry of an existing key (no-op when missing)
    fn expire(&self, key: &str, ttl: Duration) -> Result<()>;
}
