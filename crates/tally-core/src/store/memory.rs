//! In-process key-value store

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use super::KeyValueStore;
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    Set(BTreeSet<String>),
    List(Vec<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: Value) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }
}

/// Thread-safe in-memory store
///
/// `set_available(false)` makes every operation fail with
/// `Error::StoreUnavailable`, which is how tests exercise outage paths.
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
    available: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Toggle simulated availability
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        match self.entries.lock() {
            Ok(map) => {
                let now = Instant::now();
                map.values().filter(|e| !e.is_expired(now)).count()
            }
            Err(_) => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Entry>>> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(Error::StoreUnavailable("memory store offline".into()));
        }
        self.entries
            .lock()
            .map_err(|_| Error::StoreUnavailable("memory store lock poisoned".into()))
    }

    /// Lock and drop `key` first if it has expired
    fn lock_live(&self, key: &str) -> Result<MutexGuard<'_, HashMap<String, Entry>>> {
        let mut map = self.lock()?;
        let now = Instant::now();
        if map.get(key).map(|e| e.is_expired(now)).unwrap_or(false) {
            map.remove(key);
        }
        Ok(map)
    }
}

fn wrong_type(key: &str) -> Error {
    Error::InvalidData(format!("Key '{}' holds a different kind of value", key))
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let map = self.lock_live(key)?;
        match map.get(key) {
            None => Ok(None),
            Some(Entry {
                value: Value::Str(s),
                ..
            }) => Ok(Some(s.clone())),
            Some(_) => Err(wrong_type(key)),
        }
    }

    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let mut map = self.lock()?;
        map.insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_string()),
                expires_at: ttl.map(|d| Instant::now() + d),
            },
        );
        Ok(())
    }

    fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        let map = self.lock_live(key)?;
        let now = Instant::now();
        Ok(map
            .get(key)
            .and_then(|e| e.expires_at)
            .map(|at| at.saturating_duration_since(now)))
    }

    fn delete(&self, key: &str) -> Result<()> {
        let mut map = self.lock()?;
        map.remove(key);
        Ok(())
    }

    fn incr(&self, key: &str, by: i64) -> Result<i64> {
        let mut map = self.lock_live(key)?;
        let entry = map
            .entry(key.to_string())
            .or_insert_with(|| Entry::new(Value::Str("0".to_string())));
        let current = match &entry.value {
            Value::Str(s) => s
                .parse::<i64>()
                .map_err(|_| Error::InvalidData(format!("Key '{}' is not an integer", key)))?,
            _ => return Err(wrong_type(key)),
        };
        let next = current + by;
        entry.value = Value::Str(next.to_string());
        Ok(next)
    }

    fn sadd(&self, key: &str, member: &str) -> Result<()> {
        let mut map = self.lock_live(key)?;
        let entry = map
            .entry(key.to_string())
            .or_insert_with(|| Entry::new(Value::Set(BTreeSet::new())));
        match &mut entry.value {
            Value::Set(set) => {
                set.insert(member.to_string());
                Ok(())
            }
            _ => Err(wrong_type(key)),
        }
    }

    fn srem(&self, key: &str, member: &str) -> Result<()> {
        let mut map = self.lock_live(key)?;
        match map.get_mut(key) {
            None => Ok(()),
            Some(Entry {
                value: Value::Set(set),
                ..
            }) => {
                set.remove(member);
                Ok(())
            }
            Some(_) => Err(wrong_type(key)),
        }
    }

    fn smembers(&self, key: &str) -> Result<Vec<String>> {
        let map = self.lock_live(key)?;
        match map.get(key) {
            None => Ok(Vec::new()),
            Some(Entry {
                value: Value::Set(set),
                ..
            }) => Ok(set.iter().cloned().collect()),
            Some(_) => Err(wrong_type(key)),
        }
    }

    fn rpush(&self, key: &str, value: &str) -> Result<()> {
        let mut map = self.lock_live(key)?;
        let entry = map
            .entry(key.to_string())
            .or_insert_with(|| Entry::new(Value::List(Vec::new())));
        match &mut entry.value {
            Value::List(list) => {
                list.push(value.to_string());
                Ok(())
            }
            _ => Err(wrong_type(key)),
        }
    }

    fn lrange_all(&self, key: &str) -> Result<Vec<String>> {
        let map = self.lock_live(key)?;
        match map.get(key) {
            None => Ok(Vec::new()),
            Some(Entry {
                value: Value::List(list),
                ..
            }) => Ok(list.clone()),
            Some(_) => Err(wrong_type(key)),
        }
    }

    fn expire(&self, key: &str, ttl: Duration) -> Result<()> {
        let mut map = self.lock_live(key)?;
        if let Some(entry) = map.get_mut(key) {
            entry.expires_at = Some(Instant::now() + ttl);
        }
        Ok(())
    }
}
