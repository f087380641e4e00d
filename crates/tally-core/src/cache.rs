//! Content-addressed category cache
//!
//! Keys are `category_cache:` + SHA-256 of the normalized fingerprint.
//! User corrections are written with the long TTL, machine suggestions with
//! the short one. A failing store never fails classification: reads degrade
//! to misses and writes to no-ops, both logged.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::CacheConfig;
use crate::error::{Error, Result};
use crate::fingerprint::digest;
use crate::models::{CacheEntry, CacheProvenance, Category};
use crate::store::KeyValueStore;

pub const CACHE_KEY_PREFIX: &str = "category_cache:";

/// Stored payload
#[derive(Debug, Serialize, Deserialize)]
struct CachedLabel {
    category: Category,
    provenance: CacheProvenance,
}

pub struct CategoryCache {
    store: Arc<dyn KeyValueStore>,
    user_corrected_ttl: Duration,
    ai_suggested_ttl: Duration,
}

impl CategoryCache {
    pub fn new(store: Arc<dyn KeyValueStore>, config: &CacheConfig) -> Self {
        Self {
            store,
            user_corrected_ttl: config.user_corrected_ttl(),
            ai_suggested_ttl: config.ai_suggested_ttl(),
        }
    }

    /// Namespaced cache key for a normalized fingerprint
    pub fn key_for(normalized: &str) -> String {
        format!("{}{}", CACHE_KEY_PREFIX, digest(normalized))
    }

    pub fn ttl_for(&self, is_user_correction: bool) -> Duration {
        if is_user_correction {
            self.user_corrected_ttl
        } else {
            self.ai_suggested_ttl
        }
    }

    /// Look up a category; store failures surface as `CacheUnavailable`
    pub fn try_get(&self, normalized: &str) -> Result<Option<Category>> {
        let key = Self::key_for(normalized);
        let raw = self
            .store
            .get(&key)
            .map_err(|e| Error::CacheUnavailable(e.to_string()))?;

        Ok(raw.and_then(|raw| match serde_json::from_str::<CachedLabel>(&raw) {
            Ok(label) => Some(label.category),
            Err(e) => {
                warn!(key = %key, error = %e, "Discarding unreadable cache entry");
                None
            }
        }))
    }

    /// Look up a category, treating any failure as a miss
    pub fn get(&self, normalized: &str) -> Option<Category> {
        match self.try_get(normalized) {
            Ok(hit) => hit,
            Err(e) => {
                warn!(error = %e, "Cache read failed, treating as miss");
                None
            }
        }
    }

    /// Write a category; store failures surface as `CacheUnavailable`
    pub fn try_set(&self, normalized: &str, category: Category, is_user_correction: bool) -> Result<()> {
        let label = CachedLabel {
            category,
            provenance: if is_user_correction {
                CacheProvenance::UserCorrected
            } else {
                CacheProvenance::AiSuggested
            },
        };
        let value = serde_json::to_string(&label)?;
        self.store
            .set(
                &Self::key_for(normalized),
                &value,
                Some(self.ttl_for(is_user_correction)),
            )
            .map_err(|e| Error::CacheUnavailable(e.to_string()))
    }

    /// Write a category, logging and swallowing failures
    pub fn set(&self, normalized: &str, category: Category, is_user_correction: bool) {
        if let Err(e) = self.try_set(normalized, category, is_user_correction) {
            warn!(error = %e, category = %category, "Cache write failed, skipping");
        }
    }

    /// Full entry with provenance and expiry (diagnostics)
    pub fn entry(&self, normalized: &str) -> Result<Option<CacheEntry>> {
        let key = Self::key_for(normalized);
        let raw = match self
            .store
            .get(&key)
            .map_err(|e| Error::CacheUnavailable(e.to_string()))?
        {
            Some(raw) => raw,
            None => return Ok(None),
        };
        let label: CachedLabel = serde_json::from_str(&raw)?;
        let remaining = self
            .store
            .ttl(&key)
            .map_err(|e| Error::CacheUnavailable(e.to_string()))?
            .unwrap_or_default();
        let expires_at = Utc::now()
            + chrono::Duration::from_std(remaining).unwrap_or_else(|_| chrono::Duration::zero());

        Ok(Some(CacheEntry {
            key,
            category: label.category,
            expires_at,
            provenance: label.provenance,
        }))
    }
}
