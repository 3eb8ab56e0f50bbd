//! In-memory cache manager shared by every fetcher
//!
//! Provides a `CacheManager` that stores tagged values with absolute expiry
//! instants. Clones share the same underlying store, so a single manager can be
//! handed to each component at construction time.

use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

use super::STATIC_DATA_TTL;

/// Errors that can occur when writing to the cache
#[derive(Debug, Error)]
pub enum CacheError {
    /// The value could not be serialized to JSON
    #[error("Failed to serialize cache value: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A value held by the cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheValue {
    /// Opaque raw bytes
    Bytes(Vec<u8>),
    /// Plain text
    Text(String),
    /// JSON-serialized text, read back through `get_json`
    Json(String),
}

impl CacheValue {
    /// Returns the textual form of the value, if it has one
    pub fn as_str(&self) -> Option<&str> {
        match self {
            CacheValue::Text(s) | CacheValue::Json(s) => Some(s),
            CacheValue::Bytes(_) => None,
        }
    }
}

/// A stored value with its absolute expiry
#[derive(Debug)]
struct CacheEntry {
    value: CacheValue,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Manages reading and writing cached data in memory
///
/// Every read re-checks the entry's expiry, so an entry that has expired but
/// not yet been swept is reported as absent. Writes always overwrite.
///
/// A zero TTL means "use the default TTL" (the static data TTL).
#[derive(Debug, Clone)]
pub struct CacheManager {
    entries: Arc<DashMap<String, CacheEntry>>,
    default_ttl: Duration,
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheManager {
    /// Creates an empty CacheManager using the static data TTL as default
    pub fn new() -> Self {
        Self::with_default_ttl(STATIC_DATA_TTL)
    }

    /// Creates an empty CacheManager with a custom default TTL
    pub fn with_default_ttl(default_ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            default_ttl,
        }
    }

    fn expiry_for(&self, ttl: Duration) -> Instant {
        let ttl = if ttl.is_zero() { self.default_ttl } else { ttl };
        let now = Instant::now();
        // Saturate absurd TTLs instead of overflowing the clock
        now.checked_add(ttl)
            .unwrap_or_else(|| now + Duration::from_secs(100 * 365 * 24 * 60 * 60))
    }

    /// Stores a value under `key`, replacing anything already there
    pub fn set(&self, key: impl Into<String>, value: CacheValue, ttl: Duration) {
        let entry = CacheEntry {
            value,
            expires_at: self.expiry_for(ttl),
        };
        self.entries.insert(key.into(), entry);
    }

    /// Retrieves a live value, or `None` if absent or expired
    pub fn get(&self, key: &str) -> Option<CacheValue> {
        let entry = self.entries.get(key)?;
        if entry.is_expired(Instant::now()) {
            None
        } else {
            Some(entry.value.clone())
        }
    }

    /// Stores a plain text value
    pub fn set_string(&self, key: impl Into<String>, value: impl Into<String>, ttl: Duration) {
        self.set(key, CacheValue::Text(value.into()), ttl);
    }

    /// Retrieves a value with a textual shape
    ///
    /// Returns `None` if the entry is absent, expired, or holds raw bytes.
    pub fn get_string(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            CacheValue::Text(s) | CacheValue::Json(s) => Some(s),
            CacheValue::Bytes(_) => None,
        }
    }

    /// Serializes `value` to JSON and stores it
    ///
    /// # Returns
    /// * `Ok(())` on success
    /// * `Err(CacheError::Serialize)` if the value cannot be serialized
    pub fn set_json<T: Serialize + ?Sized>(
        &self,
        key: impl Into<String>,
        value: &T,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let json = serde_json::to_string(value)?;
        self.set(key, CacheValue::Json(json), ttl);
        Ok(())
    }

    /// Retrieves and deserializes a JSON value
    ///
    /// Returns `None` on a miss, on expiry, or when the stored text does not
    /// deserialize into `T`. Callers treat `None` as "must refetch".
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let text = self.get_string(key)?;
        match serde_json::from_str(&text) {
            Ok(value) => Some(value),
            Err(e) => {
                log::debug!("Discarding undecodable cache entry {key}: {e}");
                None
            }
        }
    }

    /// Removes a single entry
    pub fn delete(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Removes every entry regardless of expiry
    pub fn flush(&self) {
        self.entries.clear();
    }

    /// Number of entries currently stored, including expired ones not yet swept
    pub fn item_count(&self) -> usize {
        self.entries.len()
    }

    /// Removes every expired entry and returns how many were dropped
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.entries.len())
    }
}
