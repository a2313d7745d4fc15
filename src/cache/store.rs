//! Expiring key-value store with write-through persistence

use std::collections::HashMap;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::{CacheBackend, CacheEntry, CacheError, Clock, SystemClock};

/// In-memory map of cache entries mirrored to a [`CacheBackend`]
///
/// The backend is read once in the constructor. Every mutation (a write, a
/// sliding renewal, or the lazy removal of an expired entry) is persisted
/// before the call returns.
pub struct ExpiringCache {
    entries: HashMap<String, CacheEntry>,
    backend: Box<dyn CacheBackend>,
    clock: Box<dyn Clock>,
}

impl std::fmt::Debug for ExpiringCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpiringCache")
            .field("entries", &self.entries.len())
            .finish_non_exhaustive()
    }
}

impl ExpiringCache {
    /// Opens a cache over `backend` using the wall clock
    pub fn open(backend: impl CacheBackend + 'static) -> Self {
        Self::with_clock(backend, SystemClock)
    }

    /// Opens a cache over `backend` using a custom clock
    ///
    /// A backend that cannot be read (missing file, malformed JSON) yields an
    /// empty cache.
    pub fn with_clock(backend: impl CacheBackend + 'static, clock: impl Clock + 'static) -> Self {
        let entries = match backend.load() {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                warn!(error = %e, "Discarding unreadable cache store");
                HashMap::new()
            }
        };
        debug!(entries = entries.len(), "Cache loaded");

        Self {
            entries,
            backend: Box::new(backend),
            clock: Box::new(clock),
        }
    }

    /// Returns the value stored under `key` if it has not expired
    ///
    /// Reading a sliding entry extends its deadline; reading an expired entry
    /// removes it. Both changes are persisted before returning.
    ///
    /// # Arguments
    ///
    /// * `key` - Cache key, e.g. `search:ace`
    ///
    /// # Returns
    ///
    /// * `Ok(Some(value))` - The entry was live; sliding deadlines are renewed
    /// * `Ok(None)` - No entry, or the entry had expired and was evicted
    /// * `Err(_)` - The eviction or renewal could not be written to disk
    pub fn get(&mut self, key: &str) -> Result<Option<Value>, CacheError> {
        let now = self.clock.now_secs();

        let Some(entry) = self.entries.get_mut(key) else {
            debug!(key, "Cache miss");
            return Ok(None);
        };

        if entry.is_expired(now) {
            self.entries.remove(key);
            debug!(key, "Cache entry expired");
            self.persist()?;
            return Ok(None);
        }

        let renewed = entry.renew(now);
        let value = entry.value.clone();
        if renewed {
            self.persist()?;
        }
        debug!(key, renewed, "Cache hit");
        Ok(Some(value))
    }

    /// Like [`ExpiringCache::get`], deserializing the value into `T`
    ///
    /// A stored value that no longer matches `T` is reported as absent.
    pub fn get_as<T: DeserializeOwned>(&mut self, key: &str) -> Result<Option<T>, CacheError> {
        let Some(value) = self.get(key)? else {
            return Ok(None);
        };
        match serde_json::from_value(value) {
            Ok(typed) => Ok(Some(typed)),
            Err(e) => {
                warn!(key, error = %e, "Cached value has an unexpected shape");
                Ok(None)
            }
        }
    }

    /// Stores `value` with a fixed deadline `now + ttl`
    ///
    /// Replaces any existing entry under `key` and persists the whole store.
    ///
    /// # Arguments
    ///
    /// * `key` - Cache key
    /// * `value` - Any serializable value; stored as JSON
    /// * `ttl` - Lifetime of the entry, never extended by reads
    pub fn set_absolute<T: Serialize + ?Sized>(
        &mut self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let value = serde_json::to_value(value)?;
        let entry = CacheEntry::absolute(value, self.clock.now_secs(), ttl.as_secs_f64());
        self.insert(key, entry)
    }

    /// Stores `value` with a deadline that slides by `ttl` on every read
    ///
    /// # Arguments
    ///
    /// * `key` - Cache key
    /// * `value` - Any serializable value; stored as JSON
    /// * `ttl` - Idle time after which the entry expires. Zero never renews.
    pub fn set_sliding<T: Serialize + ?Sized>(
        &mut self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let value = serde_json::to_value(value)?;
        let entry = CacheEntry::sliding(value, self.clock.now_secs(), ttl.as_secs_f64());
        self.insert(key, entry)
    }

    /// Returns the current deadline of `key` without renewing or evicting it
    pub fn expires_at(&self, key: &str) -> Option<f64> {
        self.entries.get(key).map(|entry| entry.expires_at)
    }

    /// Whether `key` is held in memory, expired or not
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of entries held in memory, including not-yet-evicted expired ones
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, key: &str, entry: CacheEntry) -> Result<(), CacheError> {
        self.entries.insert(key.to_string(), entry);
        debug!(key, "Cache entry stored");
        self.persist()
    }

    fn persist(&self) -> Result<(), CacheError> {
        self.backend.persist(&self.entries)?;
        Ok(())
    }
}
