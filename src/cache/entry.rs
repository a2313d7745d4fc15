//! Cache entry and expiration policy

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How an entry's deadline behaves after it is written
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Expiration {
    /// The deadline is fixed at write time
    Absolute,
    /// The deadline is pushed to `now + ttl_secs` on every successful read
    Sliding { ttl_secs: f64 },
}

/// A single cached value
///
/// On disk an entry is stored as
/// `{"value": .., "expires_at": .., "sliding": .., "sliding_ttl": ..}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredEntry", into = "StoredEntry")]
pub struct CacheEntry {
    /// The cached payload
    pub value: Value,
    /// Unix timestamp (seconds) after which the entry is invalid
    pub expires_at: f64,
    /// Deadline policy
    pub expiration: Expiration,
}

impl CacheEntry {
    /// Creates an entry with a fixed deadline `now + ttl_secs`
    pub fn absolute(value: Value, now: f64, ttl_secs: f64) -> Self {
        Self {
            value,
            expires_at: now + ttl_secs,
            expiration: Expiration::Absolute,
        }
    }

    /// Creates an entry whose deadline slides by `ttl_secs` on each read
    pub fn sliding(value: Value, now: f64, ttl_secs: f64) -> Self {
        Self {
            value,
            expires_at: now + ttl_secs,
            expiration: Expiration::Sliding { ttl_secs },
        }
    }

    /// Whether the entry is logically absent at `now`
    pub fn is_expired(&self, now: f64) -> bool {
        now >= self.expires_at
    }

    /// Extends a sliding deadline from `now`
    ///
    /// Returns `true` if the deadline changed and the store needs persisting.
    pub fn renew(&mut self, now: f64) -> bool {
        match self.expiration {
            Expiration::Sliding { ttl_secs } if ttl_secs > 0.0 => {
                self.expires_at = now + ttl_secs;
                true
            }
            _ => false,
        }
    }
}

/// Flat on-disk shape shared with earlier versions of the cache file
#[derive(Serialize, Deserialize)]
struct StoredEntry {
    #[serde(default)]
    value: Value,
    #[serde(default)]
    expires_at: f64,
    #[serde(default)]
    sliding: bool,
    #[serde(default)]
    sliding_ttl: f64,
}

impl From<StoredEntry> for CacheEntry {
    fn from(stored: StoredEntry) -> Self {
        let expiration = if stored.sliding {
            Expiration::Sliding {
                ttl_secs: stored.sliding_ttl,
            }
        } else {
            Expiration::Absolute
        };
        Self {
            value: stored.value,
            expires_at: stored.expires_at,
            expiration,
        }
    }
}

impl From<CacheEntry> for StoredEntry {
    fn from(entry: CacheEntry) -> Self {
        let (sliding, sliding_ttl) = match entry.expiration {
            Expiration::Absolute => (false, 0.0),
            Expiration::Sliding { ttl_secs } => (true, ttl_secs),
        };
        Self {
            value: entry.value,
            expires_at: entry.expires_at,
            sliding,
            sliding_ttl,
        }
    }
}
