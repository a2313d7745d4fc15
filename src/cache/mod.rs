//! Cache module for storing API responses to disk
//!
//! This module provides an expiring key-value cache whose entries use either
//! an absolute deadline or a sliding window that is renewed on every read.
//! Entries are kept in memory and written through to a persistence backend
//! after every mutation, so the on-disk file always mirrors the live state.

mod backend;
mod clock;
mod entry;
mod store;

use thiserror::Error;

pub use backend::{CacheBackend, JsonFileBackend, MemoryBackend};
pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::{CacheEntry, Expiration};
pub use store::ExpiringCache;

/// Errors that can occur when mutating the cache
///
/// Load failures never surface here: an unreadable store is treated as empty.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Writing the backing store failed
    #[error("Failed to persist cache: {0}")]
    Io(#[from] std::io::Error),

    /// A value could not be converted to or from JSON
    #[error("Failed to serialize cache value: {0}")]
    Serialize(#[from] serde_json::Error),
}
