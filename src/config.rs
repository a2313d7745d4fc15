//! Runtime settings for the stats client
//!
//! Defaults point at the public API and the platform cache directory; the CLI
//! overrides individual fields from flags and environment variables.

use std::path::PathBuf;

use crate::api::{RetryPolicy, BASE_URL, USER_AGENT};
use crate::cache::{ExpiringCache, JsonFileBackend, MemoryBackend};

/// Everything needed to build a [`crate::api::StatsClient`]
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Origin every request path is joined onto
    pub base_url: String,
    /// User agent sent with every request
    pub user_agent: String,
    /// Cache document location; `None` keeps the cache in memory
    pub cache_file: Option<PathBuf>,
    /// Whether responses are cached at all
    pub use_cache: bool,
    /// Policy of the transport serving reads
    pub read_policy: RetryPolicy,
    /// Policy of the transport serving side-effecting calls
    pub write_policy: RetryPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: BASE_URL.to_string(),
            user_agent: USER_AGENT.to_string(),
            cache_file: JsonFileBackend::default_path(),
            use_cache: true,
            read_policy: RetryPolicy::resilient(),
            write_policy: RetryPolicy::single_attempt(),
        }
    }
}

impl Settings {
    /// Opens the cache these settings describe
    ///
    /// With caching disabled, or without a usable cache location, the cache
    /// lives only for the current process.
    pub fn open_cache(&self) -> ExpiringCache {
        match (&self.cache_file, self.use_cache) {
            (Some(path), true) => ExpiringCache::open(JsonFileBackend::new(path.clone())),
            _ => ExpiringCache::open(MemoryBackend::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.base_url, "https://op.gg/supervive/");
        assert!(settings.use_cache);
        assert_eq!(settings.read_policy.max_attempts, 15);
        assert_eq!(settings.write_policy.max_attempts, 1);
    }

    #[test]
    fn test_open_cache_uses_file_when_enabled() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("cache.json");
        let settings = Settings {
            cache_file: Some(path.clone()),
            ..Settings::default()
        };

        let mut cache = settings.open_cache();
        cache
            .set_absolute("k", &json!(1), Duration::from_secs(60))
            .unwrap();

        assert!(path.exists());
    }

    #[test]
    fn test_open_cache_in_memory_when_disabled() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("cache.json");
        let settings = Settings {
            cache_file: Some(path.clone()),
            use_cache: false,
            ..Settings::default()
        };

        let mut cache = settings.open_cache();
        cache
            .set_absolute("k", &json!(1), Duration::from_secs(60))
            .unwrap();

        assert!(!path.exists(), "Disabled cache should not touch disk");
    }
}
