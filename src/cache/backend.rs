//! Persistence backends for the expiring cache

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use directories::ProjectDirs;

use super::CacheEntry;

/// Where the cache's entries live between process runs
pub trait CacheBackend: Send {
    /// Reads every stored entry
    ///
    /// Callers treat any error as an empty store.
    fn load(&self) -> io::Result<HashMap<String, CacheEntry>>;

    /// Replaces the stored entries with `entries`
    fn persist(&self, entries: &HashMap<String, CacheEntry>) -> io::Result<()>;
}

/// Stores the whole cache as a single JSON document
///
/// Writes go to `<path>.tmp` first and are then renamed over `<path>`, so an
/// interrupted write leaves the previous document in place.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    /// Creates a backend writing to `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the default cache file location
    ///
    /// Uses `~/.cache/svstats/cache.json` on Linux, or the equivalent
    /// platform cache directory. Returns `None` without a home directory.
    pub fn default_path() -> Option<PathBuf> {
        let project_dirs = ProjectDirs::from("", "", "svstats")?;
        Some(project_dirs.cache_dir().join("cache.json"))
    }

    /// Path of the canonical cache document
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }

    /// Writes `entries` to the temporary file without touching the canonical one
    ///
    /// Returns the temporary path to hand to [`JsonFileBackend::commit`].
    pub fn write_temp(&self, entries: &HashMap<String, CacheEntry>) -> io::Result<PathBuf> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_vec(entries)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let tmp = self.temp_path();
        fs::write(&tmp, json)?;
        Ok(tmp)
    }

    /// Atomically replaces the canonical file with a previously written temp file
    pub fn commit(&self, tmp: &Path) -> io::Result<()> {
        fs::rename(tmp, &self.path)
    }
}

impl CacheBackend for JsonFileBackend {
    fn load(&self) -> io::Result<HashMap<String, CacheEntry>> {
        let content = fs::read(&self.path)?;
        serde_json::from_slice(&content).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    fn persist(&self, entries: &HashMap<String, CacheEntry>) -> io::Result<()> {
        let tmp = self.write_temp(entries)?;
        self.commit(&tmp)
    }
}

/// Keeps the "persisted" entries in memory
///
/// Clones share storage, so a test can inspect what the cache last persisted.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    stored: Arc<Mutex<HashMap<String, CacheEntry>>>,
}

impl MemoryBackend {
    /// Creates an empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the last persisted entries
    pub fn snapshot(&self) -> HashMap<String, CacheEntry> {
        self.stored
            .lock()
            .map(|stored| stored.clone())
            .unwrap_or_default()
    }
}

impl CacheBackend for MemoryBackend {
    fn load(&self) -> io::Result<HashMap<String, CacheEntry>> {
        Ok(self.snapshot())
    }

    fn persist(&self, entries: &HashMap<String, CacheEntry>) -> io::Result<()> {
        let mut stored = self
            .stored
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "memory backend lock poisoned"))?;
        *stored = entries.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn sample() -> HashMap<String, CacheEntry> {
        let mut entries = HashMap::new();
        entries.insert(
            "search:foo".to_string(),
            CacheEntry::absolute(json!([{"name": "foo"}]), 0.0, 10.0),
        );
        entries
    }

    #[test]
    fn test_persist_then_load() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let backend = JsonFileBackend::new(temp_dir.path().join("cache.json"));

        backend.persist(&sample()).expect("Persist should succeed");
        let loaded = backend.load().expect("Load should succeed");

        assert_eq!(loaded, sample());
        assert!(!backend.temp_path().exists(), "Temp file should be renamed away");
    }

    #[test]
    fn test_persist_creates_directory_if_missing() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("nested").join("dir").join("cache.json");
        let backend = JsonFileBackend::new(path.clone());

        backend.persist(&sample()).expect("Persist should succeed");

        assert!(path.exists(), "Cache file should exist");
    }

    #[test]
    fn test_load_missing_file_is_error() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let backend = JsonFileBackend::new(temp_dir.path().join("absent.json"));
        assert!(backend.load().is_err());
    }

    #[test]
    fn test_load_corrupt_file_is_error() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("cache.json");
        fs::write(&path, "{not json").unwrap();

        assert!(JsonFileBackend::new(path).load().is_err());
    }

    #[test]
    fn test_temp_path_appends_suffix() {
        let backend = JsonFileBackend::new("/tmp/x/cache.json");
        assert_eq!(backend.temp_path(), PathBuf::from("/tmp/x/cache.json.tmp"));
    }

    #[test]
    fn test_default_path_contains_project_name() {
        if let Some(path) = JsonFileBackend::default_path() {
            assert!(path.to_string_lossy().contains("svstats"));
        }
        // Test passes if default_path() returns None (e.g., no home directory in CI)
    }

    #[test]
    fn test_memory_backend_shares_storage_between_clones() {
        let backend = MemoryBackend::new();
        let observer = backend.clone();

        backend.persist(&sample()).unwrap();

        assert_eq!(observer.snapshot(), sample());
    }
}
