//! Caller API-key storage
//!
//! A flat `slot name → key` JSON file behind an in-memory cache validated by
//! file modification time. Caching lives here, in the serving layer — the
//! streaming core resolves credentials fresh on every request.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;
use std::time::SystemTime;
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct KeyCache {
    keys: HashMap<String, String>,
    mtime: Option<SystemTime>,
}

/// File-backed API-key store with an mtime-validated cache
#[derive(Debug)]
pub struct KeyStore {
    path: PathBuf,
    cache: RwLock<KeyCache>,
}

impl KeyStore {
    /// Create a store over `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: RwLock::new(KeyCache::default()),
        }
    }

    fn file_mtime(&self) -> Option<SystemTime> {
        std::fs::metadata(&self.path).and_then(|m| m.modified()).ok()
    }

    /// Load the key map, reusing the cache while the file is unchanged
    pub fn load(&self) -> HashMap<String, String> {
        let mtime = self.file_mtime();
        {
            let cache = self.cache.read().expect("key cache poisoned");
            if cache.mtime.is_some() && cache.mtime == mtime {
                return cache.keys.clone();
            }
        }

        let keys = match std::fs::read_to_string(&self.path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(path = %self.path.display(), "malformed api-key file: {e}");
                HashMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                warn!(path = %self.path.display(), "failed to read api-key file: {e}");
                HashMap::new()
            }
        };

        let mut cache = self.cache.write().expect("key cache poisoned");
        cache.keys = keys.clone();
        cache.mtime = mtime;
        debug!("api keys loaded from file, cache updated");
        keys
    }

    /// Persist the key map and refresh the cache
    pub fn save(&self, keys: HashMap<String, String>) -> std::io::Result<()> {
        let raw = serde_json::to_string_pretty(&keys).expect("key map serializes");
        std::fs::write(&self.path, raw)?;
        let mut cache = self.cache.write().expect("key cache poisoned");
        cache.keys = keys;
        cache.mtime = self.file_mtime();
        debug!("api keys saved, cache updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = KeyStore::new(dir.path().join("api_keys.json"));
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_save_then_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = KeyStore::new(dir.path().join("api_keys.json"));

        let keys: HashMap<String, String> =
            [("GOOGLE_API_KEY".to_string(), "k1".to_string())].into();
        store.save(keys.clone()).unwrap();
        assert_eq!(store.load(), keys);
    }

    #[test]
    fn test_external_edit_invalidates_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api_keys.json");
        let store = KeyStore::new(&path);

        store
            .save([("A".to_string(), "1".to_string())].into())
            .unwrap();
        assert_eq!(store.load().get("A").map(String::as_str), Some("1"));

        // rewrite behind the store's back with a distinct mtime
        std::fs::write(&path, r#"{"A":"2"}"#).unwrap();
        let newer = std::fs::metadata(&path).unwrap().modified().unwrap()
            + std::time::Duration::from_secs(2);
        let file = std::fs::File::options().append(true).open(&path).unwrap();
        file.set_modified(newer).unwrap();

        assert_eq!(store.load().get("A").map(String::as_str), Some("2"));
    }

    #[test]
    fn test_malformed_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api_keys.json");
        std::fs::write(&path, "{nope").unwrap();

        let store = KeyStore::new(&path);
        assert!(store.load().is_empty());
    }
}
