//! Model-definition storage
//!
//! Write-side CRUD over the models file. The streaming core only ever reads
//! this file; all mutation goes through here. Built-in identifiers cannot be
//! edited or removed — custom entries may still shadow them at resolution.

use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{info, warn};
use unistream_providers::{ModelEntry, ModelsFile};

/// Identifiers served from the built-in table
pub const BUILT_IN_IDS: &[&str] = &["google", "deepseek", "moonshot", "qwen", "spark"];

/// Errors surfaced by store mutations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An entry with the same id already exists
    #[error("model id already exists")]
    Duplicate,

    /// No entry with this id
    #[error("model not found")]
    NotFound,

    /// Built-in models cannot be edited or removed
    #[error("built-in models cannot be modified")]
    BuiltIn,

    /// Failed to persist the file
    #[error("failed to save models file: {0}")]
    Io(#[from] std::io::Error),
}

/// File-backed model-definition store
#[derive(Debug)]
pub struct ModelStore {
    path: PathBuf,
    // serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl ModelStore {
    /// Create a store over `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Load the full document; absence or corruption degrades to empty
    pub fn load(&self) -> ModelsFile {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return ModelsFile::default(),
            Err(e) => {
                warn!(path = %self.path.display(), "failed to read models file: {e}");
                return ModelsFile::default();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(path = %self.path.display(), "malformed models file: {e}");
            ModelsFile::default()
        })
    }

    fn save(&self, file: &ModelsFile) -> Result<(), StoreError> {
        let raw = serde_json::to_string_pretty(file).expect("models file serializes");
        std::fs::write(&self.path, raw)?;
        Ok(())
    }

    /// Fetch one entry by id
    pub fn get(&self, id: &str) -> Option<ModelEntry> {
        self.load().models.into_iter().find(|m| m.id == id)
    }

    /// Add a new entry. Fails on duplicate ids.
    pub fn add(&self, mut entry: ModelEntry) -> Result<ModelEntry, StoreError> {
        let _guard = self.write_lock.lock().expect("store lock poisoned");
        let mut file = self.load();
        if file.models.iter().any(|m| m.id == entry.id) {
            return Err(StoreError::Duplicate);
        }
        entry.api_key_name = entry.api_key_name.to_uppercase();
        entry.enabled = true;
        file.models.push(entry.clone());
        self.save(&file)?;
        info!(id = %entry.id, "added model");
        Ok(entry)
    }

    /// Replace an existing custom entry. Built-in ids are rejected.
    pub fn update(&self, id: &str, mut entry: ModelEntry) -> Result<ModelEntry, StoreError> {
        if BUILT_IN_IDS.contains(&id) {
            warn!(id, "attempted to modify built-in model");
            return Err(StoreError::BuiltIn);
        }
        let _guard = self.write_lock.lock().expect("store lock poisoned");
        let mut file = self.load();
        let Some(existing) = file.models.iter_mut().find(|m| m.id == id) else {
            return Err(StoreError::NotFound);
        };
        entry.id = id.to_string();
        entry.api_key_name = entry.api_key_name.to_uppercase();
        entry.enabled = existing.enabled;
        *existing = entry.clone();
        self.save(&file)?;
        info!(id, "updated model");
        Ok(entry)
    }

    /// Remove a custom entry. Built-in ids are rejected.
    pub fn delete(&self, id: &str) -> Result<(), StoreError> {
        if BUILT_IN_IDS.contains(&id) {
            warn!(id, "attempted to delete built-in model");
            return Err(StoreError::BuiltIn);
        }
        let _guard = self.write_lock.lock().expect("store lock poisoned");
        let mut file = self.load();
        let before = file.models.len();
        file.models.retain(|m| m.id != id);
        if file.models.len() == before {
            return Err(StoreError::NotFound);
        }
        self.save(&file)?;
        info!(id, "deleted model");
        Ok(())
    }
}
