//! Persistent user preferences.
//!
//! A flat key/value store shared by the whole host. Plugin configuration and
//! the persisted enabled flags both live here, under namespaced keys.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Errors raised by a preference store.
#[derive(Debug, Error)]
pub enum PreferenceError {
    /// Backing file could not be read or written.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Value could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for preference operations.
pub type PreferenceResult<T> = Result<T, PreferenceError>;

/// Host-wide persistent key/value store.
pub trait PreferenceStore: Send + Sync {
    /// Read a raw value.
    fn get(&self, key: &str) -> Option<Value>;

    /// Write a raw value.
    fn set(&self, key: &str, value: Value) -> PreferenceResult<()>;

    /// Remove a value. Removing a missing key is not an error.
    fn delete(&self, key: &str) -> PreferenceResult<()>;

    /// Check whether a key is present.
    fn exists(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// All keys starting with `prefix`, sorted.
    fn keys_with_prefix(&self, prefix: &str) -> Vec<String>;
}

impl dyn PreferenceStore {
    /// Read a typed value, falling back to `default` when the key is missing
    /// or holds a value of another shape.
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key).and_then(|v| serde_json::from_value(v).ok()).unwrap_or(default)
    }

    /// Write a typed value.
    pub fn set_value<T: Serialize>(&self, key: &str, value: &T) -> PreferenceResult<()> {
        self.set(key, serde_json::to_value(value)?)
    }
}

/// In-memory store, used by tests and ephemeral hosts.
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    values: RwLock<BTreeMap<String, Value>>,
}

impl MemoryPreferenceStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) -> PreferenceResult<()> {
        self.values.write().insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&self, key: &str) -> PreferenceResult<()> {
        self.values.write().remove(key);
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.values.read().keys().filter(|k| k.starts_with(prefix)).cloned().collect()
    }
}

/// Store backed by a pretty-printed JSON file.
///
/// Every mutation is written through to disk before returning. A mutation
/// whose write fails leaves the store unchanged.
#[derive(Debug)]
pub struct JsonPreferenceStore {
    path: PathBuf,
    values: RwLock<BTreeMap<String, Value>>,
}

impl JsonPreferenceStore {
    /// Open (or create) the store at `path`.
    pub fn open(path: impl Into<PathBuf>) -> PreferenceResult<Self> {
        let path = path.into();

        let values = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            BTreeMap::new()
        };

        Ok(Self { path, values: RwLock::new(values) })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self, values: &BTreeMap<String, Value>) -> PreferenceResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(values)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

impl PreferenceStore for JsonPreferenceStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) -> PreferenceResult<()> {
        let mut values = self.values.write();
        let mut updated = values.clone();
        updated.insert(key.to_string(), value);
        self.save(&updated)?;
        *values = updated;
        Ok(())
    }

    fn delete(&self, key: &str) -> PreferenceResult<()> {
        let mut values = self.values.write();
        if !values.contains_key(key) {
            return Ok(());
        }

        let mut updated = values.clone();
        updated.remove(key);
        self.save(&updated)?;
        *values = updated;
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.values.read().keys().filter(|k| k.starts_with(prefix)).cloned().collect()
    }
}
