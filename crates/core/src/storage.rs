//! Local key/value storage
//!
//! A small string-keyed store with the same shape as browser local storage.
//! Credentials, cached lists and drafts all live here. Two backends exist:
//! [`MemoryStorage`] for tests and short-lived processes, and [`FileStorage`]
//! which persists every mutation to a JSON document on disk.

use crate::error::{CoreError, CoreResult};
use serde::{Serialize, de::DeserializeOwned};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// String key/value storage shared across services
pub trait LocalStorage: Send + Sync {
    /// Read a value, `None` when the key is absent
    fn get_item(&self, key: &str) -> Option<String>;

    /// Store a value, replacing any previous one
    fn set_item(&self, key: &str, value: &str) -> CoreResult<()>;

    /// Remove a value; removing a missing key is not an error
    fn remove_item(&self, key: &str) -> CoreResult<()>;
}

impl dyn LocalStorage {
    /// Read and deserialize a JSON value. Undecodable values read as absent.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get_item(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "Discarding undecodable storage value");
                None
            }
        }
    }

    /// Serialize a value as JSON and store it
    pub fn set_json<T: Serialize>(&self, key: &str, value: &T) -> CoreResult<()> {
        let raw = serde_json::to_string(value)?;
        self.set_item(key, &raw)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Process-local storage
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        lock(&self.items).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LocalStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        lock(&self.items).get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) -> CoreResult<()> {
        lock(&self.items).insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> CoreResult<()> {
        lock(&self.items).remove(key);
        Ok(())
    }
}

/// Storage persisted to a single JSON file
///
/// The whole map is rewritten through a temporary file and renamed into place
/// on every mutation, so a crash never leaves a half-written document.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    items: Mutex<BTreeMap<String, String>>,
}

impl FileStorage {
    /// Open the storage file, creating parent directories as needed.
    /// A missing file starts out empty.
    pub fn open(path: impl Into<PathBuf>) -> CoreResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let items = match std::fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                CoreError::storage(format!("corrupt storage file {}: {e}", path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        debug!(path = %path.display(), keys = items.len(), "Opened file storage");
        Ok(Self {
            path,
            items: Mutex::new(items),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, items: &BTreeMap<String, String>) -> CoreResult<()> {
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(items)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl LocalStorage for FileStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        lock(&self.items).get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) -> CoreResult<()> {
        let mut items = lock(&self.items);
        let mut next = items.clone();
        next.insert(key.to_string(), value.to_string());
        self.persist(&next)?;
        *items = next;
        Ok(())
    }

    fn remove_item(&self, key: &str) -> CoreResult<()> {
        let mut items = lock(&self.items);
        if !items.contains_key(key) {
            return Ok(());
        }
        let mut next = items.clone();
        next.remove(key);
        self.persist(&next)?;
        *items = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_memory_storage_roundtrip() {
        let storage = MemoryStorage::new();
        assert!(storage.get_item("missing").is_none());

        storage.set_item("access_token", "abc").unwrap();
        assert_eq!(storage.get_item("access_token").as_deref(), Some("abc"));

        storage.remove_item("access_token").unwrap();
        storage.remove_item("access_token").unwrap();
        assert!(storage.is_empty());
    }

    #[test]
    fn test_file_storage_persists_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("storage.json");

        {
            let storage = FileStorage::open(&path).unwrap();
            storage.set_item("user_email", "ops@example.com").unwrap();
            storage.set_item("draft", "{}").unwrap();
            storage.remove_item("draft").unwrap();
        }

        let reopened = FileStorage::open(&path).unwrap();
        assert_eq!(
            reopened.get_item("user_email").as_deref(),
            Some("ops@example.com")
        );
        assert!(reopened.get_item("draft").is_none());
    }

    #[test]
    fn test_failed_write_leaves_memory_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        let storage = FileStorage::open(&path).unwrap();
        storage.set_item("refresh_token", "ref-1").unwrap();

        // A directory in the way of the temporary file makes every write fail
        std::fs::create_dir(path.with_extension("json.tmp")).unwrap();

        assert!(storage.set_item("access_token", "tok").is_err());
        assert!(storage.get_item("access_token").is_none());

        assert!(storage.remove_item("refresh_token").is_err());
        assert_eq!(storage.get_item("refresh_token").as_deref(), Some("ref-1"));

        let on_disk = FileStorage::open(&path).unwrap();
        assert!(on_disk.get_item("access_token").is_none());
        assert_eq!(on_disk.get_item("refresh_token").as_deref(), Some("ref-1"));
    }

    #[test]
    fn test_file_storage_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        std::fs::write(&path, "not json").unwrap();

        let result = FileStorage::open(&path);
        assert!(matches!(result, Err(CoreError::Storage { .. })));
    }

    #[test]
    fn test_json_helpers_ignore_undecodable_values() {
        let storage: Arc<dyn LocalStorage> = Arc::new(MemoryStorage::new());
        storage.set_json("numbers", &vec![1, 2, 3]).unwrap();
        assert_eq!(storage.get_json::<Vec<u32>>("numbers"), Some(vec![1, 2, 3]));

        storage.set_item("numbers", "[oops").unwrap();
        assert_eq!(storage.get_json::<Vec<u32>>("numbers"), None);
    }
}
