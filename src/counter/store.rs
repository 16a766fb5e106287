//! Origin-scoped key-value stores
//!
//! The local counter persists its entries through [`KeyValueStore`]. Two
//! implementations are provided: [`MemoryStore`] for a single process and
//! [`FileStore`], a JSON file rewritten on every change.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use thiserror::Error;

/// Errors raised by a key-value store
#[derive(Error, Debug)]
pub enum StoreError {
    /// Storage is disabled or otherwise not reachable
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Writing would exceed the store's entry limit
    #[error("Storage quota exceeded ({limit} entries)")]
    QuotaExceeded { limit: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// String-keyed persistent storage
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Remove a key, returning whether it existed
    fn remove(&self, key: &str) -> StoreResult<bool>;
}

fn poisoned() -> StoreError {
    StoreError::Unavailable("store lock poisoned".to_string())
}

/// In-memory store with an optional entry quota
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
    quota: Option<usize>,
    disabled: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that refuses to hold more than `limit` keys
    pub fn with_quota(limit: usize) -> Self {
        Self {
            quota: Some(limit),
            ..Self::default()
        }
    }

    /// Store that fails every operation, like storage disabled by the user
    pub fn disabled() -> Self {
        Self {
            disabled: true,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_enabled(&self) -> StoreResult<()> {
        if self.disabled {
            Err(StoreError::Unavailable("storage is disabled".to_string()))
        } else {
            Ok(())
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.check_enabled()?;
        let entries = self.entries.read().map_err(|_| poisoned())?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.check_enabled()?;
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        if let Some(limit) = self.quota {
            if !entries.contains_key(key) && entries.len() >= limit {
                return Err(StoreError::QuotaExceeded { limit });
            }
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<bool> {
        self.check_enabled()?;
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        Ok(entries.remove(key).is_some())
    }
}

/// On-disk format of a [`FileStore`]
#[derive(Serialize, Deserialize)]
struct FileStoreData {
    /// Version for future compatibility
    version: u32,
    entries: HashMap<String, String>,
}

const FILE_STORE_VERSION: u32 = 1;

/// Key-value store persisted as a JSON file
///
/// The whole map is kept in memory and the file is replaced atomically
/// (write to a temp file, then rename) on every mutation.
#[derive(Debug)]
pub struct FileStore {
    entries: RwLock<HashMap<String, String>>,
    path: PathBuf,
}

impl FileStore {
    /// Open the store at `path`, creating parent directories as needed
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let entries = if path.exists() {
            Self::load_from_file(&path)?
        } else {
            HashMap::new()
        };

        tracing::debug!(path = %path.display(), entries = entries.len(), "Opened file store");

        Ok(Self {
            entries: RwLock::new(entries),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_from_file(path: &Path) -> StoreResult<HashMap<String, String>> {
        let reader = BufReader::new(File::open(path)?);
        let data: FileStoreData = serde_json::from_reader(reader)?;
        Ok(data.entries)
    }

    fn persist(&self, entries: &HashMap<String, String>) -> StoreResult<()> {
        let tmp_path = self.path.with_extension("json.tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp_path)?);
            let data = FileStoreData {
                version: FILE_STORE_VERSION,
                entries: entries.clone(),
            };
            serde_json::to_writer_pretty(&mut writer, &data)?;
            writer.flush()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let entries = self.entries.read().map_err(|_| poisoned())?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        let previous = entries.insert(key.to_string(), value.to_string());

        if let Err(e) = self.persist(&entries) {
            // Keep memory in sync with what is on disk
            match previous {
                Some(old) => entries.insert(key.to_string(), old),
                None => entries.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<bool> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        match entries.remove(key) {
            Some(old) => {
                if let Err(e) = self.persist(&entries) {
                    entries.insert(key.to_string(), old);
                    return Err(e);
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_memory_store_basic() {
        let store = MemoryStore::new();
        assert!(store.get("a").unwrap().is_none());

        store.set("a", "1").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));

        assert!(store.remove("a").unwrap());
        assert!(!store.remove("a").unwrap());
        assert!(store.is_empty());
    }

    #[test]
    fn test_memory_store_quota() {
        let store = MemoryStore::with_quota(1);
        store.set("a", "1").unwrap();
        // Overwriting an existing key is always allowed
        store.set("a", "2").unwrap();

        let err = store.set("b", "1").unwrap_err();
        assert!(matches!(err, StoreError::QuotaExceeded { limit: 1 }));
    }

    #[test]
    fn test_disabled_store_fails() {
        let store = MemoryStore::disabled();
        assert!(matches!(store.get("a"), Err(StoreError::Unavailable(_))));
        assert!(matches!(store.set("a", "1"), Err(StoreError::Unavailable(_))));
    }

    #[test]
    fn test_file_store_persistence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("origin").join("store.json");

        {
            let store = FileStore::open(&path).unwrap();
            store.set("pageCounter_/a", "3").unwrap();
            store.set("pageCounter_/b", "1").unwrap();
            store.remove("pageCounter_/b").unwrap();
        }

        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.get("pageCounter_/a").unwrap().as_deref(), Some("3"));
        assert!(store.get("pageCounter_/b").unwrap().is_none());
    }

    #[test]
    fn test_file_store_rejects_corrupt_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "not json").unwrap();

        assert!(matches!(
            FileStore::open(&path),
            Err(StoreError::Serialization(_))
        ));
    }
}
