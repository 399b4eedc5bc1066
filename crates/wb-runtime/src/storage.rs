//! Key-value storage for persisted layouts and perspective selection.
//!
//! [`MemoryStorage`] keeps entries in memory. [`FileStorage`] mirrors them
//! into a single JSON file:
//!
//! ```json
//! {
//!   "version": 1,
//!   "entries": {
//!     "scion.workbench.perspective": "admin"
//!   }
//! }
//! ```
//!
//! Writes go to a temp file that is then renamed over the target, so a
//! crash never leaves a truncated file behind.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use wb_core::{WorkbenchError, WorkbenchResult};

/// Current file format version.
const FORMAT_VERSION: u64 = 1;

/// Narrow storage interface consumed by the runtime.
pub trait StorageBackend {
    fn read(&self, key: &str) -> WorkbenchResult<Option<String>>;

    fn write(&mut self, key: &str, value: &str) -> WorkbenchResult<()>;

    /// Removing an absent key is not an error.
    fn remove(&mut self, key: &str) -> WorkbenchResult<()>;
}

/// In-memory storage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStorage {
    entries: BTreeMap<String, String>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl StorageBackend for MemoryStorage {
    fn read(&self, key: &str) -> WorkbenchResult<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> WorkbenchResult<()> {
        let _ = self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> WorkbenchResult<()> {
        let _ = self.entries.remove(key);
        Ok(())
    }
}

/// On-disk representation.
#[derive(Debug, Serialize, Deserialize)]
struct StorageFile {
    version: u64,
    entries: BTreeMap<String, String>,
}

/// JSON file storage with atomic writes.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStorage {
    /// Open the store at `path`.
    ///
    /// - **Missing file** opens an empty store (not an error).
    /// - **Corrupted file** or **version mismatch** is a persistence error.
    pub fn open(path: impl Into<PathBuf>) -> WorkbenchResult<Self> {
        let path = path.into();
        if !path.exists() {
            return Ok(Self {
                path,
                entries: BTreeMap::new(),
            });
        }
        let contents = std::fs::read_to_string(&path).map_err(|e| io_error(&path, &e))?;
        let file: StorageFile = serde_json::from_str(&contents).map_err(|e| {
            WorkbenchError::persistence(format!(
                "failed to parse storage file '{}': {e}",
                path.display()
            ))
        })?;
        if file.version != FORMAT_VERSION {
            return Err(WorkbenchError::persistence(format!(
                "unsupported storage file version {} (expected {FORMAT_VERSION})",
                file.version
            )));
        }
        Ok(Self {
            path,
            entries: file.entries,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> WorkbenchResult<()> {
        let file = StorageFile {
            version: FORMAT_VERSION,
            entries: entries.clone(),
        };
        let json = serde_json::to_string_pretty(&file)?;

        // Atomic write: temp file then rename
        let temp = self.path.with_extension("json.tmp");
        std::fs::write(&temp, json).map_err(|e| io_error(&temp, &e))?;
        std::fs::rename(&temp, &self.path).map_err(|e| io_error(&self.path, &e))
    }

    /// Apply `change` to a copy of the entries and keep it only if it was
    /// written to disk.
    fn commit(&mut self, change: impl FnOnce(&mut BTreeMap<String, String>)) -> WorkbenchResult<()> {
        let mut next = self.entries.clone();
        change(&mut next);
        if next == self.entries {
            return Ok(());
        }
        self.flush(&next)?;
        self.entries = next;
        Ok(())
    }
}

impl StorageBackend for FileStorage {
    fn read(&self, key: &str) -> WorkbenchResult<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> WorkbenchResult<()> {
        self.commit(|entries| {
            let _ = entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&mut self, key: &str) -> WorkbenchResult<()> {
        self.commit(|entries| {
            let _ = entries.remove(key);
        })
    }
}

fn io_error(path: &Path, error: &std::io::Error) -> WorkbenchError {
    WorkbenchError::persistence(format!("storage I/O error on '{}': {error}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wb_core::ErrorKind;

    #[test]
    fn memory_storage_read_write_remove() {
        let mut storage = MemoryStorage::new();
        assert_eq!(storage.read("k").unwrap(), None);
        storage.write("k", "v").unwrap();
        assert_eq!(storage.read("k").unwrap().as_deref(), Some("v"));
        storage.remove("k").unwrap();
        storage.remove("k").unwrap();
        assert!(storage.is_empty());
    }

    #[test]
    fn file_storage_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path().join("store.json")).unwrap();
        assert_eq!(storage.read("anything").unwrap(), None);
    }

    #[test]
    fn file_storage_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        {
            let mut storage = FileStorage::open(&path).unwrap();
            storage.write("scion.workbench.perspective", "admin").unwrap();
            storage.write("other", "1").unwrap();
            storage.remove("other").unwrap();
        }
        let storage = FileStorage::open(&path).unwrap();
        assert_eq!(
            storage.read("scion.workbench.perspective").unwrap().as_deref(),
            Some("admin")
        );
        assert_eq!(storage.read("other").unwrap(), None);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn file_storage_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = FileStorage::open(&path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Persistence);
    }

    #[test]
    fn file_storage_rejects_unknown_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, r#"{"version": 9, "entries": {}}"#).unwrap();
        let err = FileStorage::open(&path).unwrap_err();
        assert!(err.to_string().contains("version 9"));
    }

    #[test]
    fn failed_write_keeps_previous_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("store.json");
        let mut storage = FileStorage::open(&path).unwrap();
        let err = storage.write("k", "v").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Persistence);
        assert_eq!(storage.read("k").unwrap(), None);
    }
}
