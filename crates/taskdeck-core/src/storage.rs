//! Snapshot persistence
//!
//! The store writes its whole state as one JSON blob into a single named
//! slot after every mutation, and reads it back once on open.

use crate::{Error, Result, Snapshot};
use std::fs;
use std::path::{Path, PathBuf};

/// Slot name used when none is configured
pub const DEFAULT_STORAGE_KEY: &str = "task-manager-storage";

/// Durable key-value slot holding the store snapshot
pub trait SnapshotStorage {
    /// Read the snapshot. `Ok(None)` when nothing has been saved yet,
    /// `Err` when the slot exists but cannot be read or parsed.
    fn load(&self) -> Result<Option<Snapshot>>;

    /// Replace the stored snapshot
    fn save(&mut self, snapshot: &Snapshot) -> Result<()>;
}

/// JSON file in a data directory, named after the slot key
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
    key: String,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            key: key.into(),
        }
    }

    /// Storage in `dir` using the default slot key
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self::new(dir, DEFAULT_STORAGE_KEY)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path to the snapshot file
    pub fn path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", self.key))
    }

    fn tmp_path(&self) -> PathBuf {
        self.dir.join(format!(".{}.json.tmp", self.key))
    }
}

impl SnapshotStorage for FileStorage {
    fn load(&self) -> Result<Option<Snapshot>> {
        let path = self.path();
        let exists = path.try_exists()
            .map_err(|e| Error::Storage(format!("failed to check {}: {}", path.display(), e)))?;
        if !exists {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)
            .map_err(|e| Error::Storage(format!("failed to read {}: {}", path.display(), e)))?;
        if content.trim().is_empty() {
            return Ok(None);
        }

        Snapshot::from_json(&content)
            .map(Some)
            .map_err(|e| Error::Storage(format!("corrupt snapshot at {}: {}", path.display(), e)))
    }

    fn save(&mut self, snapshot: &Snapshot) -> Result<()> {
        let path = self.path();
        let tmp = self.tmp_path();
        let content = snapshot.to_json()?;

        // Write next to the target and rename so readers never see a partial file
        fs::create_dir_all(&self.dir)
            .and_then(|_| fs::write(&tmp, content))
            .and_then(|_| fs::rename(&tmp, &path))
            .map_err(|e| Error::Storage(format!("failed to write {}: {}", path.display(), e)))
    }
}

/// In-process slot, for tests and embedding
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    slot: Option<String>,
    fail_saves: bool,
    saves: usize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with raw slot contents, valid or not
    pub fn with_raw(text: impl Into<String>) -> Self {
        Self {
            slot: Some(text.into()),
            ..Self::default()
        }
    }

    /// Start with an existing snapshot
    pub fn with_snapshot(snapshot: &Snapshot) -> Result<Self> {
        Ok(Self::with_raw(snapshot.to_json()?))
    }

    /// Make subsequent saves fail
    pub fn set_fail_saves(&mut self, fail: bool) {
        self.fail_saves = fail;
    }

    pub fn raw(&self) -> Option<&str> {
        self.slot.as_deref()
    }

    /// Number of successful saves
    pub fn save_count(&self) -> usize {
        self.saves
    }
}

impl SnapshotStorage for MemoryStorage {
    fn load(&self) -> Result<Option<Snapshot>> {
        match self.slot.as_deref() {
            None => Ok(None),
            Some(text) => Snapshot::from_json(text)
                .map(Some)
                .map_err(|e| Error::Storage(format!("corrupt snapshot: {}", e))),
        }
    }

    fn save(&mut self, snapshot: &Snapshot) -> Result<()> {
        if self.fail_saves {
            return Err(Error::Storage("storage slot unavailable".into()));
        }
        self.slot = Some(snapshot.to_json()?);
        self.saves += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_file_storage_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = FileStorage::in_dir(dir.path().join("nested"));
        assert!(storage.load().unwrap().is_none());

        let snapshot = Snapshot::seed(Utc::now());
        storage.save(&snapshot).unwrap();

        assert!(storage.path().ends_with("task-manager-storage.json"));
        assert!(!dir.path().join("nested/.task-manager-storage.json.tmp").exists());
        assert_eq!(storage.load().unwrap(), Some(snapshot));
    }

    #[test]
    fn test_file_storage_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path(), "slot");
        fs::write(storage.path(), "{ broken").unwrap();

        let err = storage.load().unwrap_err();
        assert!(err.is_storage());
        assert!(err.to_string().contains("corrupt snapshot"));
    }

    #[test]
    fn test_file_storage_empty_file_is_no_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path(), "slot");
        fs::write(storage.path(), "  \n").unwrap();
        assert!(storage.load().unwrap().is_none());
    }

    #[test]
    fn test_file_storage_unreachable_dir_is_error() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the data directory should be
        let blocked = dir.path().join("blocked");
        fs::write(&blocked, "").unwrap();

        let err = FileStorage::in_dir(&blocked).load().unwrap_err();
        assert!(err.is_storage());
        assert!(err.to_string().contains("failed to check"));
    }

    #[test]
    fn test_memory_storage_failures() {
        let mut storage = MemoryStorage::new();
        storage.set_fail_saves(true);
        assert!(matches!(
            storage.save(&Snapshot::default()),
            Err(Error::Storage(_))
        ));
        assert_eq!(storage.save_count(), 0);
        assert!(storage.raw().is_none());

        storage.set_fail_saves(false);
        storage.save(&Snapshot::default()).unwrap();
        assert_eq!(storage.save_count(), 1);
        assert_eq!(storage.load().unwrap(), Some(Snapshot::default()));
    }
}
