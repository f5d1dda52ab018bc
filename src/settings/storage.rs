/// Local storage backends for the settings record
///
/// Synchronous string key/value storage. `FileStorage` writes one file per
/// key into a directory; `MemoryStorage` keeps items in process and counts
/// writes so callers can observe persistence.
use crate::errors::StorageError;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

pub trait LocalStorage: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File backing `key`; path separators in keys are flattened
    pub fn item_path(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| if c == '/' || c == '\\' { '_' } else { c })
            .collect();
        self.dir.join(file_name)
    }

    /// Scratch file a write goes through before replacing `key`'s file
    fn temp_path(&self, key: &str) -> PathBuf {
        let mut name = self.item_path(key).into_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

impl LocalStorage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        match std::fs::read_to_string(self.item_path(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.item_path(key);
        let tmp = self.temp_path(key);
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        match std::fs::remove_file(self.item_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Default)]
pub struct MemoryStorage {
    items: RwLock<HashMap<String, String>>,
    writes: AtomicUsize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-populated with one item
    pub fn with_item(key: &str, value: &str) -> Self {
        let storage = Self::new();
        storage.items.write().insert(key.to_string(), value.to_string());
        storage
    }

    /// Number of successful `set_item` calls
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl LocalStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.items.read().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.items.write().insert(key.to_string(), value.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.items.write().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_storage_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("settings"));

        assert_eq!(storage.get_item("dexcache.settings").unwrap(), None);
        storage.set_item("dexcache.settings", "{}").unwrap();
        assert_eq!(storage.get_item("dexcache.settings").unwrap().as_deref(), Some("{}"));

        storage.remove_item("dexcache.settings").unwrap();
        storage.remove_item("dexcache.settings").unwrap();
        assert_eq!(storage.get_item("dexcache.settings").unwrap(), None);
    }

    #[test]
    fn test_keys_sharing_a_stem_use_separate_scratch_files() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());

        assert_ne!(storage.temp_path("app.settings"), storage.temp_path("app.other"));

        storage.set_item("app.settings", "one").unwrap();
        storage.set_item("app.other", "two").unwrap();
        assert_eq!(storage.get_item("app.settings").unwrap().as_deref(), Some("one"));
        assert_eq!(storage.get_item("app.other").unwrap().as_deref(), Some("two"));

        let leftovers = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_keys_cannot_escape_directory() {
        let storage = FileStorage::new("/tmp/settings");
        assert_eq!(storage.item_path("../etc/passwd").parent(), Some(Path::new("/tmp/settings")));
    }

    #[test]
    fn test_memory_storage_counts_writes() {
        let storage = MemoryStorage::new();
        storage.set_item("a", "1").unwrap();
        storage.set_item("a", "2").unwrap();
        assert_eq!(storage.writes(), 2);
        assert_eq!(storage.get_item("a").unwrap().as_deref(), Some("2"));
    }
}
