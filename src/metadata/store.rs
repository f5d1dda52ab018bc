/// Blob storage backends for the metadata cache
///
/// `SqliteBlobStore` keeps one row per code hash in a WAL-mode database and
/// runs every statement on the blocking pool. `MemoryBlobStore` is the
/// in-process variant used by tests and as a fallback when the database file
/// cannot be opened.
use crate::errors::StorageError;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// On-disk record layout version
pub const RECORD_VERSION: u32 = 1;

/// A single cached metadata blob
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub code_hash: String,
    pub metadata: Vec<u8>,
    /// Epoch milliseconds at write time
    pub timestamp: i64,
    pub version: u32,
}

impl MetadataRecord {
    pub fn new(code_hash: impl Into<String>, metadata: Vec<u8>, timestamp: i64) -> Self {
        Self {
            code_hash: code_hash.into(),
            metadata,
            timestamp,
            version: RECORD_VERSION,
        }
    }

    pub fn is_current_version(&self) -> bool {
        self.version == RECORD_VERSION
    }
}

/// Persistent keyed blob storage
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn get(&self, code_hash: &str) -> Result<Option<MetadataRecord>, StorageError>;

    /// Insert or overwrite the record for `record.code_hash`
    async fn put(&self, record: MetadataRecord) -> Result<(), StorageError>;

    /// Returns whether a record was removed
    async fn delete(&self, code_hash: &str) -> Result<bool, StorageError>;

    async fn entries(&self) -> Result<Vec<MetadataRecord>, StorageError>;

    /// Remove every record, returning how many were removed
    async fn clear(&self) -> Result<usize, StorageError>;
}

// =============================================================================
// SQLITE
// =============================================================================

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS metadata_cache (
    code_hash TEXT PRIMARY KEY,
    metadata BLOB NOT NULL,
    timestamp INTEGER NOT NULL,
    version INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_metadata_cache_timestamp ON metadata_cache(timestamp);
"#;

pub struct SqliteBlobStore {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl SqliteBlobStore {
    /// Open (or create) the database at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn with_conn<F, R>(&self, f: F) -> Result<R, StorageError>
    where
        F: FnOnce(&Connection) -> Result<R, StorageError> + Send + 'static,
        R: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            f(&conn)
        })
        .await
        .map_err(|e| StorageError::Task(e.to_string()))?
    }
}

fn record_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MetadataRecord> {
    Ok(MetadataRecord {
        code_hash: row.get(0)?,
        metadata: row.get(1)?,
        timestamp: row.get(2)?,
        version: row.get(3)?,
    })
}

#[async_trait]
impl BlobStore for SqliteBlobStore {
    async fn get(&self, code_hash: &str) -> Result<Option<MetadataRecord>, StorageError> {
        let code_hash = code_hash.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT code_hash, metadata, timestamp, version FROM metadata_cache WHERE code_hash = ?1",
                params![code_hash],
                record_from_row,
            )
            .optional()
            .map_err(StorageError::from)
        })
        .await
    }

    async fn put(&self, record: MetadataRecord) -> Result<(), StorageError> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO metadata_cache (code_hash, metadata, timestamp, version)
                 VALUES (?1, ?2, ?3, ?4)",
                params![record.code_hash, record.metadata, record.timestamp, record.version],
            )?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, code_hash: &str) -> Result<bool, StorageError> {
        let code_hash = code_hash.to_string();
        self.with_conn(move |conn| {
            let removed = conn.execute("DELETE FROM metadata_cache WHERE code_hash = ?1", params![code_hash])?;
            Ok(removed > 0)
        })
        .await
    }

    async fn entries(&self) -> Result<Vec<MetadataRecord>, StorageError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT code_hash, metadata, timestamp, version FROM metadata_cache ORDER BY timestamp ASC",
            )?;
            let rows = stmt.query_map([], record_from_row)?;
            let mut records = Vec::new();
            for row in rows {
                records.push(row?);
            }
            Ok(records)
        })
        .await
    }

    async fn clear(&self) -> Result<usize, StorageError> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM metadata_cache", [])?))
            .await
    }
}

// =============================================================================
// MEMORY
// =============================================================================

#[derive(Default)]
pub struct MemoryBlobStore {
    records: RwLock<HashMap<String, MetadataRecord>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, code_hash: &str) -> Result<Option<MetadataRecord>, StorageError> {
        Ok(self.records.read().get(code_hash).cloned())
    }

    async fn put(&self, record: MetadataRecord) -> Result<(), StorageError> {
        self.records.write().insert(record.code_hash.clone(), record);
        Ok(())
    }

    async fn delete(&self, code_hash: &str) -> Result<bool, StorageError> {
        Ok(self.records.write().remove(code_hash).is_some())
    }

    async fn entries(&self) -> Result<Vec<MetadataRecord>, StorageError> {
        let mut records: Vec<MetadataRecord> = self.records.read().values().cloned().collect();
        records.sort_by_key(|record| record.timestamp);
        Ok(records)
    }

    async fn clear(&self) -> Result<usize, StorageError> {
        let mut records = self.records.write();
        let count = records.len();
        records.clear();
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sqlite_roundtrip_and_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteBlobStore::open(dir.path().join("metadata.db")).unwrap();

        store.put(MetadataRecord::new("0xabc", vec![1, 2, 3], 10)).await.unwrap();
        store.put(MetadataRecord::new("0xabc", vec![4], 11)).await.unwrap();

        let record = store.get("0xabc").await.unwrap().unwrap();
        assert_eq!(record.metadata, vec![4]);
        assert_eq!(record.timestamp, 11);
        assert_eq!(record.version, RECORD_VERSION);
        assert_eq!(store.entries().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sqlite_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("metadata.db");
        {
            let store = SqliteBlobStore::open(&path).unwrap();
            store.put(MetadataRecord::new("0x01", vec![9], 1)).await.unwrap();
        }

        let store = SqliteBlobStore::open(&path).unwrap();
        assert_eq!(store.get("0x01").await.unwrap().unwrap().metadata, vec![9]);
        assert!(store.get("0x02").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_entries_are_ordered_by_timestamp() {
        let store = MemoryBlobStore::new();
        store.put(MetadataRecord::new("b", vec![], 20)).await.unwrap();
        store.put(MetadataRecord::new("a", vec![], 10)).await.unwrap();
        store.put(MetadataRecord::new("c", vec![], 30)).await.unwrap();

        let order: Vec<String> = store.entries().await.unwrap().into_iter().map(|r| r.code_hash).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteBlobStore::open(dir.path().join("metadata.db")).unwrap();
        store.put(MetadataRecord::new("a", vec![], 1)).await.unwrap();
        store.put(MetadataRecord::new("b", vec![], 2)).await.unwrap();

        assert!(store.delete("a").await.unwrap());
        assert!(!store.delete("a").await.unwrap());
        assert_eq!(store.clear().await.unwrap(), 1);
        assert!(store.entries().await.unwrap().is_empty());
    }
}
