/// Bounded persistent metadata cache
///
/// Stores chain runtime metadata blobs keyed by code hash. Reads and writes
/// never fail outward: storage problems are logged and surface as a miss.
/// After every write a detached prune task trims the store back to
/// `max_entries`, deleting the oldest records first.
use super::store::{BlobStore, MetadataRecord};
use crate::logger::{self, LogTag};
use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;

/// Aggregate view of the cache contents
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetadataStats {
    pub entries: usize,
    pub total_bytes: usize,
    pub oldest_timestamp: Option<i64>,
    pub newest_timestamp: Option<i64>,
    pub max_entries: usize,
}

struct MetadataCacheInner {
    store: Arc<dyn BlobStore>,
    max_entries: usize,
    last_timestamp: AtomicI64,
    prune_lock: AsyncMutex<()>,
}

#[derive(Clone)]
pub struct MetadataCache {
    inner: Arc<MetadataCacheInner>,
}

impl MetadataCache {
    pub fn new(store: Arc<dyn BlobStore>, max_entries: usize) -> Self {
        Self {
            inner: Arc::new(MetadataCacheInner {
                store,
                max_entries: max_entries.max(1),
                last_timestamp: AtomicI64::new(0),
                prune_lock: AsyncMutex::new(()),
            }),
        }
    }

    pub fn max_entries(&self) -> usize {
        self.inner.max_entries
    }

    /// Cached bytes for `code_hash`, `None` on miss or storage failure
    pub async fn get(&self, code_hash: &str) -> Option<Vec<u8>> {
        match self.inner.store.get(code_hash).await {
            Ok(Some(record)) if record.is_current_version() => Some(record.metadata),
            Ok(Some(record)) => {
                logger::debug(
                    LogTag::Metadata,
                    &format!(
                        "Ignoring metadata for {} with record version {}",
                        code_hash, record.version
                    ),
                );
                None
            }
            Ok(None) => None,
            Err(e) => {
                logger::warning(
                    LogTag::Metadata,
                    &format!("Failed to read cached metadata for {}: {}", code_hash, e),
                );
                None
            }
        }
    }

    /// Store `metadata` under `code_hash` and schedule a prune
    pub async fn set(&self, code_hash: &str, metadata: Vec<u8>) {
        let size = metadata.len();
        let record = MetadataRecord::new(code_hash, metadata, self.inner.next_timestamp());

        if let Err(e) = self.inner.store.put(record).await {
            logger::warning(
                LogTag::Metadata,
                &format!("Failed to store metadata for {}: {}", code_hash, e),
            );
            return;
        }

        logger::debug(
            LogTag::Metadata,
            &format!("Stored {} bytes of metadata for {}", size, code_hash),
        );

        let inner = self.inner.clone();
        tokio::spawn(async move {
            inner.prune().await;
        });
    }

    /// Delete the oldest records until at most `max_entries` remain
    ///
    /// Returns the number of records removed.
    pub async fn prune(&self) -> usize {
        self.inner.prune().await
    }

    pub async fn stats(&self) -> MetadataStats {
        let mut stats = MetadataStats {
            max_entries: self.inner.max_entries,
            ..MetadataStats::default()
        };

        match self.inner.store.entries().await {
            Ok(records) => {
                stats.entries = records.len();
                stats.total_bytes = records.iter().map(|r| r.metadata.len()).sum();
                stats.oldest_timestamp = records.iter().map(|r| r.timestamp).min();
                stats.newest_timestamp = records.iter().map(|r| r.timestamp).max();
            }
            Err(e) => {
                logger::warning(LogTag::Metadata, &format!("Failed to read metadata stats: {}", e));
            }
        }

        stats
    }

    /// Code hashes currently cached, oldest first
    pub async fn keys(&self) -> Vec<String> {
        match self.inner.store.entries().await {
            Ok(records) => records.into_iter().map(|r| r.code_hash).collect(),
            Err(e) => {
                logger::warning(LogTag::Metadata, &format!("Failed to list metadata: {}", e));
                Vec::new()
            }
        }
    }

    /// Remove every record, returning how many were removed
    pub async fn clear(&self) -> usize {
        let _guard = self.inner.prune_lock.lock().await;
        match self.inner.store.clear().await {
            Ok(count) => {
                logger::info(LogTag::Metadata, &format!("Cleared {} metadata records", count));
                count
            }
            Err(e) => {
                logger::warning(LogTag::Metadata, &format!("Failed to clear metadata: {}", e));
                0
            }
        }
    }
}

impl MetadataCacheInner {
    /// Current wall clock in ms, bumped so that every write in this process
    /// gets a distinct, increasing timestamp
    fn next_timestamp(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let previous = self
            .last_timestamp
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(now.max(last + 1)))
            .unwrap_or(now);
        now.max(previous + 1)
    }

    async fn prune(&self) -> usize {
        let _guard = self.prune_lock.lock().await;

        let mut records = match self.store.entries().await {
            Ok(records) => records,
            Err(e) => {
                logger::warning(LogTag::Metadata, &format!("Metadata prune skipped: {}", e));
                return 0;
            }
        };

        if records.len() <= self.max_entries {
            return 0;
        }

        records.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.code_hash.cmp(&b.code_hash)));
        let excess = records.len() - self.max_entries;

        let mut removed = 0;
        for record in records.iter().take(excess) {
            match self.store.delete(&record.code_hash).await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => {
                    logger::warning(
                        LogTag::Metadata,
                        &format!("Failed to prune metadata for {}: {}", record.code_hash, e),
                    );
                }
            }
        }

        logger::debug(
            LogTag::Metadata,
            &format!("Pruned {} metadata records (limit {})", removed, self.max_entries),
        );
        removed
    }
}
