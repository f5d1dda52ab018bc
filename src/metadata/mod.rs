//! Persistent metadata cache
//!
//! Chain runtime metadata is large and only changes with a runtime upgrade,
//! so it is kept on disk keyed by code hash and bounded to a handful of
//! records.

pub mod cache;
pub mod store;

pub use cache::{MetadataCache, MetadataStats};
pub use store::{BlobStore, MemoryBlobStore, MetadataRecord, SqliteBlobStore, RECORD_VERSION};

use crate::config::with_config;
use crate::logger::{self, LogTag};
use once_cell::sync::OnceCell;
use std::sync::Arc;

static METADATA_CACHE: OnceCell<MetadataCache> = OnceCell::new();

/// Open the cache described by the loaded configuration
///
/// Falls back to an in-memory store when the database cannot be opened.
pub fn open_from_config() -> MetadataCache {
    let (db_file, max_entries) =
        with_config(|cfg| (cfg.cache.metadata_db_file.clone(), cfg.cache.metadata_max_entries));
    let path = crate::paths::get_metadata_db_path(&db_file);

    let store: Arc<dyn BlobStore> = match SqliteBlobStore::open(&path) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            logger::warning(
                LogTag::Metadata,
                &format!(
                    "Failed to open metadata database at {}: {}; using in-memory store",
                    path.display(),
                    e
                ),
            );
            Arc::new(MemoryBlobStore::new())
        }
    };

    MetadataCache::new(store, max_entries)
}

/// Install the process-wide cache; returns false if one was already installed
pub fn init_global(cache: MetadataCache) -> bool {
    METADATA_CACHE.set(cache).is_ok()
}

pub fn global() -> Option<&'static MetadataCache> {
    METADATA_CACHE.get()
}

/// Read from the process-wide cache; `None` if it was never initialized
pub async fn get_cached_metadata(code_hash: &str) -> Option<Vec<u8>> {
    match METADATA_CACHE.get() {
        Some(cache) => cache.get(code_hash).await,
        None => {
            logger::debug(LogTag::Metadata, "Metadata cache not initialized, treating as miss");
            None
        }
    }
}

/// Write to the process-wide cache; dropped with a warning if uninitialized
pub async fn set_cached_metadata(code_hash: &str, metadata: Vec<u8>) {
    match METADATA_CACHE.get() {
        Some(cache) => cache.set(code_hash, metadata).await,
        None => logger::warning(
            LogTag::Metadata,
            &format!("Metadata cache not initialized, dropping write for {}", code_hash),
        ),
    }
}
