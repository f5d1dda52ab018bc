/// Keyed observable cache
///
/// Deduplicates long-lived streams by `(namespace, key)`: every request for
/// the same pair returns the same [`SharedStream`], so concurrent consumers
/// share one producer. Entries live for the lifetime of the cache; only the
/// producers behind them start and stop with their subscribers.
use futures::stream::Stream;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;

use super::shared::SharedStream;
use crate::errors::CacheError;
use crate::logger::{self, LogTag};

/// Type-erased view of a cached [`SharedStream`]
trait CachedStream: Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn item_type(&self) -> &'static str;
    fn is_active(&self) -> bool;
    fn subscriber_count(&self) -> usize;
}

impl<T> CachedStream for SharedStream<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn item_type(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn is_active(&self) -> bool {
        SharedStream::is_active(self)
    }

    fn subscriber_count(&self) -> usize {
        SharedStream::subscriber_count(self)
    }
}

/// Snapshot of the cache table for diagnostics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservableCacheStats {
    pub entries: usize,
    pub active_producers: usize,
    pub subscribers: usize,
}

/// Table of shared streams keyed by `(namespace, key)`
#[derive(Default)]
pub struct ObservableCache {
    entries: Mutex<HashMap<(String, String), Box<dyn CachedStream>>>,
}

impl ObservableCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the shared stream for `(namespace, key)`
    ///
    /// Never calls `factory`; it runs when the returned stream gains its first
    /// subscriber. Only the factory passed on creation is kept. Asking for an
    /// existing pair with a different item type is a caller bug and returns
    /// [`CacheError::TypeMismatch`].
    pub fn get_cached_observable<T, F, S>(
        &self,
        namespace: &str,
        key: &str,
        factory: F,
    ) -> Result<SharedStream<T>, CacheError>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> S + Send + Sync + 'static,
        S: Stream<Item = T> + Send + 'static,
    {
        let mut entries = self.entries.lock();
        let cache_key = (namespace.to_string(), key.to_string());

        if let Some(existing) = entries.get(&cache_key) {
            return existing
                .as_any()
                .downcast_ref::<SharedStream<T>>()
                .cloned()
                .ok_or_else(|| CacheError::TypeMismatch {
                    namespace: namespace.to_string(),
                    key: key.to_string(),
                    existing: existing.item_type(),
                    requested: std::any::type_name::<T>(),
                });
        }

        let shared = SharedStream::new(format!("{}::{}", namespace, key), factory);
        entries.insert(cache_key, Box::new(shared.clone()));

        logger::debug(
            LogTag::Cache,
            &format!("Created shared stream {}::{} ({} entries)", namespace, key, entries.len()),
        );

        Ok(shared)
    }

    /// Whether a stream exists for the pair
    pub fn contains(&self, namespace: &str, key: &str) -> bool {
        self.entries
            .lock()
            .contains_key(&(namespace.to_string(), key.to_string()))
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of entries whose producer is currently running
    pub fn active_producers(&self) -> usize {
        self.entries.lock().values().filter(|entry| entry.is_active()).count()
    }

    pub fn stats(&self) -> ObservableCacheStats {
        let entries = self.entries.lock();
        ObservableCacheStats {
            entries: entries.len(),
            active_producers: entries.values().filter(|entry| entry.is_active()).count(),
            subscribers: entries.values().map(|entry| entry.subscriber_count()).sum(),
        }
    }
}

/// Process-wide cache instance
static OBSERVABLE_CACHE: Lazy<ObservableCache> = Lazy::new(ObservableCache::new);

/// Obtain a reference to the process-wide [`ObservableCache`]
pub fn global() -> &'static ObservableCache {
    &OBSERVABLE_CACHE
}

/// `get_cached_observable` on the process-wide cache
pub fn get_cached_observable<T, F, S>(
    namespace: &str,
    key: &str,
    factory: F,
) -> Result<SharedStream<T>, CacheError>
where
    T: Clone + Send + Sync + 'static,
    F: Fn() -> S + Send + Sync + 'static,
    S: Stream<Item = T> + Send + 'static,
{
    OBSERVABLE_CACHE.get_cached_observable(namespace, key, factory)
}
