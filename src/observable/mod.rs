//! Stream sharing
//!
//! [`SharedStream`] is the reference-counted multicast primitive;
//! [`ObservableCache`] deduplicates shared streams by `(namespace, key)`.

pub mod cache;
pub mod shared;

pub use cache::{get_cached_observable, global, ObservableCache, ObservableCacheStats};
pub use shared::{SharedStream, StreamFactory, Subscription};
