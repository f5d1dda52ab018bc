//! User settings
//!
//! A single reactive record of user preferences, persisted to local storage
//! and readable, writable and watchable per key.

pub mod migrate;
pub mod schema;
pub mod storage;
pub mod store;

pub use migrate::{migrate, Migrated, SETTINGS_VERSION};
pub use schema::{keys, Settings};
pub use storage::{FileStorage, LocalStorage, MemoryStorage};
pub use store::SettingsStore;

use crate::config::with_config;
use crate::errors::SettingsError;
use futures::stream::Stream;
use once_cell::sync::OnceCell;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// A typed handle to one field of [`Settings`]
pub trait Setting: Send + Sync + 'static {
    type Value: Clone + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Persisted field name
    const NAME: &'static str;

    fn get(record: &Settings) -> &Self::Value;
    fn set(record: &mut Settings, value: Self::Value);
}

static SETTINGS_STORE: OnceCell<SettingsStore> = OnceCell::new();

/// Open the store described by the loaded configuration
pub fn open_from_config() -> SettingsStore {
    let (dir_name, prefix) = with_config(|cfg| (cfg.settings.storage_dir.clone(), cfg.settings.key_prefix.clone()));
    let storage = FileStorage::new(crate::paths::get_settings_directory(&dir_name));
    SettingsStore::load(Arc::new(storage), &prefix)
}

/// Install the process-wide store; returns false if one was already installed
pub fn init_global(store: SettingsStore) -> bool {
    SETTINGS_STORE.set(store).is_ok()
}

/// The process-wide store, loaded from configured storage on first access
pub fn global() -> &'static SettingsStore {
    SETTINGS_STORE.get_or_init(open_from_config)
}

pub fn get_setting<K: Setting>() -> K::Value {
    global().get::<K>()
}

/// Returns whether the value changed
pub fn set_setting<K: Setting>(value: K::Value) -> Result<bool, SettingsError> {
    global().set::<K>(value)
}

pub fn get_setting_stream<K: Setting>() -> impl Stream<Item = K::Value> + Send + 'static {
    global().stream::<K>()
}
