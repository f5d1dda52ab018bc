/// Reactive settings store
///
/// The current record lives in a `watch` channel as an `Arc<Settings>`.
/// Writers build a new record and swap it in whole, so readers never see a
/// half-applied change; per-key streams project the record and suppress
/// values equal to the last one they emitted.
use super::migrate::{migrate, to_persisted};
use super::schema::Settings;
use super::storage::LocalStorage;
use super::Setting;
use crate::errors::SettingsError;
use crate::logger::{self, LogTag};
use futures::stream::Stream;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;

pub struct SettingsStore {
    storage: Arc<dyn LocalStorage>,
    storage_key: String,
    current: watch::Sender<Arc<Settings>>,
    write_lock: Mutex<()>,
}

impl SettingsStore {
    /// Storage key for a given application prefix
    pub fn storage_key_for(prefix: &str) -> String {
        format!("{}.settings", prefix)
    }

    /// Load the persisted record, falling back to defaults
    pub fn load(storage: Arc<dyn LocalStorage>, key_prefix: &str) -> Self {
        let storage_key = Self::storage_key_for(key_prefix);
        let (settings, rewrite) = Self::read_persisted(storage.as_ref(), &storage_key);

        let (current, _) = watch::channel(Arc::new(settings));
        let store = Self {
            storage,
            storage_key,
            current,
            write_lock: Mutex::new(()),
        };

        if rewrite {
            store.persist(&store.snapshot());
        }

        store
    }

    fn read_persisted(storage: &dyn LocalStorage, storage_key: &str) -> (Settings, bool) {
        let raw = match storage.get_item(storage_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                logger::debug(LogTag::Settings, "No persisted settings, using defaults");
                return (Settings::default(), false);
            }
            Err(e) => {
                logger::warning(LogTag::Settings, &format!("Failed to read settings: {}", e));
                return (Settings::default(), false);
            }
        };

        match serde_json::from_str::<serde_json::Value>(&raw) {
            Ok(value) => {
                let migrated = migrate(value);
                let rewrite = migrated.needs_rewrite();
                (migrated.settings, rewrite)
            }
            Err(e) => {
                logger::warning(
                    LogTag::Settings,
                    &format!("Persisted settings are corrupt ({}), using defaults", e),
                );
                (Settings::default(), false)
            }
        }
    }

    /// Current value of one setting
    pub fn get<K: Setting>(&self) -> K::Value {
        K::get(&self.current.borrow()).clone()
    }

    /// The whole current record
    pub fn snapshot(&self) -> Arc<Settings> {
        self.current.borrow().clone()
    }

    /// Change one setting
    ///
    /// Returns false, without persisting or notifying, when `value` equals the
    /// current value. A value the record would not validate with is refused
    /// and the current record is left as it was.
    pub fn set<K: Setting>(&self, value: K::Value) -> Result<bool, SettingsError> {
        let _guard = self.write_lock.lock();
        let current = self.snapshot();
        if K::get(&current) == &value {
            return Ok(false);
        }

        let mut next = (*current).clone();
        K::set(&mut next, value);
        if let Err(reason) = next.validate() {
            logger::warning(
                LogTag::Settings,
                &format!("Rejected value for '{}': {}", K::NAME, reason),
            );
            return Err(SettingsError::InvalidValue {
                key: K::NAME.to_string(),
                reason,
            });
        }

        self.replace(next);

        logger::debug(LogTag::Settings, &format!("Setting '{}' updated", K::NAME));
        Ok(true)
    }

    /// Change one setting by name from a JSON value
    pub fn set_by_name(&self, name: &str, value: serde_json::Value) -> Result<bool, SettingsError> {
        if !Settings::is_recognized_key(name) {
            return Err(SettingsError::UnknownKey(name.to_string()));
        }

        let _guard = self.write_lock.lock();
        let current = self.snapshot();

        let mut record = serde_json::to_value(current.as_ref()).map_err(|e| SettingsError::InvalidValue {
            key: name.to_string(),
            reason: e.to_string(),
        })?;
        if let serde_json::Value::Object(map) = &mut record {
            map.insert(name.to_string(), value);
        }

        let next = serde_json::from_value::<Settings>(record).map_err(|e| SettingsError::InvalidValue {
            key: name.to_string(),
            reason: e.to_string(),
        })?;
        next.validate().map_err(|reason| SettingsError::InvalidValue {
            key: name.to_string(),
            reason,
        })?;

        if next == *current {
            return Ok(false);
        }

        self.replace(next);
        logger::debug(LogTag::Settings, &format!("Setting '{}' updated", name));
        Ok(true)
    }

    /// Current value of one setting by name, as JSON
    pub fn get_by_name(&self, name: &str) -> Result<serde_json::Value, SettingsError> {
        let record = serde_json::to_value(self.snapshot().as_ref()).map_err(|e| SettingsError::InvalidValue {
            key: name.to_string(),
            reason: e.to_string(),
        })?;
        record
            .get(name)
            .cloned()
            .ok_or_else(|| SettingsError::UnknownKey(name.to_string()))
    }

    /// Restore every setting to its default
    pub fn reset(&self) -> bool {
        let _guard = self.write_lock.lock();
        let defaults = Settings::default();
        if *self.snapshot() == defaults {
            return false;
        }

        self.replace(defaults);
        logger::info(LogTag::Settings, "Settings reset to defaults");
        true
    }

    /// Stream of one setting: the current value, then each distinct change
    pub fn stream<K: Setting>(&self) -> impl Stream<Item = K::Value> + Send + 'static {
        let rx = self.current.subscribe();
        futures::stream::unfold((rx, None::<K::Value>), |(mut rx, last)| async move {
            loop {
                let value = K::get(&rx.borrow_and_update()).clone();
                if last.as_ref() != Some(&value) {
                    return Some((value.clone(), (rx, Some(value))));
                }
                if rx.changed().await.is_err() {
                    return None;
                }
            }
        })
    }

    fn replace(&self, next: Settings) {
        let next = Arc::new(next);
        self.current.send_replace(next.clone());
        self.persist(&next);
    }

    fn persist(&self, settings: &Settings) {
        let result = to_persisted(settings)
            .and_then(|value| serde_json::to_string(&value))
            .map_err(|e| e.to_string())
            .and_then(|text| {
                self.storage
                    .set_item(&self.storage_key, &text)
                    .map_err(|e| e.to_string())
            });

        if let Err(e) = result {
            logger::warning(LogTag::Settings, &format!("Failed to persist settings: {}", e));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::keys::{HideZeroBalances, RpcEndpoints, Slippage, Theme};
    use crate::settings::storage::MemoryStorage;
    use futures::StreamExt;
    use serde_json::json;
    use std::collections::BTreeMap;

    const KEY: &str = "test.settings";

    fn store_with(storage: Arc<MemoryStorage>) -> SettingsStore {
        SettingsStore::load(storage, "test")
    }

    #[test]
    fn test_load_defaults_when_absent() {
        let storage = Arc::new(MemoryStorage::new());
        let store = store_with(storage.clone());
        assert_eq!(*store.snapshot(), Settings::default());
        assert_eq!(storage.writes(), 0);
    }

    #[test]
    fn test_load_corrupt_uses_defaults() {
        let storage = Arc::new(MemoryStorage::with_item(KEY, "{not json"));
        let store = store_with(storage);
        assert_eq!(store.get::<Slippage>(), 0.5);
    }

    #[test]
    fn test_load_merges_and_rewrites_stale_record() {
        let storage = Arc::new(MemoryStorage::with_item(KEY, r#"{"version":1,"theme":"dark","oldKey":1}"#));
        let store = store_with(storage.clone());

        assert_eq!(store.get::<Theme>(), "dark");
        assert_eq!(store.get::<Slippage>(), 0.5);

        let persisted: serde_json::Value = serde_json::from_str(&storage.get_item(KEY).unwrap().unwrap()).unwrap();
        assert!(persisted.get("oldKey").is_none());
        assert_eq!(persisted["theme"], json!("dark"));
    }

    #[test]
    fn test_set_equal_value_is_noop() {
        let storage = Arc::new(MemoryStorage::new());
        let store = store_with(storage.clone());

        assert!(!store.set::<Slippage>(0.5).unwrap());
        assert_eq!(storage.writes(), 0);

        assert!(store.set::<Slippage>(1.0).unwrap());
        assert!(!store.set::<Slippage>(1.0).unwrap());
        assert_eq!(storage.writes(), 1);
        assert_eq!(store.get::<Slippage>(), 1.0);
    }

    #[test]
    fn test_set_replaces_record_without_touching_old_snapshot() {
        let store = store_with(Arc::new(MemoryStorage::new()));
        let before = store.snapshot();
        store.set::<HideZeroBalances>(true).unwrap();

        assert!(!before.hide_zero_balances);
        assert!(store.snapshot().hide_zero_balances);
        assert!(!Arc::ptr_eq(&before, &store.snapshot()));
    }

    #[test]
    fn test_changes_survive_reload() {
        let storage = Arc::new(MemoryStorage::new());
        {
            let store = store_with(storage.clone());
            let mut endpoints = BTreeMap::new();
            endpoints.insert("polkadot".to_string(), "wss://rpc.example".to_string());
            store.set::<RpcEndpoints>(endpoints).unwrap();
        }

        let store = store_with(storage);
        assert_eq!(store.get::<RpcEndpoints>().len(), 1);
    }

    #[tokio::test]
    async fn test_stream_emits_current_then_distinct_changes() {
        let store = store_with(Arc::new(MemoryStorage::new()));
        let mut slippage = Box::pin(store.stream::<Slippage>());

        assert_eq!(slippage.next().await, Some(0.5));

        store.set::<Slippage>(1.0).unwrap();
        store.set::<Slippage>(1.0).unwrap();
        // Unrelated key does not wake this stream with a duplicate
        store.set::<Theme>("dark".to_string()).unwrap();
        store.set::<Slippage>(2.0).unwrap();

        assert_eq!(slippage.next().await, Some(2.0));
        drop(store);
        assert_eq!(slippage.next().await, None);
    }

    #[tokio::test]
    async fn test_equal_set_does_not_emit() {
        let storage = Arc::new(MemoryStorage::new());
        let store = store_with(storage.clone());
        let mut slippage = Box::pin(store.stream::<Slippage>());
        assert_eq!(slippage.next().await, Some(0.5));

        store.set::<Slippage>(0.5).unwrap();

        let pending = tokio::time::timeout(std::time::Duration::from_millis(20), slippage.next()).await;
        assert!(pending.is_err());
        assert_eq!(storage.writes(), 0);
    }

    #[tokio::test]
    async fn test_stream_ignores_other_keys() {
        let store = store_with(Arc::new(MemoryStorage::new()));
        let mut theme = Box::pin(store.stream::<Theme>());
        assert_eq!(theme.next().await.as_deref(), Some("system"));

        store.set::<Slippage>(3.0).unwrap();
        store.set::<HideZeroBalances>(true).unwrap();

        let pending = tokio::time::timeout(std::time::Duration::from_millis(20), theme.next()).await;
        assert!(pending.is_err());
    }

    #[tokio::test]
    async fn test_each_change_is_observed_when_consumer_keeps_up() {
        let store = store_with(Arc::new(MemoryStorage::new()));
        let mut slippage = Box::pin(store.stream::<Slippage>());
        assert_eq!(slippage.next().await, Some(0.5));

        for value in [1.0, 2.0, 3.0] {
            store.set::<Slippage>(value).unwrap();
            assert_eq!(slippage.next().await, Some(value));
        }
    }

    #[test]
    fn test_set_by_name() {
        let store = store_with(Arc::new(MemoryStorage::new()));

        assert!(store.set_by_name("theme", json!("light")).unwrap());
        assert_eq!(store.get::<Theme>(), "light");
        assert!(!store.set_by_name("theme", json!("light")).unwrap());

        assert!(matches!(
            store.set_by_name("oldKey", json!(1)),
            Err(SettingsError::UnknownKey(_))
        ));
        assert!(matches!(
            store.set_by_name("slippage", json!("lots")),
            Err(SettingsError::InvalidValue { .. })
        ));
        assert!(matches!(
            store.set_by_name("slippage", json!(500.0)),
            Err(SettingsError::InvalidValue { .. })
        ));
        assert_eq!(store.get_by_name("theme").unwrap(), json!("light"));
    }

    #[test]
    fn test_set_refuses_values_that_fail_validation() {
        let storage = Arc::new(MemoryStorage::new());
        let store = store_with(storage.clone());

        assert!(matches!(
            store.set::<Slippage>(500.0),
            Err(SettingsError::InvalidValue { .. })
        ));
        assert!(matches!(
            store.set::<Theme>("neon".to_string()),
            Err(SettingsError::InvalidValue { .. })
        ));

        assert_eq!(store.get::<Slippage>(), 0.5);
        assert_eq!(store.get::<Theme>(), "system");
        assert_eq!(storage.writes(), 0);
    }

    #[tokio::test]
    async fn test_repeated_nan_is_refused_without_emitting() {
        let storage = Arc::new(MemoryStorage::new());
        let store = store_with(storage.clone());
        let mut slippage = Box::pin(store.stream::<Slippage>());
        assert_eq!(slippage.next().await, Some(0.5));

        for _ in 0..3 {
            assert!(store.set::<Slippage>(f64::NAN).is_err());
        }

        let pending = tokio::time::timeout(std::time::Duration::from_millis(20), slippage.next()).await;
        assert!(pending.is_err());
        assert_eq!(storage.writes(), 0);
        assert_eq!(store.get::<Slippage>(), 0.5);
    }

    #[test]
    fn test_reset() {
        let storage = Arc::new(MemoryStorage::new());
        let store = store_with(storage.clone());
        store.set::<Slippage>(2.0).unwrap();

        assert!(store.reset());
        assert_eq!(*store.snapshot(), Settings::default());
        assert!(!store.reset());
        assert_eq!(storage.writes(), 2);
    }
}
