/// Persisted settings format and migration
///
/// The record is stored as a JSON object `{ "version": N, ...fields }`.
/// Loading strips keys that are no longer recognized and merges what is left
/// over the defaults, recursing into nested objects, so missing keys take
/// their default and persisted values win everywhere else. A field whose
/// persisted value no longer has the right shape falls back to its default
/// without discarding the rest of the record.
use super::schema::Settings;
use crate::logger::{self, LogTag};
use serde_json::{Map, Value};

/// Current persisted layout version
pub const SETTINGS_VERSION: u32 = 1;

const VERSION_FIELD: &str = "version";

/// Result of loading a persisted record
#[derive(Debug, Clone, PartialEq)]
pub struct Migrated {
    pub settings: Settings,
    /// Version found in storage; 0 when the record predates versioning
    pub from_version: u32,
    /// Persisted keys that were not recognized and were discarded
    pub dropped_keys: Vec<String>,
    /// Recognized keys whose value could not be used
    pub rejected_keys: Vec<String>,
}

impl Migrated {
    /// Whether the stored form differs from what would be written now
    pub fn needs_rewrite(&self) -> bool {
        self.from_version != SETTINGS_VERSION || !self.dropped_keys.is_empty() || !self.rejected_keys.is_empty()
    }
}

/// Serialize a record into its persisted form
pub fn to_persisted(settings: &Settings) -> Result<Value, serde_json::Error> {
    let mut value = serde_json::to_value(settings)?;
    if let Value::Object(map) = &mut value {
        map.insert(VERSION_FIELD.to_string(), Value::from(SETTINGS_VERSION));
    }
    Ok(value)
}

/// Bring a persisted value up to the current layout
pub fn migrate(persisted: Value) -> Migrated {
    let mut object = match persisted {
        Value::Object(map) => map,
        other => {
            logger::warning(
                LogTag::Settings,
                &format!("Persisted settings are not an object ({}), using defaults", kind(&other)),
            );
            return Migrated {
                settings: Settings::default(),
                from_version: 0,
                dropped_keys: Vec::new(),
                rejected_keys: Vec::new(),
            };
        }
    };

    let from_version = object
        .remove(VERSION_FIELD)
        .and_then(|v| v.as_u64())
        .map(|v| v as u32)
        .unwrap_or(0);

    if from_version > SETTINGS_VERSION {
        logger::warning(
            LogTag::Settings,
            &format!(
                "Settings were written by a newer version ({} > {}), keeping recognized keys",
                from_version, SETTINGS_VERSION
            ),
        );
    }

    let mut dropped_keys = Vec::new();
    object.retain(|key, _| {
        let keep = Settings::is_recognized_key(key);
        if !keep {
            dropped_keys.push(key.clone());
        }
        keep
    });

    let defaults = serde_json::to_value(Settings::default()).unwrap_or(Value::Object(Map::new()));

    let mut rejected_keys = Vec::new();
    let mut merged = defaults.clone();
    for (key, value) in object {
        let mut candidate = merged.clone();
        if let Value::Object(map) = &mut candidate {
            let slot = map.entry(key.clone()).or_insert(Value::Null);
            deep_merge(slot, value);
        }

        let usable = serde_json::from_value::<Settings>(candidate.clone())
            .map(|settings| settings.validate().is_ok())
            .unwrap_or(false);
        if usable {
            merged = candidate;
        } else {
            rejected_keys.push(key);
        }
    }

    let settings = serde_json::from_value::<Settings>(merged).unwrap_or_default();

    if !dropped_keys.is_empty() {
        logger::debug(
            LogTag::Settings,
            &format!("Dropped unrecognized settings: {}", dropped_keys.join(", ")),
        );
    }
    if !rejected_keys.is_empty() {
        logger::warning(
            LogTag::Settings,
            &format!("Reset invalid settings to defaults: {}", rejected_keys.join(", ")),
        );
    }

    Migrated {
        settings,
        from_version,
        dropped_keys,
        rejected_keys,
    }
}

/// Merge `overlay` into `base`; objects merge per key, anything else replaces
pub fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                deep_merge(base_map.entry(key).or_insert(Value::Null), value);
            }
        }
        (base, overlay) => *base = overlay,
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_key_takes_default_and_unknown_key_dropped() {
        let migrated = migrate(json!({ "version": 1, "theme": "dark", "oldKey": 1 }));

        assert_eq!(migrated.settings.slippage, 0.5);
        assert_eq!(migrated.settings.theme, "dark");
        assert_eq!(migrated.dropped_keys, vec!["oldKey".to_string()]);

        let persisted = to_persisted(&migrated.settings).unwrap();
        assert!(persisted.get("oldKey").is_none());
        assert_eq!(persisted["version"], json!(SETTINGS_VERSION));
    }

    #[test]
    fn test_nested_records_merge_per_key() {
        let migrated = migrate(json!({
            "version": 1,
            "rpc_endpoints": { "polkadot": "wss://rpc.example" }
        }));
        assert_eq!(
            migrated.settings.rpc_endpoints.get("polkadot").map(String::as_str),
            Some("wss://rpc.example")
        );
        assert!(migrated.settings.light_clients);
    }

    #[test]
    fn test_wrongly_typed_value_falls_back_per_key() {
        let migrated = migrate(json!({ "version": 1, "slippage": "high", "hide_zero_balances": true }));
        assert_eq!(migrated.settings.slippage, 0.5);
        assert!(migrated.settings.hide_zero_balances);
        assert_eq!(migrated.rejected_keys, vec!["slippage".to_string()]);
        assert!(migrated.needs_rewrite());
    }

    #[test]
    fn test_unversioned_record_is_upgraded() {
        let migrated = migrate(json!({ "slippage": 1.0 }));
        assert_eq!(migrated.from_version, 0);
        assert_eq!(migrated.settings.slippage, 1.0);
        assert!(migrated.needs_rewrite());
    }

    #[test]
    fn test_current_record_needs_no_rewrite() {
        let persisted = to_persisted(&Settings::default()).unwrap();
        let migrated = migrate(persisted);
        assert_eq!(migrated.settings, Settings::default());
        assert!(!migrated.needs_rewrite());
    }

    #[test]
    fn test_non_object_uses_defaults() {
        assert_eq!(migrate(json!([1, 2, 3])).settings, Settings::default());
    }

    #[test]
    fn test_deep_merge_replaces_scalars() {
        let mut base = json!({ "a": { "b": 1, "c": 2 }, "d": 3 });
        deep_merge(&mut base, json!({ "a": { "b": 10 }, "d": [1] }));
        assert_eq!(base, json!({ "a": { "b": 10, "c": 2 }, "d": [1] }));
    }
}
