/// Configuration macros for zero-repetition definitions
///
/// `config_struct!` defines an application configuration section with
/// embedded defaults. `settings_struct!` defines the user settings record:
/// the same embedded-default struct plus one typed key marker per field, so
/// settings can be read, written and watched by key.

/// Define a configuration struct with embedded defaults
///
/// # Example
/// ```
/// dexcache::config_struct! {
///     pub struct CacheConfig {
///         metadata_max_entries: usize = 4,
///         metadata_db_file: String = "metadata.db".to_string(),
///     }
/// }
///
/// assert_eq!(CacheConfig::default().metadata_max_entries, 4);
/// ```
///
/// This generates:
/// - A struct with public fields
/// - A Default implementation with the specified values
/// - Serde support with `#[serde(default)]`, so missing fields take defaults
#[macro_export]
macro_rules! config_struct {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                $field_name:ident: $field_type:ty = $default_value:expr
            ),*
            $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
        #[serde(default)]
        $vis struct $name {
            $(
                $(#[$field_meta])*
                pub $field_name: $field_type,
            )*
        }

        impl Default for $name {
            fn default() -> Self {
                Self {
                    $(
                        $field_name: $default_value,
                    )*
                }
            }
        }
    };
}

/// Define the settings record with embedded defaults and typed keys
///
/// Each field is declared as `name => KeyType: Type = default`. On top of
/// what `config_struct!` generates, this emits:
/// - a `keys` module with one unit struct per field implementing
///   [`crate::settings::Setting`]
/// - `RECOGNIZED_KEYS`, the list of persisted field names
#[macro_export]
macro_rules! settings_struct {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                $field_name:ident => $key:ident: $field_type:ty = $default_value:expr
            ),*
            $(,)?
        }
    ) => {
        $crate::config_struct! {
            $(#[$meta])*
            $vis struct $name {
                $(
                    $(#[$field_meta])*
                    $field_name: $field_type = $default_value
                ),*
            }
        }

        impl $name {
            /// Names of every recognized setting, in declaration order
            pub const RECOGNIZED_KEYS: &'static [&'static str] = &[$(stringify!($field_name)),*];
        }

        /// Typed keys for individual settings
        pub mod keys {
            use super::*;

            $(
                #[derive(Debug, Clone, Copy, PartialEq, Eq)]
                pub struct $key;

                impl $crate::settings::Setting for $key {
                    type Value = $field_type;
                    const NAME: &'static str = stringify!($field_name);

                    fn get(record: &$name) -> &Self::Value {
                        &record.$field_name
                    }

                    fn set(record: &mut $name, value: Self::Value) {
                        record.$field_name = value;
                    }
                }
            )*
        }
    };
}
