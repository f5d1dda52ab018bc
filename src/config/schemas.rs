/// Configuration schemas - all config structures defined once with defaults
///
/// Each struct is defined using the config_struct! macro which provides:
/// - Single-source definition (no repetition)
/// - Embedded defaults
/// - Serde support
use crate::config_struct;

// ============================================================================
// CACHE CONFIGURATION
// ============================================================================

config_struct! {
    /// Persistent metadata cache configuration
    pub struct CacheConfig {
        /// Maximum number of metadata records kept on disk. Sized to the
        /// number of chain runtimes the front end talks to.
        metadata_max_entries: usize = 4,

        /// Database file name inside the data directory
        metadata_db_file: String = "metadata.db".to_string(),
    }
}

// ============================================================================
// SETTINGS STORAGE CONFIGURATION
// ============================================================================

config_struct! {
    /// Where and under which namespace user settings are persisted
    pub struct SettingsStorageConfig {
        /// Application key prefix for local storage items
        key_prefix: String = "dexcache".to_string(),

        /// Directory name inside the data directory
        storage_dir: String = "settings".to_string(),
    }
}

// ============================================================================
// CHAIN CONFIGURATION
// ============================================================================

config_struct! {
    /// Chain collaborator limits
    pub struct ChainConfig {
        /// Upper bound for a single lookup before the result is marked stale
        lookup_timeout_ms: u64 = 15_000,
    }
}

// ============================================================================
// ROOT CONFIGURATION
// ============================================================================

config_struct! {
    /// Root configuration structure containing all sub-configurations
    pub struct Config {
        /// Metadata cache configuration
        cache: CacheConfig = CacheConfig::default(),

        /// Settings storage configuration
        settings: SettingsStorageConfig = SettingsStorageConfig::default(),

        /// Chain collaborator configuration
        chain: ChainConfig = ChainConfig::default(),
    }
}

// ============================================================================
// IMPLEMENTATIONS
// ============================================================================

impl Config {
    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.cache.metadata_max_entries == 0 {
            return Err("cache.metadata_max_entries must be > 0".to_string());
        }

        if self.cache.metadata_db_file.is_empty() {
            return Err("cache.metadata_db_file cannot be empty".to_string());
        }

        if self.settings.key_prefix.is_empty() {
            return Err("settings.key_prefix cannot be empty".to_string());
        }

        if self.chain.lookup_timeout_ms == 0 {
            return Err("chain.lookup_timeout_ms must be > 0".to_string());
        }

        Ok(())
    }
}

impl ChainConfig {
    pub fn lookup_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.lookup_timeout_ms)
    }
}
