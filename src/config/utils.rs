use super::schemas::Config;
/// Configuration utilities - loading and access helpers
///
/// Loads configuration from disk, falling back to defaults when the file is
/// missing, and hands out read access through `with_config`.
use crate::errors::ConfigError;
use crate::logger::{self, LogTag};
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// Global configuration instance
///
/// Reads before `load_config()` see the embedded defaults.
static CONFIG: OnceCell<RwLock<Config>> = OnceCell::new();

/// Set once a file (or explicit defaults) has been loaded
static LOADED: AtomicBool = AtomicBool::new(false);

fn config_lock() -> &'static RwLock<Config> {
    CONFIG.get_or_init(|| RwLock::new(Config::default()))
}

/// Default configuration file path
pub fn default_config_path() -> PathBuf {
    crate::paths::get_config_path()
}

/// Load configuration from the default path and install it globally
pub fn load_config() -> Result<(), ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific file path
///
/// If the file doesn't exist, default values from the schema are used.
/// Fails if a configuration was already loaded.
pub fn load_config_from_path<P: AsRef<Path>>(path: P) -> Result<(), ConfigError> {
    if LOADED.load(Ordering::SeqCst) {
        return Err(ConfigError::AlreadyInitialized);
    }

    let path = path.as_ref();
    let config = if path.exists() {
        read_config_file(path)?
    } else {
        logger::info(
            LogTag::Config,
            &format!("Config file '{}' not found, using default values", path.display()),
        );
        Config::default()
    };

    *config_lock().write() = config;
    LOADED.store(true, Ordering::SeqCst);
    Ok(())
}

/// Parse and validate a TOML configuration file
pub fn read_config_file(path: &Path) -> Result<Config, ConfigError> {
    let display = path.display().to_string();
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: display.clone(),
        source,
    })?;

    let config = toml::from_str::<Config>(&contents).map_err(|source| ConfigError::Parse {
        path: display,
        source,
    })?;

    config.validate().map_err(ConfigError::Invalid)?;
    Ok(config)
}

/// Execute a function with read access to the configuration
///
/// ```
/// use dexcache::config::with_config;
///
/// let max_entries = with_config(|cfg| cfg.cache.metadata_max_entries);
/// assert!(max_entries > 0);
/// ```
pub fn with_config<F, R>(f: F) -> R
where
    F: FnOnce(&Config) -> R,
{
    let config = config_lock().read();
    f(&config)
}
