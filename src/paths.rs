//! Centralized path resolution for dexcache
//!
//! All file and directory paths are resolved through this module.
//!
//! ## Path Strategy
//!
//! The base directory follows platform standards unless `DEXCACHE_HOME` is set:
//! - **macOS**: `~/Library/Application Support/dexcache/`
//! - **Windows**: `%LOCALAPPDATA%\dexcache\`
//! - **Linux**: `$XDG_DATA_HOME/dexcache/` (fallback `~/.local/share/dexcache/`)
//!
//! ## Directory Structure
//!
//! ```text
//! dexcache/
//! └── data/
//!     ├── config.toml
//!     ├── metadata.db (+ -wal, -shm)
//!     └── settings/
//!         └── <prefix>.settings
//! ```

use once_cell::sync::Lazy;
use std::path::PathBuf;

/// Environment variable overriding the base directory
pub const HOME_ENV_VAR: &str = "DEXCACHE_HOME";

static BASE_DIRECTORY: Lazy<PathBuf> = Lazy::new(resolve_base_directory);

fn resolve_base_directory() -> PathBuf {
  const APP_DIR: &str = "dexcache";

  if let Some(dir) = std::env::var_os(HOME_ENV_VAR) {
    return PathBuf::from(dir);
  }

  if let Some(dir) = dirs::data_local_dir() {
    return dir.join(APP_DIR);
  }

  if let Some(dir) = dirs::home_dir() {
    return dir.join(APP_DIR);
  }

  PathBuf::from(APP_DIR)
}

/// Returns the base directory for all dexcache data
pub fn get_base_directory() -> PathBuf {
  BASE_DIRECTORY.clone()
}

/// Returns the data directory path
///
/// Contains the metadata database, config file and settings storage.
pub fn get_data_directory() -> PathBuf {
  BASE_DIRECTORY.join("data")
}

/// Returns the main configuration file path
pub fn get_config_path() -> PathBuf {
  get_data_directory().join("config.toml")
}

/// Returns the metadata cache database path for the configured file name
pub fn get_metadata_db_path(file_name: &str) -> PathBuf {
  get_data_directory().join(file_name)
}

/// Returns the settings storage directory for the configured directory name
pub fn get_settings_directory(dir_name: &str) -> PathBuf {
  get_data_directory().join(dir_name)
}

/// Ensures the base and data directories exist
pub fn ensure_all_directories() -> Result<(), String> {
  let dirs_to_create = vec![("base", get_base_directory()), ("data", get_data_directory())];

  for (name, dir) in dirs_to_create {
    if !dir.exists() {
      std::fs::create_dir_all(&dir).map_err(|e| {
        format!("Failed to create {} directory at {}: {}", name, dir.display(), e)
      })?;
    }
  }

  Ok(())
}
