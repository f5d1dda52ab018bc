/// Error taxonomy for the caching core
///
/// Transient lookup failures and storage failures are caught at the boundary
/// of the component that performs the I/O and turned into status values or
/// warnings. These types only cross module boundaries inside the crate and
/// towards the CLI.
use thiserror::Error;

// =============================================================================
// OBSERVABLE CACHE ERRORS
// =============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cached stream {namespace}::{key} was created with item type {existing}, requested {requested}")]
    TypeMismatch {
        namespace: String,
        key: String,
        existing: &'static str,
        requested: &'static str,
    },
}

// =============================================================================
// STORAGE ERRORS
// =============================================================================

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")] Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")] Io(#[from] std::io::Error),

    #[error("Storage task failed: {0}")] Task(String),

    #[error("Storage unavailable: {0}")] Unavailable(String),
}

// =============================================================================
// CHAIN COLLABORATOR ERRORS
// =============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("Failed to connect to chain {chain_id}: {reason}")] Connection {
        chain_id: String,
        reason: String,
    },

    #[error("Unknown chain: {0}")] UnknownChain(String),

    #[error("Query failed: {0}")] Query(String),

    #[error("Timeout error: operation timed out after {millis} ms")] Timeout {
        millis: u64,
    },

    #[error("Invalid address: {0}")] InvalidAddress(String),
}

impl ChainError {
    /// Whether retrying the same call later may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, ChainError::Connection { .. } | ChainError::Query(_) | ChainError::Timeout { .. })
    }
}

// =============================================================================
// SETTINGS ERRORS
// =============================================================================

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Unknown setting: {0}")] UnknownKey(String),

    #[error("Invalid value for setting {key}: {reason}")] InvalidValue {
        key: String,
        reason: String,
    },
}

// =============================================================================
// CONFIGURATION ERRORS
// =============================================================================

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")] Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")] Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Config already initialized")] AlreadyInitialized,

    #[error("Invalid configuration: {0}")] Invalid(String),
}
