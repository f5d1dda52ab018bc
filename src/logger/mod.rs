//! Structured logging for dexcache
//!
//! This module provides a small, ergonomic logging API with:
//! - Standard log levels (Error/Warning/Info/Debug/Verbose)
//! - Per-subsystem debug control via --debug-<tag> flags
//! - Colored console output through the `log` facade
//!
//! ## Usage
//!
//! ```rust
//! use dexcache::logger::{self, LogTag};
//!
//! logger::warning(LogTag::Metadata, "Metadata store unavailable, treating as miss");
//! logger::info(LogTag::Settings, "Settings loaded");
//! logger::debug(LogTag::Cache, "Producer started"); // Only if --debug-cache
//! ```
//!
//! ## Initialization
//!
//! Call once at startup (in main.rs):
//! ```rust
//! dexcache::logger::init();
//! ```
//!
//! Library consumers that install their own `log` backend can skip `init()`;
//! records are still emitted with `dexcache::<tag>` targets.

mod config;
mod core;
mod format;
mod levels;
mod tags;

pub use config::{get_logger_config, set_logger_config, LoggerConfig};
pub use levels::LogLevel;
pub use tags::LogTag;

/// Initialize the logger system
///
/// 1. Parse command-line arguments for debug flags
/// 2. Install the colored console backend
pub fn init() {
    config::init_from_args();

    if !format::install() {
        warning(LogTag::System, "Another log backend is already installed");
    }
}

/// Log at ERROR level (always shown, critical issues)
pub fn error(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Error, message);
}

/// Log at WARNING level (degraded but recoverable behavior)
pub fn warning(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Warning, message);
}

/// Log at INFO level (standard operations)
pub fn info(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Info, message);
}

/// Log at DEBUG level, shown only with --debug-<tag>
pub fn debug(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Debug, message);
}

/// Log at VERBOSE level, shown only with --verbose
pub fn verbose(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Verbose, message);
}

/// Flush pending console output
pub fn flush() {
    log::logger().flush();
}
