//! Application configuration
//!
//! TOML file with embedded defaults, held in a process-wide `RwLock` and
//! read through [`with_config`].

pub mod macros;
pub mod schemas;
pub mod utils;

pub use schemas::*;
pub use utils::*;
