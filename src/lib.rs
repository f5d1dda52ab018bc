//! dexcache
//!
//! Reactive caching core for a DEX front end: shared subscriptions keyed by
//! namespace, a bounded persistent metadata cache, a reactive settings store
//! and the chain-facing services built on top of them.

pub mod arguments;
pub mod chain;
pub mod config;
pub mod errors;
pub mod logger;
pub mod metadata;
pub mod observable;
pub mod paths;
pub mod services;
pub mod settings;
