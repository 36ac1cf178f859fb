//! Support library of the `chiefpay-watch` binary.
//!
//! # Modules
//!
//! - [`config`] - TOML configuration with environment variable expansion
//! - [`log`] - Formatting of client events as log records

pub mod config;
pub mod log;

pub use config::{ConfigError, WatchConfig};
