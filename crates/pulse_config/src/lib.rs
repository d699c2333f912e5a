//! Parsing and validation of `pulse.toml` simulation run settings.
//!
//! This crate reads the run configuration file and produces a strongly-typed
//! [`PulseConfig`] holding scheduler timing parameters and waveform output
//! settings.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str, CONFIG_FILE_NAME};
pub use types::*;
