//! Shoehorn core library: configuration types, YAML loading and errors.
//!
//! Public API surface:
//! - [`types`]: validated configuration structs and enums
//! - [`error`]: [`ConfigError`]
//! - [`config`]: load + validate

pub mod config;
pub mod error;
pub mod types;

pub use config::{load_config, load_config_at};
pub use error::ConfigError;
pub use types::{
    Config, GenerateConfig, InputFile, OutputName, ProcessConfig, ReloadPolicy, ReloadSignal,
    Strategy,
};
