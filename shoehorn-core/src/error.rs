//! Error types for shoehorn-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure reading the configuration document.
    #[error("failed to read config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error, with the document path and serde_yaml line context.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `strategy` is neither `append` nor `template`.
    #[error("invalid strategy '{strategy}' for generated file '{name}'; expected append or template")]
    InvalidStrategy { strategy: String, name: String },

    /// `strategy: template` without a `template` path.
    #[error("generated file '{name}' uses the template strategy but no template is set")]
    MissingTemplate { name: String },

    /// A template input uses the name reserved for the input map.
    #[error("generated file '{name}' declares an input named '{input}', which is reserved for the input map")]
    ReservedInputName { name: String, input: String },

    /// Reload is enabled with a method other than `restart` or `signal`.
    #[error("invalid reload method '{method}'; expected restart or signal")]
    InvalidReloadMethod { method: String },

    /// `method: signal` without a `signal` name.
    #[error("reload method is signal but no signal is set")]
    MissingSignal,
}
