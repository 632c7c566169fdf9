//! Error types for shoehorn-renderer.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort generation of a single output file.
///
/// Unreadable inputs are not errors: append skips them and template
/// renders them as empty text.
#[derive(Debug, Error)]
pub enum GenerateError {
    /// The output directory could not be created.
    #[error("failed to create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The template source could not be read.
    #[error("failed to read template {path}: {source}")]
    ReadTemplate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Tera failed to parse or render the template.
    #[error("template error in {path}: {source}")]
    Template {
        path: PathBuf,
        #[source]
        source: tera::Error,
    },

    /// The rendered output could not be written.
    #[error("failed to write output file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
