//! # shoehorn-renderer
//!
//! Generates output files from declared inputs, either by raw concatenation
//! (append) or by rendering a Tera template with one variable per input.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use shoehorn_core::load_config_at;
//! use shoehorn_renderer::generate_all;
//!
//! fn regenerate(path: &std::path::Path) {
//!     if let Ok(config) = load_config_at(path) {
//!         for report in generate_all(&config.generate).into_iter().flatten() {
//!             println!("{}: {} bytes", report.output.display(), report.bytes);
//!         }
//!     }
//! }
//! ```

pub mod context;
pub mod engine;
pub mod error;

pub use context::TemplateContext;
pub use engine::{generate, generate_all, log_failure, GenerateReport};
pub use error::GenerateError;
