//! Output generation: [`generate`] and [`generate_all`].
//!
//! # Strategies
//!
//! | Strategy | Output                                                         |
//! |----------|----------------------------------------------------------------|
//! | Append   | Raw bytes of each readable input, newline-separated            |
//! | Template | Tera render of the template with one variable per input name   |
//!
//! Every failure is scoped to one [`GenerateConfig`]; [`generate_all`] logs
//! it and moves on to the next spec.

use std::error::Error as _;
use std::path::{Path, PathBuf};

use tera::Tera;

use shoehorn_core::types::{GenerateConfig, InputFile, OutputName, Strategy};

use crate::context::TemplateContext;
use crate::error::GenerateError;

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Outcome of a successful generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateReport {
    pub name: OutputName,
    pub output: PathBuf,
    pub strategy: &'static str,
    pub bytes: usize,
    /// Inputs that could not be read (skipped for append, empty for template).
    pub skipped_inputs: Vec<PathBuf>,
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Concatenate every readable input in declared order.
///
/// Each input is followed by a newline unless its last byte already is one.
/// Empty inputs contribute nothing. Returns the bytes and the skipped paths.
pub fn render_append(inputs: &[InputFile]) -> (Vec<u8>, Vec<PathBuf>) {
    let mut buffer = Vec::new();
    let mut skipped = Vec::new();
    for input in inputs {
        let data = match std::fs::read(&input.path) {
            Ok(data) => data,
            Err(err) => {
                tracing::warn!(
                    input = %input.path.display(),
                    error = %err,
                    "failed to read input file; skipping",
                );
                skipped.push(input.path.clone());
                continue;
            }
        };
        buffer.extend_from_slice(&data);
        if data.last().is_some_and(|&b| b != b'\n') {
            buffer.push(b'\n');
        }
    }
    (buffer, skipped)
}

/// Render `template` against the contents of `inputs`.
///
/// Autoescaping is disabled: outputs are configuration files, not HTML.
pub fn render_template(
    template: &Path,
    inputs: &[InputFile],
) -> Result<(String, Vec<PathBuf>), GenerateError> {
    let source = std::fs::read_to_string(template).map_err(|source| {
        GenerateError::ReadTemplate {
            path: template.to_path_buf(),
            source,
        }
    })?;

    let ctx = TemplateContext::from_inputs(inputs);
    let template_err = |source: tera::Error| GenerateError::Template {
        path: template.to_path_buf(),
        source,
    };

    let name = template.to_string_lossy();
    let mut tera = Tera::default();
    tera.autoescape_on(vec![]);
    tera.add_raw_template(&name, &source).map_err(template_err)?;
    let rendered = tera
        .render(&name, &ctx.to_tera_context())
        .map_err(template_err)?;
    Ok((rendered, ctx.unreadable))
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// Generate one output file, overwriting it in full.
///
/// Nothing is written when the directory cannot be created or the template
/// cannot be read, parsed or rendered; any existing output stays untouched.
pub fn generate(spec: &GenerateConfig) -> Result<GenerateReport, GenerateError> {
    let output = spec.output_path();
    if let Some(dir) = output.parent() {
        std::fs::create_dir_all(dir).map_err(|source| GenerateError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let (bytes, skipped_inputs) = match &spec.strategy {
        Strategy::Append => render_append(&spec.inputs),
        Strategy::Template { template } => {
            let (rendered, skipped) = render_template(template, &spec.inputs)?;
            (rendered.into_bytes(), skipped)
        }
    };

    std::fs::write(&output, &bytes).map_err(|source| GenerateError::Write {
        path: output.clone(),
        source,
    })?;

    tracing::info!(
        output = %output.display(),
        strategy = spec.strategy.label(),
        bytes = bytes.len(),
        "generated file",
    );
    Ok(GenerateReport {
        name: spec.name.clone(),
        output,
        strategy: spec.strategy.label(),
        bytes: bytes.len(),
        skipped_inputs,
    })
}

/// Generate every spec in declared order. Failures are logged and returned
/// in place; they never stop the remaining specs.
pub fn generate_all(specs: &[GenerateConfig]) -> Vec<Result<GenerateReport, GenerateError>> {
    specs
        .iter()
        .map(|spec| {
            let result = generate(spec);
            if let Err(err) = &result {
                log_failure(spec, err);
            }
            result
        })
        .collect()
}

/// Log a generation failure including the full source chain (tera keeps the
/// useful detail in nested sources).
pub fn log_failure(spec: &GenerateConfig, err: &GenerateError) {
    let mut detail = err.to_string();
    let mut source = err.source().and_then(|s| s.source());
    while let Some(cause) = source {
        detail.push_str(": ");
        detail.push_str(&cause.to_string());
        source = cause.source();
    }
    tracing::error!(name = %spec.name, error = %detail, "generation failed");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
