//! Template context: input name → file contents.

use std::collections::BTreeMap;
use std::path::PathBuf;

use shoehorn_core::types::InputFile;

/// Name under which the full input map is bound, for names that are not
/// valid identifiers: `{{ inputs["app.conf"] }}`.
pub use shoehorn_core::types::INPUTS_VAR;

/// Rendering payload for the template strategy.
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    /// Declared input name → file contents as text.
    pub inputs: BTreeMap<String, String>,
    /// Inputs that could not be read and were bound to empty text.
    pub unreadable: Vec<PathBuf>,
}

impl TemplateContext {
    /// Read every input. Unreadable inputs map to empty text and are logged.
    pub fn from_inputs(inputs: &[InputFile]) -> Self {
        let mut ctx = TemplateContext::default();
        for input in inputs {
            let contents = match std::fs::read(&input.path) {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(err) => {
                    tracing::warn!(
                        input = %input.path.display(),
                        error = %err,
                        "failed to read input file; using empty text",
                    );
                    ctx.unreadable.push(input.path.clone());
                    String::new()
                }
            };
            ctx.inputs.insert(input.name.clone(), contents);
        }
        ctx
    }

    /// Convert to a [`tera::Context`]: each input bound as a top-level
    /// variable plus the whole map under [`INPUTS_VAR`].
    ///
    /// The map always owns [`INPUTS_VAR`]; an input declared under that name
    /// stays reachable only as `{{ inputs["inputs"] }}`.
    pub fn to_tera_context(&self) -> tera::Context {
        let mut ctx = tera::Context::new();
        for (name, contents) in &self.inputs {
            if name == INPUTS_VAR {
                tracing::warn!(
                    input = %name,
                    "input name is reserved for the input map; not bound as a variable",
                );
                continue;
            }
            ctx.insert(name.as_str(), contents);
        }
        ctx.insert(INPUTS_VAR, &self.inputs);
        ctx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn unreadable_input_maps_to_empty_text() {
        let dir = TempDir::new().expect("tempdir");
        let present = dir.path().join("present.txt");
        std::fs::write(&present, "value").expect("write");

        let ctx = TemplateContext::from_inputs(&[
            InputFile {
                name: "present".to_string(),
                path: present,
            },
            InputFile {
                name: "missing".to_string(),
                path: dir.path().join("missing.txt"),
            },
        ]);

        assert_eq!(ctx.inputs["present"], "value");
        assert_eq!(ctx.inputs["missing"], "");
        assert_eq!(ctx.unreadable, vec![dir.path().join("missing.txt")]);
    }

    #[test]
    fn to_tera_context_binds_flat_names_and_map() {
        let mut ctx = TemplateContext::default();
        ctx.inputs.insert("a".to_string(), "1".to_string());

        let tera_ctx = ctx.to_tera_context();
        assert!(tera_ctx.contains_key("a"));
        assert!(tera_ctx.contains_key(INPUTS_VAR));
    }

    #[test]
    fn input_named_like_the_map_does_not_replace_it() {
        let mut ctx = TemplateContext::default();
        ctx.inputs.insert(INPUTS_VAR.to_string(), "shadow".to_string());
        ctx.inputs.insert("a".to_string(), "1".to_string());

        let tera_ctx = ctx.to_tera_context();
        let map = tera_ctx.get(INPUTS_VAR).expect("map bound");
        assert!(map.is_object(), "got: {map}");
        assert_eq!(map[INPUTS_VAR], "shadow");
        assert_eq!(map["a"], "1");
    }
}
