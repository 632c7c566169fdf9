//! YAML configuration loading.
//!
//! # Document shape
//!
//! ```yaml
//! generate:
//!   - name: nginx.conf
//!     path: /etc/nginx
//!     strategy: template          # append | template
//!     template: /config/nginx.conf.tera
//!     inputs:
//!       - name: upstreams
//!         path: /config/upstreams.conf
//! process:
//!   path: /usr/sbin/nginx
//!   args: ["-g", "daemon off;"]
//!   reload:
//!     enabled: true
//!     method: signal              # restart | signal
//!     signal: SIGHUP
//! ```
//!
//! The raw document is deserialized into private `Raw*` structs and then
//! validated into [`Config`]. Validation order matches the document: every
//! `generate` entry first, then `process.reload`.

use std::io::Read;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;
use crate::types::{
    Config, GenerateConfig, InputFile, OutputName, ProcessConfig, ReloadPolicy, Strategy,
    INPUTS_VAR,
};

// ---------------------------------------------------------------------------
// 1. Raw document
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawConfig {
    generate: Vec<RawGenerate>,
    process: RawProcess,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawGenerate {
    name: String,
    path: PathBuf,
    strategy: String,
    template: PathBuf,
    inputs: Vec<RawInput>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawInput {
    name: String,
    path: PathBuf,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawProcess {
    path: PathBuf,
    args: Vec<String>,
    reload: RawReload,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawReload {
    enabled: bool,
    method: String,
    signal: String,
}

// ---------------------------------------------------------------------------
// 2. Load
// ---------------------------------------------------------------------------

/// Load and validate a configuration file.
///
/// Returns `ConfigError::Io` if the file cannot be read and
/// `ConfigError::Parse` (with path + line context) if the YAML is malformed.
pub fn load_config_at(path: &Path) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&contents, path)
}

/// Load and validate a configuration document from any reader.
pub fn load_config(mut reader: impl Read) -> Result<Config, ConfigError> {
    let origin = PathBuf::from("<reader>");
    let mut contents = String::new();
    reader
        .read_to_string(&mut contents)
        .map_err(|source| ConfigError::Io {
            path: origin.clone(),
            source,
        })?;
    parse(&contents, &origin)
}

fn parse(contents: &str, origin: &Path) -> Result<Config, ConfigError> {
    // An empty document is a valid, empty configuration.
    if contents.trim().is_empty() {
        return Ok(Config::default());
    }
    let raw: RawConfig = serde_yaml::from_str(contents).map_err(|source| ConfigError::Parse {
        path: origin.to_path_buf(),
        source,
    })?;
    validate(raw)
}

// ---------------------------------------------------------------------------
// 3. Validate
// ---------------------------------------------------------------------------

fn validate(raw: RawConfig) -> Result<Config, ConfigError> {
    let generate = raw
        .generate
        .into_iter()
        .map(validate_generate)
        .collect::<Result<Vec<_>, _>>()?;
    let process = validate_process(raw.process)?;
    Ok(Config { generate, process })
}

fn validate_generate(raw: RawGenerate) -> Result<GenerateConfig, ConfigError> {
    let strategy = match raw.strategy.as_str() {
        "append" => Strategy::Append,
        "template" if raw.template.as_os_str().is_empty() => {
            return Err(ConfigError::MissingTemplate { name: raw.name });
        }
        "template" => Strategy::Template {
            template: raw.template,
        },
        other => {
            return Err(ConfigError::InvalidStrategy {
                strategy: other.to_string(),
                name: raw.name,
            });
        }
    };

    if matches!(strategy, Strategy::Template { .. }) {
        if let Some(input) = raw.inputs.iter().find(|i| i.name == INPUTS_VAR) {
            return Err(ConfigError::ReservedInputName {
                name: raw.name,
                input: input.name.clone(),
            });
        }
    }

    Ok(GenerateConfig {
        name: OutputName::from(raw.name),
        path: raw.path,
        strategy,
        inputs: raw
            .inputs
            .into_iter()
            .map(|input| InputFile {
                name: input.name,
                path: input.path,
            })
            .collect(),
    })
}

fn validate_process(raw: RawProcess) -> Result<ProcessConfig, ConfigError> {
    let reload = if raw.reload.enabled {
        match raw.reload.method.as_str() {
            "restart" => ReloadPolicy::Restart,
            "signal" if raw.reload.signal.is_empty() => return Err(ConfigError::MissingSignal),
            "signal" => ReloadPolicy::Signal(raw.reload.signal),
            other => {
                return Err(ConfigError::InvalidReloadMethod {
                    method: other.to_string(),
                });
            }
        }
    } else {
        ReloadPolicy::Disabled
    };

    Ok(ProcessConfig {
        path: raw.path,
        args: raw.args,
        reload,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_empty_config() {
        let config = load_config("".as_bytes()).expect("load");
        assert_eq!(config, Config::default());
    }

    #[test]
    fn disabled_reload_skips_method_validation() {
        let yaml = "process:\n  path: /bin/app\n  reload:\n    enabled: false\n    method: bogus\n";
        let config = load_config(yaml.as_bytes()).expect("load");
        assert_eq!(config.process.reload, ReloadPolicy::Disabled);
        assert_eq!(config.process.path, PathBuf::from("/bin/app"));
    }

    #[test]
    fn signal_name_is_kept_verbatim() {
        let yaml = "process:\n  path: /bin/app\n  reload:\n    enabled: true\n    method: signal\n    signal: SIGWINCH\n";
        let config = load_config(yaml.as_bytes()).expect("load");
        assert_eq!(
            config.process.reload,
            ReloadPolicy::Signal("SIGWINCH".to_string())
        );
    }

    #[test]
    fn template_path_moves_into_strategy() {
        let yaml = "generate:\n  - name: out\n    path: /tmp\n    strategy: template\n    template: /tpl/out.tera\n";
        let config = load_config(yaml.as_bytes()).expect("load");
        assert_eq!(
            config.generate[0].strategy,
            Strategy::Template {
                template: PathBuf::from("/tpl/out.tera")
            }
        );
    }
}
