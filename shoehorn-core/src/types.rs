//! Validated configuration types consumed by the generator and daemon.
//!
//! All path fields use `PathBuf`. These values are produced by
//! [`crate::config::load_config`] and are read-only for the lifetime of a run.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Name of a generated output file, relative to its output directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OutputName(pub String);

impl fmt::Display for OutputName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for OutputName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OutputName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Template variable holding the whole input map. Template specs may not
/// declare an input under this name.
pub const INPUTS_VAR: &str = "inputs";

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// How an output file is produced from its inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    /// Raw byte concatenation of every input, in declared order.
    Append,
    /// Render `template` with one variable bound per input name.
    Template { template: PathBuf },
}

impl Strategy {
    pub fn label(&self) -> &'static str {
        match self {
            Strategy::Append => "append",
            Strategy::Template { .. } => "template",
        }
    }

    pub fn template_path(&self) -> Option<&Path> {
        match self {
            Strategy::Append => None,
            Strategy::Template { template } => Some(template),
        }
    }
}

/// Named signals that may be delivered to the managed process on reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReloadSignal {
    Hup,
    Usr1,
    Usr2,
    Term,
    Int,
}

impl ReloadSignal {
    pub fn all() -> &'static [ReloadSignal] {
        &[
            ReloadSignal::Hup,
            ReloadSignal::Usr1,
            ReloadSignal::Usr2,
            ReloadSignal::Term,
            ReloadSignal::Int,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            ReloadSignal::Hup => "SIGHUP",
            ReloadSignal::Usr1 => "SIGUSR1",
            ReloadSignal::Usr2 => "SIGUSR2",
            ReloadSignal::Term => "SIGTERM",
            ReloadSignal::Int => "SIGINT",
        }
    }
}

impl fmt::Display for ReloadSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ReloadSignal {
    type Err = String;

    /// Accepts `SIGHUP`, `sighup` and `HUP` alike.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        let bare = upper.strip_prefix("SIG").unwrap_or(&upper);
        match bare {
            "HUP" => Ok(ReloadSignal::Hup),
            "USR1" => Ok(ReloadSignal::Usr1),
            "USR2" => Ok(ReloadSignal::Usr2),
            "TERM" => Ok(ReloadSignal::Term),
            "INT" => Ok(ReloadSignal::Int),
            _ => Err(format!(
                "unsupported signal '{s}'; expected one of SIGHUP, SIGUSR1, SIGUSR2, SIGTERM, SIGINT"
            )),
        }
    }
}

/// How the managed process is refreshed after a regeneration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ReloadPolicy {
    #[default]
    Disabled,
    /// Terminate the running instance and spawn a fresh one.
    Restart,
    /// Deliver the named signal to the running instance. The name is kept
    /// verbatim; unknown names are resolved (with a fallback) at reload time.
    Signal(String),
}

impl ReloadPolicy {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, ReloadPolicy::Disabled)
    }
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// One input file feeding a generated output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    /// Variable name the contents are bound to in templates.
    pub name: String,
    pub path: PathBuf,
}

/// A single output file and the inputs it is generated from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateConfig {
    pub name: OutputName,
    /// Directory the output file is written into.
    pub path: PathBuf,
    pub strategy: Strategy,
    pub inputs: Vec<InputFile>,
}

impl GenerateConfig {
    /// `<path>/<name>`
    pub fn output_path(&self) -> PathBuf {
        self.path.join(&self.name.0)
    }

    /// Every path whose change should trigger regeneration: inputs in
    /// declared order, then the template (if any).
    pub fn watched_paths(&self) -> impl Iterator<Item = &Path> {
        self.inputs
            .iter()
            .map(|input| input.path.as_path())
            .chain(self.strategy.template_path())
    }

    /// Exact-match test against [`Self::watched_paths`].
    pub fn depends_on(&self, path: &Path) -> bool {
        self.watched_paths().any(|p| p == path)
    }
}

/// The single child process supervised for the run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcessConfig {
    /// Executable path. Empty means "generation only, no child".
    pub path: PathBuf,
    pub args: Vec<String>,
    pub reload: ReloadPolicy,
}

impl ProcessConfig {
    pub fn is_configured(&self) -> bool {
        !self.path.as_os_str().is_empty()
    }
}

/// Root of a validated configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Config {
    pub generate: Vec<GenerateConfig>,
    pub process: ProcessConfig,
}

impl Config {
    /// Append trailing command-line arguments to the managed process args.
    pub fn with_extra_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.process.args.extend(args.into_iter().map(Into::into));
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
