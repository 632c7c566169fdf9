//! Shoehorn: container entrypoint that keeps generated config files in
//! sync with their inputs and supervises one child process.
//!
//! # Usage
//!
//! ```text
//! shoehorn [--debounce-ms N] [--grace-period SECS] [--log-format text|json] <config.yaml> [ARGS...]
//! ```
//!
//! Trailing `ARGS` are appended to `process.args` from the config file.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use shoehorn_core::load_config_at;
use shoehorn_daemon::{init_tracing, start_blocking, LogFormat, RunOptions};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "shoehorn",
    version,
    about = "Generate config files from watched inputs and supervise one process",
    long_about = None,
)]
struct Cli {
    /// Minimum spacing between handled file changes, in milliseconds.
    #[arg(long, default_value_t = 100)]
    debounce_ms: u64,

    /// Seconds the managed process gets to exit after a termination signal.
    #[arg(long, default_value_t = 5)]
    grace_period: u64,

    /// Log line format.
    #[arg(long, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Path to the YAML configuration file.
    config: PathBuf,

    /// Extra arguments for the managed process.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

impl Cli {
    fn run_options(&self) -> RunOptions {
        let grace = Duration::from_secs(self.grace_period);
        RunOptions {
            debounce: Duration::from_millis(self.debounce_ms),
            grace_period: grace,
            restart_grace: grace,
        }
    }

    fn run(self) -> Result<i32> {
        let options = self.run_options();
        let config = load_config_at(&self.config)
            .with_context(|| format!("failed to load config {}", self.config.display()))?
            .with_extra_args(self.args);

        let outcome = start_blocking(config, options).context("supervisor exited with error")?;
        Ok(outcome.exit_code())
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.run() {
        Ok(0) => ExitCode::SUCCESS,
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::FAILURE
        }
    }
}
