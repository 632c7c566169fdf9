//! Runtime for shoehorn: file watcher, debounce, process supervisor and the
//! coordinator that wires them together.

pub mod debounce;
mod error;
pub mod logging;
mod runtime;
pub mod settings;
pub mod signals;
pub mod supervisor;
pub mod watcher;

pub use debounce::Debounce;
pub use error::DaemonError;
pub use logging::{init_tracing, LogFormat};
pub use runtime::{run, run_until, start_blocking, RunOptions, RunOutcome};
pub use signals::{ShutdownListener, ShutdownSignal};
pub use supervisor::{
    ExitNotice, ReloadOutcome, ShutdownOutcome, StartOutcome, Supervisor, SupervisorHandle,
    SupervisorOptions,
};
pub use watcher::{FileWatcher, WatchEvent, WatchSet};
