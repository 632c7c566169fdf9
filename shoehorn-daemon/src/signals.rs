//! Termination signal handling.
//!
//! The coordinator listens for **SIGINT** (Ctrl-C in a terminal) and
//! **SIGTERM** (container runtimes, systemd) and forwards whichever arrived
//! to the managed process verbatim.

use std::fmt;

use nix::sys::signal::Signal;
use tokio::signal::unix::{signal, SignalKind};

use crate::error::DaemonError;

/// A termination signal received by the supervisor itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    Interrupt,
    Terminate,
}

impl ShutdownSignal {
    pub fn as_nix(self) -> Signal {
        match self {
            ShutdownSignal::Interrupt => Signal::SIGINT,
            ShutdownSignal::Terminate => Signal::SIGTERM,
        }
    }
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_nix().as_str())
    }
}

/// Registered SIGINT/SIGTERM streams.
///
/// Registration replaces the default disposition, so the process no longer
/// dies on these signals once a listener exists.
pub struct ShutdownListener {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
}

impl ShutdownListener {
    pub fn register() -> Result<Self, DaemonError> {
        Ok(Self {
            interrupt: signal(SignalKind::interrupt()).map_err(DaemonError::Signals)?,
            terminate: signal(SignalKind::terminate()).map_err(DaemonError::Signals)?,
        })
    }

    /// Wait for the next termination signal.
    pub async fn recv(&mut self) -> ShutdownSignal {
        tokio::select! {
            Some(()) = self.interrupt.recv() => ShutdownSignal::Interrupt,
            Some(()) = self.terminate.recv() => ShutdownSignal::Terminate,
            else => std::future::pending().await,
        }
    }
}
