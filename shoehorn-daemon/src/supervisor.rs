//! Managed process supervisor.
//!
//! A single task owns the handle to the running child. Every operation is a
//! [`Command`] sent through one queue, so check-liveness → signal → replace
//! sequences never interleave. The actor also waits on the current child;
//! that branch is the exit monitor.
//!
//! ```text
//! NoProcess ─start─▶ Running ─exit─▶ Exited   (ExitNotice emitted)
//!                      │  ▲
//!                      │  └── restart: SIGTERM, bounded wait, SIGKILL, respawn
//!                      └─shutdown─▶ Exited | Killed   (actor stops)
//! ```

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::process::{Child, Command as ProcessCommand};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use shoehorn_core::types::{ProcessConfig, ReloadPolicy, ReloadSignal};

use crate::error::DaemonError;
use crate::settings::{RESTART_GRACE, SUPERVISOR_QUEUE};
use crate::signals::ShutdownSignal;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SupervisorOptions {
    /// Bounded wait for the old instance during a restart before SIGKILL.
    pub restart_grace: Duration,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            restart_grace: RESTART_GRACE,
        }
    }
}

/// Emitted when the managed process terminates on its own (not as part of a
/// restart or shutdown).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitNotice {
    pub pid: u32,
    /// `None` if waiting on the child failed.
    pub status: Option<ExitStatus>,
}

impl ExitNotice {
    pub fn exit_code(&self) -> i32 {
        exit_code(self.status)
    }
}

/// 0 for a clean exit, 1 for anything else (non-zero code, killed by a
/// signal, or unknown).
pub fn exit_code(status: Option<ExitStatus>) -> i32 {
    match status {
        Some(status) if status.success() => 0,
        _ => 1,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// No executable configured; the run is generation-only.
    NotConfigured,
    AlreadyRunning { pid: u32 },
    Started { pid: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    Disabled,
    NoProcess,
    Restarted {
        old_pid: u32,
        new_pid: u32,
        forced: bool,
    },
    Signalled {
        pid: u32,
        signal: ReloadSignal,
        delivered: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    NoProcess,
    /// Exited within the grace period.
    Graceful { status: Option<ExitStatus> },
    /// Killed after the grace period expired.
    Forced,
}

// ---------------------------------------------------------------------------
// Commands + handle
// ---------------------------------------------------------------------------

enum Command {
    Start {
        respond_to: oneshot::Sender<Result<StartOutcome, DaemonError>>,
    },
    Reload {
        respond_to: oneshot::Sender<Result<ReloadOutcome, DaemonError>>,
    },
    Shutdown {
        signal: ShutdownSignal,
        grace: Duration,
        respond_to: oneshot::Sender<ShutdownOutcome>,
    },
    Pid {
        respond_to: oneshot::Sender<Option<u32>>,
    },
}

/// Cloneable handle to the supervisor task.
#[derive(Debug, Clone)]
pub struct SupervisorHandle {
    tx: mpsc::Sender<Command>,
}

impl SupervisorHandle {
    /// Spawn the managed process. Spawn failure is fatal for the run.
    pub async fn start(&self) -> Result<StartOutcome, DaemonError> {
        self.request(|respond_to| Command::Start { respond_to })
            .await?
    }

    /// Apply the configured reload policy to the current instance. Blocks
    /// until a restart has fully replaced the old process.
    pub async fn reload(&self) -> Result<ReloadOutcome, DaemonError> {
        self.request(|respond_to| Command::Reload { respond_to })
            .await?
    }

    /// Forward `signal`, wait up to `grace`, kill on timeout. The supervisor
    /// stops accepting commands afterwards.
    pub async fn shutdown(
        &self,
        signal: ShutdownSignal,
        grace: Duration,
    ) -> Result<ShutdownOutcome, DaemonError> {
        self.request(|respond_to| Command::Shutdown {
            signal,
            grace,
            respond_to,
        })
        .await
    }

    /// Pid of the currently tracked instance, if any.
    pub async fn pid(&self) -> Result<Option<u32>, DaemonError> {
        self.request(|respond_to| Command::Pid { respond_to }).await
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, DaemonError> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(command(tx))
            .await
            .map_err(|_| DaemonError::ChannelClosed("supervisor queue"))?;
        rx.await
            .map_err(|_| DaemonError::ChannelClosed("supervisor response"))
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

struct ManagedProcess {
    pid: u32,
    child: Child,
}

enum Stopped {
    Exited(Option<ExitStatus>),
    Killed,
}

pub struct Supervisor {
    config: ProcessConfig,
    options: SupervisorOptions,
    current: Option<ManagedProcess>,
    exits: mpsc::UnboundedSender<ExitNotice>,
}

impl Supervisor {
    /// Spawn the supervisor task. Nothing is started until
    /// [`SupervisorHandle::start`] is called.
    pub fn spawn(
        config: ProcessConfig,
        options: SupervisorOptions,
    ) -> (
        SupervisorHandle,
        mpsc::UnboundedReceiver<ExitNotice>,
        JoinHandle<()>,
    ) {
        let (tx, rx) = mpsc::channel(SUPERVISOR_QUEUE);
        let (exit_tx, exit_rx) = mpsc::unbounded_channel();
        let actor = Supervisor {
            config,
            options,
            current: None,
            exits: exit_tx,
        };
        let task = tokio::spawn(actor.run(rx));
        (SupervisorHandle { tx }, exit_rx, task)
    }

    async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        loop {
            tokio::select! {
                command = rx.recv() => {
                    let Some(command) = command else { break };
                    if !self.handle(command).await {
                        break;
                    }
                }
                (pid, status) = wait_current(&mut self.current) => {
                    self.on_exit(pid, status);
                }
            }
        }
        tracing::debug!("supervisor stopped");
    }

    /// Returns `false` once the actor should stop.
    async fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::Start { respond_to } => {
                let _ = respond_to.send(self.start());
            }
            Command::Reload { respond_to } => {
                let outcome = self.reload().await;
                let _ = respond_to.send(outcome);
            }
            Command::Shutdown {
                signal,
                grace,
                respond_to,
            } => {
                let outcome = self.shutdown(signal, grace).await;
                let _ = respond_to.send(outcome);
                return false;
            }
            Command::Pid { respond_to } => {
                let _ = respond_to.send(self.current.as_ref().map(|p| p.pid));
            }
        }
        true
    }

    fn start(&mut self) -> Result<StartOutcome, DaemonError> {
        if !self.config.is_configured() {
            tracing::info!("no process specified to manage; only managing configuration files");
            return Ok(StartOutcome::NotConfigured);
        }
        if let Some(process) = &self.current {
            return Ok(StartOutcome::AlreadyRunning { pid: process.pid });
        }

        tracing::info!(
            program = %self.config.path.display(),
            args = ?self.config.args,
            "starting managed process",
        );
        let spawn_err = |source: std::io::Error| DaemonError::Spawn {
            program: self.config.path.clone(),
            source,
        };
        let child = ProcessCommand::new(&self.config.path)
            .args(&self.config.args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(spawn_err)?;
        let pid = child.id().ok_or_else(|| {
            spawn_err(std::io::Error::other("child exited before its pid was read"))
        })?;

        tracing::info!(pid, "managed process started");
        self.current = Some(ManagedProcess { pid, child });
        Ok(StartOutcome::Started { pid })
    }

    async fn reload(&mut self) -> Result<ReloadOutcome, DaemonError> {
        let Some(pid) = self.current.as_ref().map(|p| p.pid) else {
            tracing::info!("no managed process to reload");
            return Ok(ReloadOutcome::NoProcess);
        };

        match self.config.reload.clone() {
            ReloadPolicy::Disabled => Ok(ReloadOutcome::Disabled),
            ReloadPolicy::Signal(name) => {
                let signal = resolve_reload_signal(&name);
                tracing::info!(pid, signal = %signal, "sending reload signal to managed process");
                let delivered = send_signal(pid, to_nix(signal));
                Ok(ReloadOutcome::Signalled {
                    pid,
                    signal,
                    delivered,
                })
            }
            ReloadPolicy::Restart => {
                tracing::info!(pid, "restarting managed process");
                let Some(mut old) = self.current.take() else {
                    return Ok(ReloadOutcome::NoProcess);
                };
                let stopped = stop(&mut old, Signal::SIGTERM, self.options.restart_grace).await;
                let forced = matches!(stopped, Stopped::Killed);
                match self.start()? {
                    StartOutcome::Started { pid: new_pid } => Ok(ReloadOutcome::Restarted {
                        old_pid: pid,
                        new_pid,
                        forced,
                    }),
                    // Unreachable in practice: the old handle was taken and
                    // the config was already known to be set.
                    StartOutcome::AlreadyRunning { .. } | StartOutcome::NotConfigured => {
                        Ok(ReloadOutcome::NoProcess)
                    }
                }
            }
        }
    }

    async fn shutdown(&mut self, signal: ShutdownSignal, grace: Duration) -> ShutdownOutcome {
        let Some(mut process) = self.current.take() else {
            return ShutdownOutcome::NoProcess;
        };
        tracing::info!(pid = process.pid, signal = %signal, "forwarding signal to managed process");
        match stop(&mut process, signal.as_nix(), grace).await {
            Stopped::Exited(status) => {
                tracing::info!(pid = process.pid, "managed process exited gracefully");
                ShutdownOutcome::Graceful { status }
            }
            Stopped::Killed => ShutdownOutcome::Forced,
        }
    }

    fn on_exit(&mut self, pid: u32, status: std::io::Result<ExitStatus>) {
        self.current = None;
        let status = match status {
            Ok(status) => {
                if status.success() {
                    tracing::info!(pid, "managed process completed successfully");
                } else {
                    tracing::error!(pid, status = %status, "managed process exited with error");
                }
                Some(status)
            }
            Err(err) => {
                tracing::error!(pid, error = %err, "failed to wait on managed process");
                None
            }
        };
        let _ = self.exits.send(ExitNotice { pid, status });
    }
}

/// Resolves to the current child's exit, or never if there is none.
async fn wait_current(
    current: &mut Option<ManagedProcess>,
) -> (u32, std::io::Result<ExitStatus>) {
    match current {
        Some(process) => (process.pid, process.child.wait().await),
        None => std::future::pending().await,
    }
}

/// Send `signal`, wait up to `grace`, then SIGKILL.
async fn stop(process: &mut ManagedProcess, signal: Signal, grace: Duration) -> Stopped {
    send_signal(process.pid, signal);
    match tokio::time::timeout(grace, process.child.wait()).await {
        Ok(Ok(status)) => Stopped::Exited(Some(status)),
        Ok(Err(err)) => {
            tracing::warn!(pid = process.pid, error = %err, "failed to wait on managed process");
            Stopped::Exited(None)
        }
        Err(_) => {
            tracing::warn!(
                pid = process.pid,
                grace_ms = grace.as_millis() as u64,
                "timeout waiting for managed process to exit, forcing termination",
            );
            if let Err(err) = process.child.kill().await {
                tracing::warn!(pid = process.pid, error = %err, "failed to kill managed process");
            }
            Stopped::Killed
        }
    }
}

/// Delivery failures (process already gone) are logged, never fatal.
fn send_signal(pid: u32, signal: Signal) -> bool {
    let Ok(raw) = i32::try_from(pid) else {
        tracing::warn!(pid, "pid out of range for signal delivery");
        return false;
    };
    match kill(Pid::from_raw(raw), signal) {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(pid, signal = %signal, error = %err, "failed to send signal to managed process");
            false
        }
    }
}

/// Unknown names fall back to SIGHUP.
pub fn resolve_reload_signal(name: &str) -> ReloadSignal {
    name.parse().unwrap_or_else(|_| {
        tracing::warn!(signal = name, "unsupported reload signal, using SIGHUP instead");
        ReloadSignal::Hup
    })
}

pub fn to_nix(signal: ReloadSignal) -> Signal {
    match signal {
        ReloadSignal::Hup => Signal::SIGHUP,
        ReloadSignal::Usr1 => Signal::SIGUSR1,
        ReloadSignal::Usr2 => Signal::SIGUSR2,
        ReloadSignal::Term => Signal::SIGTERM,
        ReloadSignal::Int => Signal::SIGINT,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;

    #[test]
    fn unknown_reload_signal_falls_back_to_hangup() {
        assert_eq!(resolve_reload_signal("SIGWINCH"), ReloadSignal::Hup);
        assert_eq!(resolve_reload_signal("SIGUSR2"), ReloadSignal::Usr2);
    }

    #[test]
    fn reload_signals_map_to_matching_nix_signals() {
        for signal in ReloadSignal::all() {
            assert_eq!(to_nix(*signal).as_str(), signal.name());
        }
    }

    #[test]
    fn exit_code_is_zero_only_for_success() {
        assert_eq!(exit_code(Some(ExitStatus::from_raw(0))), 0);
        // Raw wait status: exit code 3 lives in the high byte.
        assert_eq!(exit_code(Some(ExitStatus::from_raw(3 << 8))), 1);
        // Killed by SIGKILL.
        assert_eq!(exit_code(Some(ExitStatus::from_raw(9))), 1);
        assert_eq!(exit_code(None), 1);
    }

    #[tokio::test]
    async fn start_without_executable_is_a_noop() {
        let (supervisor, _exits, _task) =
            Supervisor::spawn(ProcessConfig::default(), SupervisorOptions::default());

        assert_eq!(
            supervisor.start().await.expect("start"),
            StartOutcome::NotConfigured
        );
        assert_eq!(supervisor.pid().await.expect("pid"), None);
        assert_eq!(
            supervisor.reload().await.expect("reload"),
            ReloadOutcome::NoProcess
        );
    }

    #[tokio::test]
    async fn requests_after_shutdown_report_closed_channel() {
        let (supervisor, _exits, task) =
            Supervisor::spawn(ProcessConfig::default(), SupervisorOptions::default());

        let outcome = supervisor
            .shutdown(ShutdownSignal::Terminate, Duration::from_millis(10))
            .await
            .expect("shutdown");
        assert_eq!(outcome, ShutdownOutcome::NoProcess);
        task.await.expect("actor joins");

        let err = supervisor.pid().await.unwrap_err();
        assert!(matches!(err, DaemonError::ChannelClosed(_)), "got: {err}");
    }
}
