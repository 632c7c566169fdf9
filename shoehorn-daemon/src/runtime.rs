use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use shoehorn_core::types::Config;
use shoehorn_renderer::{generate, generate_all, log_failure};

use crate::debounce::Debounce;
use crate::error::{io_err, DaemonError};
use crate::settings::{DEBOUNCE_WINDOW, GRACE_PERIOD, RESTART_GRACE};
use crate::signals::{ShutdownListener, ShutdownSignal};
use crate::supervisor::{
    ReloadOutcome, ShutdownOutcome, StartOutcome, Supervisor, SupervisorHandle, SupervisorOptions,
};
use crate::watcher::{FileWatcher, WatchEvent, WatchSet};

/// Runtime tunables.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub debounce: Duration,
    /// Grace period after forwarding a termination signal.
    pub grace_period: Duration,
    /// Grace period for the old instance during a restart.
    pub restart_grace: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            debounce: DEBOUNCE_WINDOW,
            grace_period: GRACE_PERIOD,
            restart_grace: RESTART_GRACE,
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The managed process terminated on its own.
    ChildExited { pid: u32, code: i32 },
    /// A termination signal was received and handled.
    Shutdown {
        signal: ShutdownSignal,
        outcome: ShutdownOutcome,
    },
}

impl RunOutcome {
    /// Exit status for the supervisor itself. Shutdown always succeeds.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::ChildExited { code, .. } => *code,
            RunOutcome::Shutdown { .. } => 0,
        }
    }
}

/// Start the runtime and block the current thread until it exits.
pub fn start_blocking(config: Config, options: RunOptions) -> Result<RunOutcome, DaemonError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(config, options))
}

/// Run until the managed process exits or SIGINT/SIGTERM arrives.
pub async fn run(config: Config, options: RunOptions) -> Result<RunOutcome, DaemonError> {
    // Registered before anything is spawned so no signal is missed.
    let mut listener = ShutdownListener::register()?;
    run_until(config, options, async move { listener.recv().await }).await
}

/// Same as [`run`] with the termination trigger supplied by the caller.
///
/// Startup: build the watch set, generate every spec once, start the
/// managed process. Then the watch loop, the supervisor's exit monitor and
/// `shutdown` race; the first to finish decides the outcome.
pub async fn run_until<F>(
    config: Config,
    options: RunOptions,
    shutdown: F,
) -> Result<RunOutcome, DaemonError>
where
    F: Future<Output = ShutdownSignal> + Send + 'static,
{
    let mut shutdown_handle = tokio::spawn(shutdown);
    let config = Arc::new(config);

    let watch_set = WatchSet::from_specs(&config.generate);
    let watcher = FileWatcher::new(watch_set.paths())?;
    tracing::info!(
        specs = config.generate.len(),
        watched = watcher.watched().len(),
        of = watch_set.len(),
        "watch set registered",
    );

    {
        let config = config.clone();
        tokio::task::spawn_blocking(move || generate_all(&config.generate))
            .await
            .map_err(|err| join_err("initial_generation", err))?;
    }

    let (supervisor, mut exits, _actor) = Supervisor::spawn(
        config.process.clone(),
        SupervisorOptions {
            restart_grace: options.restart_grace,
        },
    );
    if let StartOutcome::Started { pid } = supervisor.start().await? {
        tracing::debug!(pid, "initial process started");
    }

    let mut watch_handle = {
        let config = config.clone();
        let supervisor = supervisor.clone();
        tokio::spawn(watch_loop(
            watcher,
            watch_set,
            config,
            supervisor,
            Debounce::new(options.debounce),
        ))
    };

    let result = tokio::select! {
        Some(notice) = exits.recv() => Ok(RunOutcome::ChildExited {
            pid: notice.pid,
            code: notice.exit_code(),
        }),
        signal = &mut shutdown_handle => match signal {
            Ok(signal) => {
                tracing::info!(signal = %signal, "received signal, shutting down");
                // Stop regenerating before tearing the process down.
                watch_handle.abort();
                let outcome = supervisor.shutdown(signal, options.grace_period).await?;
                Ok(RunOutcome::Shutdown { signal, outcome })
            }
            Err(err) => Err(join_err("signal_listener", err)),
        },
        watched = &mut watch_handle => match watched {
            Ok(Ok(())) => Err(DaemonError::ChannelClosed("watcher events")),
            Ok(Err(err)) => Err(err),
            Err(err) => Err(join_err("watcher", err)),
        },
    };

    watch_handle.abort();
    shutdown_handle.abort();
    result
}

/// Consume watch events for the rest of the run.
///
/// Returns `Err` only for fatal faults (a restart that cannot respawn).
async fn watch_loop(
    mut watcher: FileWatcher,
    watch_set: WatchSet,
    config: Arc<Config>,
    supervisor: SupervisorHandle,
    mut debounce: Debounce,
) -> Result<(), DaemonError> {
    while let Some(event) = watcher.next().await {
        match event {
            WatchEvent::Error(err) => {
                tracing::warn!(error = %err, "watcher error");
            }
            WatchEvent::Changed(path) => {
                if !debounce.accept(Instant::now()) {
                    tracing::debug!(path = %path.display(), "change debounced");
                    continue;
                }
                tracing::info!(path = %path.display(), "file modified");
                handle_change(&path, &watch_set, &config, &supervisor).await?;
            }
        }
    }
    Ok(())
}

/// What one accepted change did.
#[derive(Debug, Default)]
pub(crate) struct ChangeReport {
    /// Indices of the regenerated specs, in the order they ran.
    pub regenerated: Vec<usize>,
    /// One entry per regeneration when reload is enabled.
    pub reloads: Vec<ReloadOutcome>,
}

/// Regenerate every spec depending on `path`, in declaration order, with one
/// reload per regeneration when reload is enabled.
pub(crate) async fn handle_change(
    path: &Path,
    watch_set: &WatchSet,
    config: &Arc<Config>,
    supervisor: &SupervisorHandle,
) -> Result<ChangeReport, DaemonError> {
    let mut report = ChangeReport::default();
    for &index in watch_set.specs_for(path) {
        let spec = config.generate[index].clone();
        tracing::info!(name = %spec.name, "regenerating output");
        tokio::task::spawn_blocking(move || {
            if let Err(err) = generate(&spec) {
                log_failure(&spec, &err);
            }
        })
        .await
        .map_err(|err| join_err("generate", err))?;
        report.regenerated.push(index);

        if config.process.reload.is_enabled() {
            let outcome = supervisor.reload().await?;
            match outcome {
                ReloadOutcome::Restarted {
                    old_pid,
                    new_pid,
                    forced,
                } => tracing::info!(old_pid, new_pid, forced, "managed process restarted"),
                ReloadOutcome::Signalled { pid, signal, .. } => {
                    tracing::debug!(pid, signal = %signal, "reload signal sent")
                }
                ReloadOutcome::NoProcess | ReloadOutcome::Disabled => {}
            }
            report.reloads.push(outcome);
        }
    }
    Ok(report)
}

fn join_err(task: &'static str, err: tokio::task::JoinError) -> DaemonError {
    DaemonError::Join {
        task,
        message: err.to_string(),
    }
}
