//! Filesystem watching: the set of watched paths and the notify wrapper.

use std::path::{Path, PathBuf};

use notify::event::ModifyKind;
use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use shoehorn_core::types::GenerateConfig;

use crate::error::DaemonError;

// ---------------------------------------------------------------------------
// WatchSet
// ---------------------------------------------------------------------------

/// Union of every input and template path across all generate specs, each
/// mapped back to the specs it feeds.
///
/// Paths are stored in absolute form, which is also how the backend reports
/// them, so relative config paths resolve against the working directory.
#[derive(Debug, Clone, Default)]
pub struct WatchSet {
    /// Unique absolute paths in first-seen order, with owning spec indices.
    entries: Vec<(PathBuf, Vec<usize>)>,
}

impl WatchSet {
    pub fn from_specs(specs: &[GenerateConfig]) -> Self {
        let mut set = WatchSet::default();
        for (index, spec) in specs.iter().enumerate() {
            for path in spec.watched_paths() {
                set.insert(path, index);
            }
        }
        set
    }

    fn insert(&mut self, path: &Path, index: usize) {
        let path = absolute(path);
        match self.entries.iter_mut().find(|(p, _)| *p == path) {
            Some((_, owners)) => {
                if !owners.contains(&index) {
                    owners.push(index);
                }
            }
            None => self.entries.push((path, vec![index])),
        }
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.entries.iter().map(|(p, _)| p.as_path())
    }

    /// Indices of the specs that depend on `path`, in declaration order.
    /// Exact match after making `path` absolute.
    pub fn specs_for(&self, path: &Path) -> &[usize] {
        let path = absolute(path);
        self.entries
            .iter()
            .find(|(p, _)| *p == path)
            .map(|(_, owners)| owners.as_slice())
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Lexically absolute form of `path`. Symlinks are not resolved; if the
/// working directory is unavailable the path is used as given.
fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|err| {
        tracing::warn!(path = %path.display(), error = %err, "could not make path absolute");
        path.to_path_buf()
    })
}

// ---------------------------------------------------------------------------
// FileWatcher
// ---------------------------------------------------------------------------

/// Item produced by [`FileWatcher::next`].
#[derive(Debug)]
pub enum WatchEvent {
    /// A watched path received a write.
    Changed(PathBuf),
    /// The backend reported a fault; the stream keeps going.
    Error(notify::Error),
}

/// Lazy, infinite stream of change events for a fixed set of paths.
///
/// Performs no deduplication: one [`WatchEvent::Changed`] per path per
/// backend notification.
pub struct FileWatcher {
    event_rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
    watched: Vec<PathBuf>,
    pending: Vec<PathBuf>,
    _watcher: RecommendedWatcher,
}

impl FileWatcher {
    /// Create the backend and register every path. Paths that cannot be
    /// registered are logged and left out; only backend creation is fatal.
    pub fn new<'a>(paths: impl IntoIterator<Item = &'a Path>) -> Result<Self, DaemonError> {
        let (event_tx, event_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
        let mut watcher = recommended_watcher(move |event| {
            let _ = event_tx.send(event);
        })?;

        let mut watched = Vec::new();
        for path in paths {
            match watcher.watch(path, RecursiveMode::NonRecursive) {
                Ok(()) => {
                    tracing::info!(path = %path.display(), "watching file");
                    watched.push(path.to_path_buf());
                }
                Err(err) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %err,
                        "could not watch file",
                    );
                }
            }
        }

        Ok(Self {
            event_rx,
            watched,
            pending: Vec::new(),
            _watcher: watcher,
        })
    }

    /// Paths that were registered successfully.
    pub fn watched(&self) -> &[PathBuf] {
        &self.watched
    }

    /// Wait for the next change or backend error.
    ///
    /// Returns `None` only if the backend has shut down.
    pub async fn next(&mut self) -> Option<WatchEvent> {
        loop {
            if !self.pending.is_empty() {
                return Some(WatchEvent::Changed(self.pending.remove(0)));
            }
            match self.event_rx.recv().await? {
                Err(err) => return Some(WatchEvent::Error(err)),
                Ok(event) if is_write_event(&event.kind) => {
                    self.pending = event.paths.iter().map(|p| absolute(p)).collect();
                }
                Ok(_) => continue,
            }
        }
    }
}

fn is_write_event(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Modify(ModifyKind::Data(_)) | EventKind::Modify(ModifyKind::Any)
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
