//! Directory watcher with native/polling fallback.
//!
//! Watches a single directory (non-recursively) and turns raw `notify` events
//! into [`FsChange`]s: creations and deletions of direct children. Everything
//! else is dropped. A rename is reported as an uncorrelated delete of the old
//! name and create of the new one.

use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, PollWatcher, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while establishing the directory subscription.
#[derive(Error, Debug)]
pub enum WatcherError {
    #[error("Failed to create watcher: {0}")]
    WatcherCreation(#[from] notify::Error),

    #[error("Failed to watch path {path}: {source}")]
    WatchPath {
        path: PathBuf,
        source: notify::Error,
    },

    #[error("{0} is not a directory")]
    NotADirectory(PathBuf),
}

/// A change to the set of files directly inside the watched directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsChange {
    Created(PathBuf),
    Deleted(PathBuf),
}

impl FsChange {
    pub fn path(&self) -> &Path {
        match self {
            FsChange::Created(p) | FsChange::Deleted(p) => p,
        }
    }
}

/// Callback receiving translated changes. Runs on the backend's thread.
pub type ChangeSink = Arc<dyn Fn(FsChange) + Send + Sync>;

/// Which notification backend ended up serving the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchBackend {
    Native,
    Polling,
}

/// Translate one raw event into store-level changes for children of `dir`.
pub fn translate_event(dir: &Path, event: &Event) -> Vec<FsChange> {
    let direct_children = event.paths.iter().filter(|p| p.parent() == Some(dir));

    match event.kind {
        EventKind::Create(_) => direct_children.cloned().map(FsChange::Created).collect(),
        EventKind::Remove(_) => direct_children.cloned().map(FsChange::Deleted).collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            direct_children.cloned().map(FsChange::Deleted).collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            direct_children.cloned().map(FsChange::Created).collect()
        }
        // Backends that cannot tell which half of a rename they saw.
        EventKind::Modify(ModifyKind::Name(RenameMode::Any | RenameMode::Other)) => {
            direct_children
                .map(|p| {
                    if p.symlink_metadata().is_ok() {
                        FsChange::Created(p.clone())
                    } else {
                        FsChange::Deleted(p.clone())
                    }
                })
                .collect()
        }
        // `Both` repeats the From/To pair that was already delivered.
        _ => Vec::new(),
    }
}

/// The single subscription binding one directory to one change sink.
///
/// Dropping the watcher tears the subscription down.
pub struct DirectoryWatcher {
    dir: PathBuf,
    backend: WatchBackend,
    _native: Option<RecommendedWatcher>,
    _poll: Option<PollWatcher>,
}

impl DirectoryWatcher {
    /// Start watching `dir`, trying the native backend first.
    ///
    /// # Arguments
    /// * `dir` - The directory to watch; its direct children become entries
    /// * `poll_interval` - Scan interval used if polling is needed
    /// * `sink` - Receives every translated change
    pub fn watch(dir: &Path, poll_interval: Duration, sink: ChangeSink) -> Result<Self, WatcherError> {
        let dir = Self::canonical_dir(dir)?;

        match Self::watch_native(&dir, Arc::clone(&sink)) {
            Ok(native) => {
                tracing::debug!("Using native watcher for {}", dir.display());
                return Ok(Self {
                    dir,
                    backend: WatchBackend::Native,
                    _native: Some(native),
                    _poll: None,
                });
            }
            Err(e) => {
                tracing::warn!(
                    "Native watcher failed for {}: {}, falling back to polling",
                    dir.display(),
                    e
                );
            }
        }

        Self::start_polling(dir, poll_interval, sink)
    }

    /// Start watching `dir` with the polling backend only.
    pub fn watch_polling_only(
        dir: &Path,
        poll_interval: Duration,
        sink: ChangeSink,
    ) -> Result<Self, WatcherError> {
        let dir = Self::canonical_dir(dir)?;
        Self::start_polling(dir, poll_interval, sink)
    }

    /// Backends may report resolved paths, so events are matched against the
    /// canonical directory.
    fn canonical_dir(dir: &Path) -> Result<PathBuf, WatcherError> {
        if !dir.is_dir() {
            return Err(WatcherError::NotADirectory(dir.to_path_buf()));
        }
        dir.canonicalize().map_err(|e| WatcherError::WatchPath {
            path: dir.to_path_buf(),
            source: notify::Error::io(e),
        })
    }

    fn start_polling(dir: PathBuf, poll_interval: Duration, sink: ChangeSink) -> Result<Self, WatcherError> {
        let poll = Self::watch_polling(&dir, poll_interval, sink)?;
        tracing::debug!("Using poll watcher for {}", dir.display());
        Ok(Self {
            dir,
            backend: WatchBackend::Polling,
            _native: None,
            _poll: Some(poll),
        })
    }

    fn handler(dir: PathBuf, sink: ChangeSink) -> impl Fn(Result<Event, notify::Error>) + Send + 'static {
        move |res| match res {
            Ok(event) => {
                for change in translate_event(&dir, &event) {
                    sink(change);
                }
            }
            Err(e) => tracing::warn!("watch error on {}: {}", dir.display(), e),
        }
    }

    fn watch_native(dir: &Path, sink: ChangeSink) -> Result<RecommendedWatcher, WatcherError> {
        let mut watcher = RecommendedWatcher::new(
            Self::handler(dir.to_path_buf(), sink),
            Config::default(),
        )?;
        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| WatcherError::WatchPath {
                path: dir.to_path_buf(),
                source: e,
            })?;
        Ok(watcher)
    }

    fn watch_polling(
        dir: &Path,
        poll_interval: Duration,
        sink: ChangeSink,
    ) -> Result<PollWatcher, WatcherError> {
        let config = Config::default()
            .with_poll_interval(poll_interval)
            .with_compare_contents(false); // Avoid unnecessary file reads
        let mut watcher = PollWatcher::new(Self::handler(dir.to_path_buf(), sink), config)?;
        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| WatcherError::WatchPath {
                path: dir.to_path_buf(),
                source: e,
            })?;
        Ok(watcher)
    }

    /// The watched directory, canonicalized. Entry paths are its children.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn backend(&self) -> WatchBackend {
        self.backend
    }
}
