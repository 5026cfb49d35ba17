//! Desktop model: the single writer of the entry store.
//!
//! Watcher callbacks, activations and drag-and-drop requests all arrive as
//! [`DesktopCommand`]s on one channel and are applied in order by
//! [`DesktopModel::run`]. The rendering surface learns about every change
//! through a broadcast of [`DesktopUpdate`]s, one per inserted or removed
//! entry.

use crate::desktop::entry::{Entry, EntryId, EntryIdentity};
use crate::desktop::entry_store::EntryStore;
use crate::desktop::icons::RenderedIcon;
use crate::desktop::launch::{self, LaunchBackend};
use crate::desktop::transfer::{self, ImportReport};
use crate::desktop::watcher::{ChangeSink, FsChange};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use url::Url;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ModelError {
    #[error("desktop model is no longer running")]
    Closed,
}

/// What the rendering surface needs to draw one grid cell.
#[derive(Debug, Clone)]
pub struct EntryRow {
    pub id: EntryId,
    pub identity: EntryIdentity,
    pub display_name: String,
    pub icon: RenderedIcon,
}

/// Update notification sent to the rendering surface.
#[derive(Debug, Clone)]
pub enum DesktopUpdate {
    /// A new entry now sits at `index`.
    Inserted { index: usize, row: EntryRow },
    /// The entry previously at `index` is gone.
    Removed { index: usize, id: EntryId },
    /// Activating an entry did not start anything.
    LaunchFailed {
        id: EntryId,
        display_name: String,
        reason: String,
    },
    /// A drop finished; every item was attempted.
    ImportFinished { copied: usize, failures: Vec<String> },
}

/// Requests processed by the model, in arrival order.
#[derive(Debug)]
pub enum DesktopCommand {
    Fs(FsChange),
    Activate(EntryId),
    DragGet {
        selection: Vec<EntryId>,
        reply: oneshot::Sender<Vec<Url>>,
    },
    Drop {
        references: Vec<String>,
        completion: oneshot::Sender<ImportReport>,
    },
    Snapshot {
        reply: oneshot::Sender<Vec<EntryRow>>,
    },
}

/// Cloneable sender side of the model's command channel.
#[derive(Debug, Clone)]
pub struct DesktopHandle {
    tx: mpsc::UnboundedSender<DesktopCommand>,
}

impl DesktopHandle {
    pub fn send(&self, command: DesktopCommand) -> Result<(), ModelError> {
        self.tx.send(command).map_err(|_| ModelError::Closed)
    }

    /// Sink for a [`DirectoryWatcher`](crate::desktop::DirectoryWatcher) that
    /// forwards each change to the model.
    pub fn change_sink(&self) -> ChangeSink {
        let tx = self.tx.clone();
        Arc::new(move |change| {
            if tx.send(DesktopCommand::Fs(change)).is_err() {
                tracing::debug!("desktop model stopped, dropping filesystem change");
            }
        })
    }

    pub fn activate(&self, id: EntryId) -> Result<(), ModelError> {
        self.send(DesktopCommand::Activate(id))
    }

    /// URIs for `selection`, in selection order.
    pub async fn drag_get(&self, selection: Vec<EntryId>) -> Result<Vec<Url>, ModelError> {
        let (reply, rx) = oneshot::channel();
        self.send(DesktopCommand::DragGet { selection, reply })?;
        rx.await.map_err(|_| ModelError::Closed)
    }

    /// Import dropped references; resolves once, after every item was tried.
    pub async fn drop_references(&self, references: Vec<String>) -> Result<ImportReport, ModelError> {
        let (completion, rx) = oneshot::channel();
        self.send(DesktopCommand::Drop {
            references,
            completion,
        })?;
        rx.await.map_err(|_| ModelError::Closed)
    }

    pub async fn snapshot(&self) -> Result<Vec<EntryRow>, ModelError> {
        let (reply, rx) = oneshot::channel();
        self.send(DesktopCommand::Snapshot { reply })?;
        rx.await.map_err(|_| ModelError::Closed)
    }
}

/// Owns the entry store and applies commands to it.
pub struct DesktopModel {
    store: EntryStore,
    launcher: Arc<dyn LaunchBackend>,
    watch_dir: PathBuf,
    commands: mpsc::UnboundedReceiver<DesktopCommand>,
    updates: broadcast::Sender<DesktopUpdate>,
}

impl DesktopModel {
    /// Creates a new desktop model.
    ///
    /// # Arguments
    /// * `watch_dir` - The directory whose children are shown; canonicalized
    /// * `store` - Entry store, usually empty
    /// * `launcher` - Backend used when an entry is activated
    /// * `buffer_size` - Size of the update broadcast buffer
    ///
    /// # Returns
    /// The model, a handle for sending it commands, and a receiver for updates.
    pub fn new(
        watch_dir: PathBuf,
        store: EntryStore,
        launcher: Arc<dyn LaunchBackend>,
        buffer_size: usize,
    ) -> (Self, DesktopHandle, broadcast::Receiver<DesktopUpdate>) {
        // Match the watcher, which reports children of the canonical directory.
        let watch_dir = watch_dir.canonicalize().unwrap_or(watch_dir);
        let (tx, commands) = mpsc::unbounded_channel();
        let (updates, update_rx) = broadcast::channel(buffer_size.max(1));
        (
            Self {
                store,
                launcher,
                watch_dir,
                commands,
                updates,
            },
            DesktopHandle { tx },
            update_rx,
        )
    }

    pub fn store(&self) -> &EntryStore {
        &self.store
    }

    /// Subscribe to update notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<DesktopUpdate> {
        self.updates.subscribe()
    }

    /// Insert every current child of the watched directory.
    ///
    /// The directory subscription must already exist so that files created
    /// during the scan are not missed; the duplicates this produces are
    /// rejected by the store.
    pub fn scan(&mut self) -> std::io::Result<usize> {
        let mut inserted = 0;
        for dir_entry in fs::read_dir(&self.watch_dir)? {
            match dir_entry {
                Ok(dir_entry) => {
                    if self.insert(&dir_entry.path()) {
                        inserted += 1;
                    }
                }
                Err(e) => tracing::warn!("error while scanning {}: {}", self.watch_dir.display(), e),
            }
        }
        tracing::debug!("initial scan of {} found {} entries", self.watch_dir.display(), inserted);
        Ok(inserted)
    }

    /// Scan the directory, then process commands until every handle is gone.
    pub async fn run(mut self) {
        if let Err(e) = self.scan() {
            tracing::error!("Failed to scan directory {}: {}", self.watch_dir.display(), e);
        }
        while let Some(command) = self.commands.recv().await {
            self.apply(command);
        }
        tracing::info!("desktop command channel closed, stopping model");
        tracing::debug!("{}", self.store.debug_summary());
    }

    /// Apply one command. Everything except drops completes synchronously.
    pub fn apply(&mut self, command: DesktopCommand) {
        match command {
            DesktopCommand::Fs(FsChange::Created(path)) => {
                self.insert(&path);
            }
            DesktopCommand::Fs(FsChange::Deleted(path)) => self.remove(&path),
            DesktopCommand::Activate(id) => self.activate(id),
            DesktopCommand::DragGet { selection, reply } => {
                let uris = transfer::export_uris(&self.store, &selection);
                let _ = reply.send(uris);
            }
            DesktopCommand::Drop {
                references,
                completion,
            } => self.import(references, completion),
            DesktopCommand::Snapshot { reply } => {
                let rows = self.store.snapshot().map(row_for).collect();
                let _ = reply.send(rows);
            }
        }
    }

    fn insert(&mut self, path: &Path) -> bool {
        let Some(inserted) = self.store.insert(path) else {
            return false;
        };
        if let Some(entry) = self.store.lookup(inserted.id) {
            tracing::debug!("added {} as {}", path.display(), inserted.id);
            self.notify(DesktopUpdate::Inserted {
                index: inserted.index,
                row: row_for(entry),
            });
        }
        true
    }

    fn remove(&mut self, path: &Path) {
        if let Some(removed) = self.store.remove_by_identity(path) {
            tracing::debug!("removed {} ({})", path.display(), removed.id);
            self.notify(DesktopUpdate::Removed {
                index: removed.index,
                id: removed.id,
            });
        }
    }

    fn activate(&self, id: EntryId) {
        let Some(entry) = self.store.lookup(id) else {
            tracing::debug!("activation of unknown entry {}", id);
            return;
        };
        if let Err(e) = launch::launch(entry, self.launcher.as_ref()) {
            tracing::warn!("failed to launch {}: {}", entry.display_name(), e);
            let update = DesktopUpdate::LaunchFailed {
                id,
                display_name: entry.display_name().to_string(),
                reason: e.to_string(),
            };
            self.notify(update);
        }
    }

    fn import(&self, references: Vec<String>, completion: oneshot::Sender<ImportReport>) {
        let destination = self.watch_dir.clone();
        let updates = self.updates.clone();

        // Copies block; they run on the blocking pool and never touch the
        // store. New files come back through the watcher.
        tokio::spawn(async move {
            let attempted = references.clone();
            let joined = tokio::task::spawn_blocking(move || {
                transfer::import_references(&references, &destination)
            })
            .await;
            let report = settle_import(&attempted, joined);

            let summary = DesktopUpdate::ImportFinished {
                copied: report.success_count(),
                failures: report
                    .failures()
                    .map(|(reference, e)| format!("{reference}: {e}"))
                    .collect(),
            };
            let _ = updates.send(summary);
            let _ = completion.send(report);
        });
    }

    fn notify(&self, update: DesktopUpdate) {
        if let Err(e) = self.updates.send(update) {
            tracing::trace!("no surface listening for update: {}", e);
        }
    }
}

/// The report for a finished copy task. A task that died still yields one
/// report, with every reference marked as failed.
fn settle_import(
    attempted: &[String],
    joined: Result<ImportReport, tokio::task::JoinError>,
) -> ImportReport {
    joined.unwrap_or_else(|e| {
        tracing::error!("import task failed: {}", e);
        ImportReport::interrupted(attempted)
    })
}

fn row_for(entry: &Entry) -> EntryRow {
    EntryRow {
        id: entry.id(),
        identity: entry.identity().clone(),
        display_name: entry.display_name().to_string(),
        icon: entry.rendered_icon().clone(),
    }
}

/// Builder for DesktopModel with sensible defaults.
pub struct DesktopModelBuilder {
    watch_dir: PathBuf,
    store: EntryStore,
    launcher: Arc<dyn LaunchBackend>,
    buffer_size: usize,
}

impl DesktopModelBuilder {
    pub fn new(watch_dir: PathBuf, store: EntryStore) -> Self {
        Self {
            watch_dir,
            store,
            launcher: Arc::new(launch::SystemLauncher),
            buffer_size: 256, // Default: 256 pending updates
        }
    }

    pub fn launcher(mut self, launcher: Arc<dyn LaunchBackend>) -> Self {
        self.launcher = launcher;
        self
    }

    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    pub fn build(self) -> (DesktopModel, DesktopHandle, broadcast::Receiver<DesktopUpdate>) {
        DesktopModel::new(self.watch_dir, self.store, self.launcher, self.buffer_size)
    }
}
