//! Headless icon grid: the rendering-surface side of the desktop model.
//!
//! `IconGrid` mirrors the entry store as a list of rows by applying
//! [`DesktopUpdate`]s one at a time, tracks the selection, and forwards the
//! activate / drag-get / drag-received hooks to the model.

use crate::desktop::transfer::{decode_uri_list, encode_uri_list, ImportReport};
use crate::desktop::{DesktopHandle, DesktopUpdate, EntryId, EntryRow, ModelError};
use crate::ui::style::{GridLayout, LabelStyle};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

/// Callback type for requesting a redraw.
pub type RedrawCallback = Box<dyn Fn() + Send + Sync>;

/// Callback type for user-facing notices (launch and copy failures).
pub type NoticeCallback = Box<dyn Fn(&str) + Send + Sync>;

/// State of the grid as the surface would draw it.
#[derive(Debug, Clone, Default)]
pub struct GridState {
    /// Rows in display order.
    pub rows: Vec<EntryRow>,
    /// Selected entries, in the order they were selected.
    pub selection: Vec<EntryId>,
    /// Whether a full redraw is needed.
    pub needs_full_redraw: bool,
    /// Rows touched since the last redraw, by index.
    pub dirty_rows: Vec<usize>,
}

impl GridState {
    /// Apply one update. Returns `false` if the update did not line up with
    /// the current rows and a resync is needed.
    ///
    /// Updates already reflected in the rows (an insert of a present id, a
    /// removal of an absent one) are no-ops, so replaying updates that
    /// overlap a snapshot never duplicates a row.
    pub fn apply(&mut self, update: &DesktopUpdate) -> bool {
        match update {
            DesktopUpdate::Inserted { index, row } => {
                if let Some(pos) = self.rows.iter().position(|r| r.id == row.id) {
                    self.rows[pos] = row.clone();
                    self.dirty_rows.push(pos);
                    return true;
                }
                if *index > self.rows.len() {
                    return false;
                }
                self.rows.insert(*index, row.clone());
                self.dirty_rows.push(*index);
                true
            }
            DesktopUpdate::Removed { index, id } => {
                let position = match self.rows.get(*index) {
                    Some(row) if row.id == *id => *index,
                    _ => match self.rows.iter().position(|r| r.id == *id) {
                        Some(pos) => pos,
                        None => return true,
                    },
                };
                self.rows.remove(position);
                self.selection.retain(|s| s != id);
                self.dirty_rows.push(position);
                true
            }
            DesktopUpdate::LaunchFailed { .. } | DesktopUpdate::ImportFinished { .. } => true,
        }
    }

    /// Replace all rows, dropping selected ids that no longer exist.
    pub fn reset(&mut self, rows: Vec<EntryRow>) {
        self.selection.retain(|id| rows.iter().any(|r| r.id == *id));
        self.rows = rows;
        self.dirty_rows.clear();
        self.needs_full_redraw = true;
    }
}

/// A reference to the grid state for use in async contexts.
#[derive(Clone)]
pub struct IconGridHandle {
    state: Arc<RwLock<GridState>>,
    redraw_cb: Option<Arc<RedrawCallback>>,
    notice_cb: Option<Arc<NoticeCallback>>,
}

impl IconGridHandle {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(GridState::default())),
            redraw_cb: None,
            notice_cb: None,
        }
    }

    pub fn set_redraw_callback(&mut self, cb: RedrawCallback) {
        self.redraw_cb = Some(Arc::new(cb));
    }

    pub fn set_notice_callback(&mut self, cb: NoticeCallback) {
        self.notice_cb = Some(Arc::new(cb));
    }

    pub async fn state(&self) -> GridState {
        self.state.read().await.clone()
    }

    pub async fn rows(&self) -> Vec<EntryRow> {
        self.state.read().await.rows.clone()
    }

    pub async fn selection(&self) -> Vec<EntryId> {
        self.state.read().await.selection.clone()
    }

    /// Apply an update; `false` means the caller should resync.
    pub async fn apply(&self, update: &DesktopUpdate) -> bool {
        let applied = self.state.write().await.apply(update);
        match update {
            DesktopUpdate::LaunchFailed {
                display_name,
                reason,
                ..
            } => self.notice(&format!("Could not open {display_name}: {reason}")),
            DesktopUpdate::ImportFinished { failures, .. } => {
                for failure in failures {
                    self.notice(&format!("Could not copy {failure}"));
                }
            }
            _ if applied => self.request_redraw().await,
            _ => {}
        }
        applied
    }

    pub async fn reset(&self, rows: Vec<EntryRow>) {
        self.state.write().await.reset(rows);
        self.request_redraw().await;
    }

    /// Request a redraw of the grid.
    pub async fn request_redraw(&self) {
        if let Some(ref cb) = self.redraw_cb {
            cb();
        }
    }

    /// Clear the dirty state after redraw.
    pub async fn clear_dirty(&self) {
        let mut state = self.state.write().await;
        state.dirty_rows.clear();
        state.needs_full_redraw = false;
    }

    fn notice(&self, message: &str) {
        tracing::warn!("{}", message);
        if let Some(ref cb) = self.notice_cb {
            cb(message);
        }
    }

    /// Replace the selection with the row at `index`.
    pub async fn select_only(&self, index: usize) {
        let mut state = self.state.write().await;
        let id = state.rows.get(index).map(|r| r.id);
        state.selection = id.into_iter().collect();
    }

    /// Add or remove the row at `index` from the selection.
    pub async fn toggle_selected(&self, index: usize) {
        let mut state = self.state.write().await;
        let Some(id) = state.rows.get(index).map(|r| r.id) else {
            return;
        };
        if let Some(pos) = state.selection.iter().position(|s| *s == id) {
            state.selection.remove(pos);
        } else {
            state.selection.push(id);
        }
    }

    pub async fn clear_selection(&self) {
        self.state.write().await.selection.clear();
    }
}

impl Default for IconGridHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Icon grid component.
///
/// This component:
/// - Listens to desktop updates from the broadcast channel
/// - Applies them to its rows incrementally
/// - Forwards user interaction to the desktop model
pub struct IconGrid {
    grid: IconGridHandle,
    desktop: DesktopHandle,
    layout: GridLayout,
    label_style: LabelStyle,
    listener_handle: Option<tokio::task::JoinHandle<()>>,
}

impl IconGrid {
    pub fn new(desktop: DesktopHandle) -> Self {
        Self {
            grid: IconGridHandle::new(),
            desktop,
            layout: GridLayout::default(),
            label_style: LabelStyle::default(),
            listener_handle: None,
        }
    }

    pub fn grid(&self) -> &IconGridHandle {
        &self.grid
    }

    pub fn grid_mut(&mut self) -> &mut IconGridHandle {
        &mut self.grid
    }

    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    pub fn label_style(&self) -> &LabelStyle {
        &self.label_style
    }

    /// Start listening for desktop updates.
    pub fn setup_update_listener(&mut self, rx: broadcast::Receiver<DesktopUpdate>) {
        let grid = self.grid.clone();
        let desktop = self.desktop.clone();

        let handle = tokio::spawn(async move {
            Self::listener_loop(grid, desktop, rx).await;
        });

        self.listener_handle = Some(handle);
    }

    async fn listener_loop(
        grid: IconGridHandle,
        desktop: DesktopHandle,
        mut rx: broadcast::Receiver<DesktopUpdate>,
    ) {
        loop {
            match rx.recv().await {
                Ok(update) => {
                    if !grid.apply(&update).await {
                        tracing::debug!("icon grid out of step, resyncing");
                        Self::resync(&grid, &desktop, &mut rx).await;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    tracing::warn!(
                        "IconGrid lagged behind by {} updates, requesting full refresh",
                        count
                    );
                    Self::resync(&grid, &desktop, &mut rx).await;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("DesktopUpdate channel closed, stopping listener");
                    break;
                }
            }
        }
    }

    /// Replace the rows with a snapshot. The backlog queued before the
    /// snapshot is discarded; anything sent after resubscribing is either
    /// already in the snapshot or newer than it.
    async fn resync(
        grid: &IconGridHandle,
        desktop: &DesktopHandle,
        rx: &mut broadcast::Receiver<DesktopUpdate>,
    ) {
        *rx = rx.resubscribe();
        match desktop.snapshot().await {
            Ok(rows) => grid.reset(rows).await,
            Err(e) => tracing::warn!("cannot resync icon grid: {}", e),
        }
    }

    /// Double-click / Enter on the row at `index`.
    pub async fn activate(&self, index: usize) -> Result<(), ModelError> {
        let id = self.grid.state.read().await.rows.get(index).map(|r| r.id);
        match id {
            Some(id) => self.desktop.activate(id),
            None => Ok(()),
        }
    }

    /// Payload for a drag started on the grid: the selection as a URI list.
    pub async fn drag_data_get(&self) -> Result<String, ModelError> {
        let selection = self.grid.selection().await;
        let uris = self.desktop.drag_get(selection).await?;
        Ok(encode_uri_list(&uris))
    }

    /// A URI list dropped onto the grid. Returns once every item was tried.
    pub async fn drag_data_received(&self, payload: &str) -> Result<ImportReport, ModelError> {
        self.desktop.drop_references(decode_uri_list(payload)).await
    }

    /// Stop the listener task.
    pub async fn stop(&mut self) {
        if let Some(handle) = self.listener_handle.take() {
            handle.abort();
            let _ = handle.await;
        }
    }

    /// Check if the listener is running.
    pub fn is_listening(&self) -> bool {
        self.listener_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }
}

/// Builder for IconGrid with configuration options.
pub struct IconGridBuilder {
    desktop: DesktopHandle,
    layout: GridLayout,
    label_style: LabelStyle,
    redraw_cb: Option<RedrawCallback>,
    notice_cb: Option<NoticeCallback>,
}

impl IconGridBuilder {
    pub fn new(desktop: DesktopHandle) -> Self {
        Self {
            desktop,
            layout: GridLayout::default(),
            label_style: LabelStyle::default(),
            redraw_cb: None,
            notice_cb: None,
        }
    }

    pub fn layout(mut self, layout: GridLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn label_style(mut self, style: LabelStyle) -> Self {
        self.label_style = style;
        self
    }

    /// Set the callback for redraw requests.
    pub fn on_redraw(mut self, cb: RedrawCallback) -> Self {
        self.redraw_cb = Some(cb);
        self
    }

    /// Set the callback for user-facing notices.
    pub fn on_notice(mut self, cb: NoticeCallback) -> Self {
        self.notice_cb = Some(cb);
        self
    }

    pub fn build(self) -> IconGrid {
        let mut grid = IconGrid::new(self.desktop);
        grid.layout = self.layout;
        grid.label_style = self.label_style;

        if let Some(cb) = self.redraw_cb {
            grid.grid_mut().set_redraw_callback(cb);
        }

        if let Some(cb) = self.notice_cb {
            grid.grid_mut().set_notice_callback(cb);
        }

        grid
    }
}
