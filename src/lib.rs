//! Directory-backed desktop icons.
//!
//! Shows the children of one directory as a grid of icons and keeps the grid
//! in step with the filesystem while it runs.
//!
//! ## Flow
//!
//! ```text
//! Filesystem change
//!        ↓
//! DirectoryWatcher (native, or polling fallback)
//!        ↓
//! DesktopCommand::Fs on the model's channel
//!        ↓
//! DesktopModel → EntryStore.insert / remove_by_identity [single writer]
//!        ↓
//! broadcast::send(DesktopUpdate)
//!        ↓
//! IconGrid applies the row change
//! ```
//!
//! Activation and drag-and-drop travel the same channel in the other
//! direction: the grid sends commands, the model answers.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use dir_icons::prelude::*;
//! use std::{path::PathBuf, sync::Arc, time::Duration};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let dir = PathBuf::from("/home/me/Desktop");
//!     let resolver = MetadataResolver::new(Arc::new(XdgIconTheme::new("hicolor")));
//!     let (model, desktop, updates) =
//!         DesktopModelBuilder::new(dir.clone(), EntryStore::new(resolver)).build();
//!
//!     // Subscribe before the initial scan so nothing is missed.
//!     let _watcher = DirectoryWatcher::watch(&dir, Duration::from_secs(1), desktop.change_sink())?;
//!
//!     let mut grid = IconGridBuilder::new(desktop)
//!         .on_redraw(Box::new(|| println!("Redraw requested!")))
//!         .build();
//!     grid.setup_update_listener(updates);
//!
//!     model.run().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Structure
//!
//! - [`desktop`]: Entries, metadata, watching and the model
//! - [`ui`]: Headless icon grid
//! - [`config`]: Command-line configuration

#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod desktop;
pub mod ui;

/// Re-exports for convenience.
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::desktop::{
        DesktopHandle, DesktopModel, DesktopModelBuilder, DesktopUpdate, DirectoryWatcher, Entry,
        EntryId, EntryRow, EntryStore, FsChange, IconTheme, LaunchBackend, MetadataResolver,
        SystemLauncher, WatcherError, XdgIconTheme,
    };
    pub use crate::ui::{IconGrid, IconGridBuilder, IconGridHandle, LabelStyle};
}
