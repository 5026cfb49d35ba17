//! Directory-backed desktop: entries, their metadata, and the model that keeps
//! them in step with the filesystem.
//!
//! This module contains:
//! - `watcher`: Native/polling directory subscription
//! - `entry_store`: Ordered, identity-keyed entry collection
//! - `metadata`: Display name, icon and launcher resolution
//! - `model`: Single-writer model broadcasting updates to the surface
//! - `launch` and `transfer`: Activation and drag-and-drop

pub mod desktop_file;
pub mod entry;
pub mod entry_store;
pub mod icons;
pub mod keyfile;
pub mod launch;
pub mod metadata;
pub mod model;
pub mod transfer;
pub mod watcher;

pub use desktop_file::{DescriptorError, LaunchDescriptor};
pub use entry::{Entry, EntryId, EntryIdentity, FileKind, RawMetadata};
pub use entry_store::{EntryStore, EntryStoreStats};
pub use icons::{IconRef, IconTheme, MemoryIconTheme, RenderedIcon, XdgIconTheme};
pub use launch::{LaunchAction, LaunchBackend, LaunchError, SystemLauncher};
pub use metadata::{MetadataResolver, ResolveError};
pub use model::{
    DesktopCommand, DesktopHandle, DesktopModel, DesktopModelBuilder, DesktopUpdate, EntryRow,
    ModelError,
};
pub use transfer::{ImportReport, TransferError};
pub use watcher::{ChangeSink, DirectoryWatcher, FsChange, WatchBackend, WatcherError};
