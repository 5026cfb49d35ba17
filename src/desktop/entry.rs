//! Entry types shared by the store, the resolver and the rendering surface.

use crate::desktop::desktop_file::LaunchDescriptor;
use crate::desktop::icons::{IconRef, RenderedIcon};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Opaque id handed out by the [`EntryStore`](super::EntryStore).
///
/// Ids increase monotonically and are never reused within a process, so a
/// stale id held by the rendering surface can only miss, never alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(pub(crate) u64);

impl EntryId {
    /// The raw numeric value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Filesystem location that identifies an entry.
///
/// Equality is path equality. No ordering is defined: display order
/// is arrival order, not path order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntryIdentity(PathBuf);

impl EntryIdentity {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl From<&Path> for EntryIdentity {
    fn from(path: &Path) -> Self {
        Self(path.to_path_buf())
    }
}

impl From<PathBuf> for EntryIdentity {
    fn from(path: PathBuf) -> Self {
        Self(path)
    }
}

/// Kind of filesystem object behind an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Regular,
    Directory,
    Symlink,
    Other,
}

/// Metadata snapshot taken when the entry was resolved. Never refreshed.
#[derive(Debug, Clone)]
pub struct RawMetadata {
    pub kind: FileKind,
    /// Size in bytes (0 for directories).
    pub size: u64,
    pub modified: Option<SystemTime>,
    /// Owning user id, where the platform has one.
    pub owner_uid: Option<u32>,
    /// Guessed content type, e.g. `text/plain` or `inode/directory`.
    pub content_type: String,
    pub is_hidden: bool,
    pub is_symlink: bool,
}

/// One icon's worth of state.
#[derive(Debug, Clone)]
pub struct Entry {
    pub(crate) id: EntryId,
    pub(crate) identity: EntryIdentity,
    pub(crate) display_name: String,
    pub(crate) icon: IconRef,
    pub(crate) rendered_icon: RenderedIcon,
    pub(crate) raw_metadata: RawMetadata,
    pub(crate) launch_descriptor: Option<LaunchDescriptor>,
}

impl Entry {
    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn identity(&self) -> &EntryIdentity {
        &self.identity
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn icon(&self) -> &IconRef {
        &self.icon
    }

    pub fn rendered_icon(&self) -> &RenderedIcon {
        &self.rendered_icon
    }

    pub fn raw_metadata(&self) -> &RawMetadata {
        &self.raw_metadata
    }

    pub fn launch_descriptor(&self) -> Option<&LaunchDescriptor> {
        self.launch_descriptor.as_ref()
    }
}
