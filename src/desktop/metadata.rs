//! Metadata resolution for directory entries.
//!
//! Embedded launcher metadata wins over raw filesystem metadata, so a
//! `calc.desktop` file shows up as "Calculator" with the calculator icon
//! instead of as a text document.

use crate::desktop::desktop_file::LaunchDescriptor;
use crate::desktop::entry::{FileKind, RawMetadata};
use crate::desktop::icons::{render_icon, IconRef, IconTheme, RenderedIcon, DEFAULT_ICON_SIZE};
use crate::desktop::keyfile::{current_locale, KeyFile};
use std::fs::{self, Metadata};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Files larger than this are never treated as launcher definitions.
const MAX_LAUNCHER_BYTES: u64 = 1024 * 1024;

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("cannot access {path}: {source}")]
    Inaccessible { path: PathBuf, source: io::Error },
}

/// Everything the store needs to build an entry.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub display_name: String,
    pub icon: IconRef,
    pub rendered_icon: RenderedIcon,
    pub launch_descriptor: Option<LaunchDescriptor>,
    pub raw_metadata: RawMetadata,
}

/// Resolves display metadata through an injected icon theme.
#[derive(Clone)]
pub struct MetadataResolver {
    theme: Arc<dyn IconTheme>,
    icon_size: u32,
    locale: Option<String>,
}

impl MetadataResolver {
    pub fn new(theme: Arc<dyn IconTheme>) -> Self {
        Self {
            theme,
            icon_size: DEFAULT_ICON_SIZE,
            locale: current_locale(),
        }
    }

    pub fn with_icon_size(mut self, size: u32) -> Self {
        self.icon_size = size.max(1);
        self
    }

    /// Override the locale used for `Name[...]` lookups.
    pub fn with_locale(mut self, locale: Option<String>) -> Self {
        self.locale = locale;
        self
    }

    pub fn icon_size(&self) -> u32 {
        self.icon_size
    }

    pub fn resolve(&self, path: &Path) -> Result<Resolved, ResolveError> {
        let (metadata, is_symlink) = query_metadata(path)?;
        let raw_metadata = raw_metadata(path, &metadata, is_symlink);

        let launch_descriptor = if metadata.is_file() && metadata.len() <= MAX_LAUNCHER_BYTES {
            self.parse_launcher(path)
        } else {
            None
        };

        let display_name = launch_descriptor
            .as_ref()
            .and_then(|d| d.name.clone())
            .unwrap_or_else(|| file_display_name(path));

        let icon = launch_descriptor
            .as_ref()
            .and_then(|d| d.icon.clone())
            .unwrap_or_else(|| icon_for_content_type(&raw_metadata.content_type));

        let rendered_icon = render_icon(self.theme.as_ref(), &icon, self.icon_size);

        Ok(Resolved {
            display_name,
            icon,
            rendered_icon,
            launch_descriptor,
            raw_metadata,
        })
    }

    fn parse_launcher(&self, path: &Path) -> Option<LaunchDescriptor> {
        let text = read_text(path)?;
        let keyfile = match KeyFile::parse(&text) {
            Ok(kf) => kf,
            Err(e) => {
                tracing::trace!("{} is not a key file: {}", path.display(), e);
                return None;
            }
        };
        match LaunchDescriptor::from_keyfile(&keyfile, path, self.locale.as_deref()) {
            Ok(descriptor) => Some(descriptor),
            Err(e) => {
                tracing::trace!("{} is not a launchable application: {}", path.display(), e);
                None
            }
        }
    }
}

/// Metadata following symlinks; a dangling link reports its own metadata.
fn query_metadata(path: &Path) -> Result<(Metadata, bool), ResolveError> {
    let link = fs::symlink_metadata(path).map_err(|source| ResolveError::Inaccessible {
        path: path.to_path_buf(),
        source,
    })?;
    if !link.file_type().is_symlink() {
        return Ok((link, false));
    }
    Ok((fs::metadata(path).unwrap_or(link), true))
}

fn read_text(path: &Path) -> Option<String> {
    let file = fs::File::open(path).ok()?;
    let mut buf = Vec::new();
    file.take(MAX_LAUNCHER_BYTES).read_to_end(&mut buf).ok()?;
    String::from_utf8(buf).ok()
}

fn raw_metadata(path: &Path, metadata: &Metadata, is_symlink: bool) -> RawMetadata {
    let kind = if metadata.is_dir() {
        FileKind::Directory
    } else if metadata.is_file() {
        FileKind::Regular
    } else if metadata.file_type().is_symlink() {
        FileKind::Symlink
    } else {
        FileKind::Other
    };

    RawMetadata {
        kind,
        size: if metadata.is_dir() { 0 } else { metadata.len() },
        modified: metadata.modified().ok(),
        owner_uid: owner_uid(metadata),
        content_type: guess_content_type(path, kind),
        is_hidden: path
            .file_name()
            .is_some_and(|n| n.to_string_lossy().starts_with('.')),
        is_symlink,
    }
}

#[cfg(unix)]
fn owner_uid(metadata: &Metadata) -> Option<u32> {
    use std::os::unix::fs::MetadataExt;
    Some(metadata.uid())
}

#[cfg(not(unix))]
fn owner_uid(_metadata: &Metadata) -> Option<u32> {
    None
}

/// The file's own name, as shown when no launcher metadata applies.
pub fn file_display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Content type guessed from the file kind and extension.
pub fn guess_content_type(path: &Path, kind: FileKind) -> String {
    match kind {
        FileKind::Directory => return "inode/directory".to_string(),
        FileKind::Symlink => return "inode/symlink".to_string(),
        FileKind::Other => return "inode/special".to_string(),
        FileKind::Regular => {}
    }

    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    let mime = match ext.as_str() {
        "txt" | "text" | "log" => "text/plain",
        "md" | "markdown" => "text/markdown",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "csv" => "text/csv",
        "rs" => "text/rust",
        "c" | "h" => "text/x-csrc",
        "py" => "text/x-python",
        "sh" => "application/x-shellscript",
        "desktop" => "application/x-desktop",
        "json" => "application/json",
        "xml" => "application/xml",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" | "tgz" => "application/gzip",
        "tar" => "application/x-tar",
        "odt" => "application/vnd.oasis.opendocument.text",
        "ods" => "application/vnd.oasis.opendocument.spreadsheet",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "mp3" => "audio/mpeg",
        "ogg" | "oga" => "audio/ogg",
        "flac" => "audio/flac",
        "wav" => "audio/x-wav",
        "mp4" => "video/mp4",
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        _ => "application/octet-stream",
    };
    mime.to_string()
}

/// Theme icon names for a content type: the specific icon, then the generic
/// icon of its media class.
pub fn icon_for_content_type(content_type: &str) -> IconRef {
    match content_type {
        "inode/directory" => {
            return IconRef::Themed(vec!["folder".to_string(), "inode-directory".to_string()])
        }
        "application/x-desktop" => {
            return IconRef::Themed(vec![
                "application-x-desktop".to_string(),
                "application-x-executable".to_string(),
            ])
        }
        _ => {}
    }

    let specific = content_type.replace('/', "-");
    let media = content_type.split('/').next().unwrap_or("application");
    let generic = match media {
        "application" => "application-x-executable".to_string(),
        "inode" => "text-x-generic".to_string(),
        other => format!("{other}-x-generic"),
    };
    IconRef::Themed(vec![specific, generic])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desktop::icons::{IconSource, MemoryIconTheme};
    use tempfile::tempdir;

    fn resolver() -> MetadataResolver {
        let theme = MemoryIconTheme::new(["text-x-generic", "accessories-calculator", "folder"]);
        MetadataResolver::new(Arc::new(theme)).with_locale(None)
    }

    #[test]
    fn test_launcher_metadata_wins() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("calc.desktop");
        fs::write(
            &path,
            "[Desktop Entry]\nType=Application\nName=Calculator\nIcon=accessories-calculator\nExec=gnome-calculator\n",
        )
        .unwrap();

        let resolved = resolver().resolve(&path).unwrap();
        assert_eq!(resolved.display_name, "Calculator");
        assert_eq!(resolved.icon, IconRef::themed("accessories-calculator"));
        assert_eq!(
            resolved.rendered_icon.source,
            IconSource::Named("accessories-calculator".into())
        );
        assert!(resolved.launch_descriptor.is_some());
    }

    #[test]
    fn test_plain_file_falls_back_to_file_metadata() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("notes.txt");
        fs::write(&path, "remember the milk\n").unwrap();

        let resolved = resolver().resolve(&path).unwrap();
        assert_eq!(resolved.display_name, "notes.txt");
        assert!(resolved.launch_descriptor.is_none());
        assert_eq!(resolved.raw_metadata.content_type, "text/plain");
        assert_eq!(resolved.raw_metadata.kind, FileKind::Regular);
        assert!(!resolved.rendered_icon.is_missing());
        assert_eq!(
            resolved.rendered_icon.source,
            IconSource::Named("text-x-generic".into())
        );
    }

    #[test]
    fn test_launcher_without_name_keeps_file_name() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("tool.desktop");
        fs::write(&path, "[Desktop Entry]\nType=Application\nExec=tool\n").unwrap();

        let resolved = resolver().resolve(&path).unwrap();
        assert_eq!(resolved.display_name, "tool.desktop");
        assert!(resolved.launch_descriptor.is_some());
        assert_eq!(resolved.icon, icon_for_content_type("application/x-desktop"));
    }

    #[test]
    fn test_link_entry_is_not_a_launcher() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("site.desktop");
        fs::write(&path, "[Desktop Entry]\nType=Link\nName=Site\nURL=https://example.com\n").unwrap();

        let resolved = resolver().resolve(&path).unwrap();
        assert_eq!(resolved.display_name, "site.desktop");
        assert!(resolved.launch_descriptor.is_none());
    }

    #[test]
    fn test_directory_uses_folder_icon() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("Projects");
        fs::create_dir(&path).unwrap();

        let resolved = resolver().resolve(&path).unwrap();
        assert_eq!(resolved.raw_metadata.kind, FileKind::Directory);
        assert_eq!(resolved.rendered_icon.source, IconSource::Named("folder".into()));
    }

    #[test]
    fn test_unknown_icon_renders_missing_glyph() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("song.flac");
        fs::write(&path, [0u8, 1, 2, 3]).unwrap();

        let resolved = resolver().resolve(&path).unwrap();
        assert!(resolved.rendered_icon.is_missing());
        assert_eq!(resolved.rendered_icon.size(), DEFAULT_ICON_SIZE);
    }

    #[test]
    fn test_vanished_file_is_an_error() {
        let temp = tempdir().unwrap();
        let err = resolver().resolve(&temp.path().join("gone.txt")).unwrap_err();
        assert!(matches!(err, ResolveError::Inaccessible { .. }));
    }

    #[test]
    fn test_localized_name() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("calc.desktop");
        fs::write(
            &path,
            "[Desktop Entry]\nType=Application\nName=Calculator\nName[de]=Rechner\nExec=calc\n",
        )
        .unwrap();

        let resolved = resolver()
            .with_locale(Some("de_DE.UTF-8".into()))
            .resolve(&path)
            .unwrap();
        assert_eq!(resolved.display_name, "Rechner");
    }
}
