//! Drag-and-drop marshalling over `text/uri-list`.
//!
//! Export turns a selection into file URIs. Import copies each dropped file
//! into the watched directory; the copies reach the store through the
//! directory watcher like any other new file.

use crate::desktop::entry::EntryId;
use crate::desktop::entry_store::EntryStore;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("`{0}` is not a valid URI")]
    InvalidUri(String),

    #[error("{0} is not a local file")]
    NotLocal(Url),

    #[error("cannot read {path}: {source}")]
    SourceUnavailable { path: PathBuf, source: io::Error },

    #[error("{0} is a directory; only files can be copied")]
    SourceIsDirectory(PathBuf),

    #[error("{0} has no file name")]
    NoFileName(PathBuf),

    #[error("{0} already exists")]
    AlreadyExists(PathBuf),

    #[error("copy was interrupted before this item was reported")]
    Interrupted,

    #[error("failed to copy {from} to {to}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },
}

/// The result of attempting one dropped reference.
#[derive(Debug)]
pub struct ImportOutcome {
    /// The reference as it appeared in the payload.
    pub reference: String,
    pub result: Result<PathBuf, TransferError>,
}

/// Per-item results of one drop, in payload order.
#[derive(Debug, Default)]
pub struct ImportReport {
    pub outcomes: Vec<ImportOutcome>,
}

impl ImportReport {
    /// A report for a batch whose copy task stopped without reporting.
    pub fn interrupted(references: &[String]) -> Self {
        Self {
            outcomes: references
                .iter()
                .map(|reference| ImportOutcome {
                    reference: reference.clone(),
                    result: Err(TransferError::Interrupted),
                })
                .collect(),
        }
    }

    pub fn copied(&self) -> impl Iterator<Item = &Path> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok().map(PathBuf::as_path))
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &TransferError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.reference.as_str(), e)))
    }

    pub fn success_count(&self) -> usize {
        self.copied().count()
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }

    /// True when every item was copied.
    pub fn is_complete_success(&self) -> bool {
        self.failure_count() == 0
    }
}

/// File URIs for the selected entries, in selection order.
///
/// Ids that are no longer in the store are skipped.
pub fn export_uris(store: &EntryStore, selection: &[EntryId]) -> Vec<Url> {
    selection
        .iter()
        .filter_map(|id| store.lookup(*id))
        .filter_map(|entry| {
            let path = entry.identity().path();
            Url::from_file_path(path)
                .map_err(|()| tracing::warn!("cannot export {}: not an absolute path", path.display()))
                .ok()
        })
        .collect()
}

/// Serialize URIs as a `text/uri-list` payload.
pub fn encode_uri_list(uris: &[Url]) -> String {
    uris.iter().map(|u| format!("{u}\r\n")).collect()
}

/// References from a `text/uri-list` payload; comments and blank lines are
/// skipped. Only the line terminator is stripped: entries are returned
/// verbatim and validated during import.
pub fn decode_uri_list(payload: &str) -> Vec<String> {
    payload
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Copy every referenced file into `destination`.
///
/// Each item succeeds or fails on its own; a failure neither stops the
/// remaining items nor undoes earlier copies. Blocking: call it off the
/// event thread.
pub fn import_references(references: &[String], destination: &Path) -> ImportReport {
    let outcomes = references
        .iter()
        .map(|reference| {
            let result = import_one(reference, destination);
            match &result {
                Ok(target) => tracing::info!("copied {} to {}", reference, target.display()),
                Err(e) => tracing::warn!("drop of {} failed: {}", reference, e),
            }
            ImportOutcome {
                reference: reference.clone(),
                result,
            }
        })
        .collect();
    ImportReport { outcomes }
}

fn import_one(reference: &str, destination: &Path) -> Result<PathBuf, TransferError> {
    let source = source_path(reference)?;

    let metadata = fs::metadata(&source).map_err(|e| TransferError::SourceUnavailable {
        path: source.clone(),
        source: e,
    })?;
    if metadata.is_dir() {
        return Err(TransferError::SourceIsDirectory(source));
    }

    let base_name = source
        .file_name()
        .ok_or_else(|| TransferError::NoFileName(source.clone()))?;
    let target = destination.join(base_name);

    copy_no_clobber(&source, &target)?;
    Ok(target)
}

fn source_path(reference: &str) -> Result<PathBuf, TransferError> {
    // Some drag sources hand over bare absolute paths instead of URIs.
    if reference.starts_with('/') {
        return Ok(PathBuf::from(reference));
    }
    let url = Url::parse(reference).map_err(|_| TransferError::InvalidUri(reference.to_string()))?;
    if url.scheme() != "file" {
        return Err(TransferError::NotLocal(url));
    }
    url.to_file_path().map_err(|()| TransferError::NotLocal(url))
}

/// Copy `from` to `to`, failing if `to` exists. A partially written target is
/// removed again.
fn copy_no_clobber(from: &Path, to: &Path) -> Result<(), TransferError> {
    let copy_err = |source: io::Error| TransferError::Copy {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };

    let mut reader = fs::File::open(from).map_err(|e| TransferError::SourceUnavailable {
        path: from.to_path_buf(),
        source: e,
    })?;
    let mut writer = match OpenOptions::new().write(true).create_new(true).open(to) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            return Err(TransferError::AlreadyExists(to.to_path_buf()))
        }
        Err(e) => return Err(copy_err(e)),
    };

    if let Err(e) = io::copy(&mut reader, &mut writer) {
        drop(writer);
        let _ = fs::remove_file(to);
        return Err(copy_err(e));
    }

    if let Ok(metadata) = reader.metadata() {
        let _ = writer.set_permissions(metadata.permissions());
    }
    Ok(())
}
