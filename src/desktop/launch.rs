//! Launch resolution: structured application launch when the entry carries a
//! launch descriptor, the platform default handler otherwise.

use crate::desktop::desktop_file::{ExecError, LaunchDescriptor};
use crate::desktop::entry::Entry;
use std::io;
use std::path::PathBuf;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("invalid Exec line for {app_id}: {source}")]
    Exec { app_id: String, source: ExecError },

    #[error("failed to start {program}: {source}")]
    Spawn { program: String, source: io::Error },

    #[error("no terminal emulator found for {0}")]
    NoTerminal(String),

    #[error("cannot build a URI for {0}")]
    InvalidPath(PathBuf),

    #[error("default handler failed for {uri}: {source}")]
    DefaultHandler { uri: String, source: io::Error },
}

/// What the resolver decided to do with an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchAction {
    /// Run the application described by a launcher definition.
    Application(LaunchDescriptor),
    /// Hand the resource URI to the default handler for its type.
    DefaultHandler(Url),
}

/// Executes launch actions.
///
/// Implementations must return promptly: the launched process keeps running
/// on its own and is never waited on.
pub trait LaunchBackend: Send + Sync {
    fn launch_application(&self, descriptor: &LaunchDescriptor) -> Result<(), LaunchError>;

    fn open_default(&self, uri: &Url) -> Result<(), LaunchError>;
}

/// Decide how `entry` is launched.
pub fn resolve_action(entry: &Entry) -> Result<LaunchAction, LaunchError> {
    if let Some(descriptor) = entry.launch_descriptor() {
        return Ok(LaunchAction::Application(descriptor.clone()));
    }
    let path = entry.identity().path();
    Url::from_file_path(path)
        .map(LaunchAction::DefaultHandler)
        .map_err(|()| LaunchError::InvalidPath(path.to_path_buf()))
}

/// Resolve and execute. Failures are returned, never retried.
pub fn launch(entry: &Entry, backend: &dyn LaunchBackend) -> Result<LaunchAction, LaunchError> {
    let action = resolve_action(entry)?;
    match &action {
        LaunchAction::Application(descriptor) => {
            tracing::info!("launching {} ({})", descriptor.app_id, entry.display_name());
            backend.launch_application(descriptor)?;
        }
        LaunchAction::DefaultHandler(uri) => {
            tracing::info!("opening {} with the default handler", uri);
            backend.open_default(uri)?;
        }
    }
    Ok(action)
}

/// Launches real processes on the host.
#[derive(Debug, Default, Clone)]
pub struct SystemLauncher;

const KNOWN_TERMINALS: &[&str] = &[
    "x-terminal-emulator",
    "xdg-terminal-exec",
    "foot",
    "alacritty",
    "kitty",
    "xterm",
];

impl SystemLauncher {
    /// Command prefix that runs a program inside a terminal emulator.
    ///
    /// Checks `$TERMINAL` first, then known terminals on PATH.
    fn terminal_prefix(app_id: &str) -> Result<Vec<String>, LaunchError> {
        if let Some(term) = std::env::var("TERMINAL").ok().filter(|t| which::which(t).is_ok()) {
            return Ok(vec![term, "-e".to_string()]);
        }
        KNOWN_TERMINALS
            .iter()
            .find_map(|t| which::which(t).ok().map(|path| (*t, path)))
            .map(|(name, path)| {
                let path = path.to_string_lossy().into_owned();
                // xdg-terminal-exec takes the command directly.
                if name == "xdg-terminal-exec" {
                    vec![path]
                } else {
                    vec![path, "-e".to_string()]
                }
            })
            .ok_or_else(|| LaunchError::NoTerminal(app_id.to_string()))
    }
}

impl LaunchBackend for SystemLauncher {
    fn launch_application(&self, descriptor: &LaunchDescriptor) -> Result<(), LaunchError> {
        let mut argv = descriptor.command_line().map_err(|source| LaunchError::Exec {
            app_id: descriptor.app_id.clone(),
            source,
        })?;
        if descriptor.terminal {
            let mut wrapped = Self::terminal_prefix(&descriptor.app_id)?;
            wrapped.append(&mut argv);
            argv = wrapped;
        }

        let mut command = tokio::process::Command::new(&argv[0]);
        command
            .args(&argv[1..])
            .env("GIO_LAUNCHED_DESKTOP_FILE", &descriptor.source)
            .stdin(std::process::Stdio::null());
        if let Some(dir) = descriptor.working_dir.as_ref().filter(|d| d.is_dir()) {
            command.current_dir(dir);
        }

        // The child handle is dropped: the runtime reaps it when it exits.
        command.spawn().map(drop).map_err(|source| LaunchError::Spawn {
            program: argv[0].clone(),
            source,
        })
    }

    fn open_default(&self, uri: &Url) -> Result<(), LaunchError> {
        open::that_detached(uri.as_str()).map_err(|source| LaunchError::DefaultHandler {
            uri: uri.to_string(),
            source,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::desktop::entry_store::EntryStore;
    use crate::desktop::icons::MemoryIconTheme;
    use crate::desktop::metadata::MetadataResolver;
    use std::fs;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    /// Backend that records calls instead of starting processes.
    #[derive(Default)]
    pub(crate) struct RecordingLauncher {
        pub applications: Mutex<Vec<String>>,
        pub defaults: Mutex<Vec<Url>>,
        pub fail: bool,
    }

    impl LaunchBackend for RecordingLauncher {
        fn launch_application(&self, descriptor: &LaunchDescriptor) -> Result<(), LaunchError> {
            self.applications.lock().unwrap().push(descriptor.app_id.clone());
            if self.fail {
                return Err(LaunchError::Spawn {
                    program: descriptor.exec.clone(),
                    source: io::Error::new(io::ErrorKind::NotFound, "no such program"),
                });
            }
            Ok(())
        }

        fn open_default(&self, uri: &Url) -> Result<(), LaunchError> {
            self.defaults.lock().unwrap().push(uri.clone());
            Ok(())
        }
    }

    fn store() -> EntryStore {
        EntryStore::new(MetadataResolver::new(Arc::new(MemoryIconTheme::default())).with_locale(None))
    }

    #[test]
    fn test_entry_without_descriptor_goes_to_default_handler_once() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("notes.txt");
        fs::write(&path, "hello").unwrap();
        let mut store = store();
        let id = store.insert(&path).unwrap().id;

        let backend = RecordingLauncher::default();
        let action = launch(store.lookup(id).unwrap(), &backend).unwrap();

        let expected = Url::from_file_path(&path).unwrap();
        assert_eq!(action, LaunchAction::DefaultHandler(expected.clone()));
        assert_eq!(*backend.defaults.lock().unwrap(), vec![expected]);
        assert!(backend.applications.lock().unwrap().is_empty());
    }

    #[test]
    fn test_entry_with_descriptor_launches_application() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("calc.desktop");
        fs::write(&path, "[Desktop Entry]\nType=Application\nName=Calc\nExec=calc\n").unwrap();
        let mut store = store();
        let id = store.insert(&path).unwrap().id;

        let backend = RecordingLauncher::default();
        let action = launch(store.lookup(id).unwrap(), &backend).unwrap();

        assert!(matches!(action, LaunchAction::Application(_)));
        assert_eq!(*backend.applications.lock().unwrap(), vec!["calc.desktop"]);
        assert!(backend.defaults.lock().unwrap().is_empty());
    }

    #[test]
    fn test_launch_failure_is_reported_without_fallback() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("calc.desktop");
        fs::write(&path, "[Desktop Entry]\nType=Application\nExec=calc\n").unwrap();
        let mut store = store();
        let id = store.insert(&path).unwrap().id;

        let backend = RecordingLauncher {
            fail: true,
            ..Default::default()
        };
        let err = launch(store.lookup(id).unwrap(), &backend).unwrap_err();

        assert!(matches!(err, LaunchError::Spawn { .. }));
        assert_eq!(backend.applications.lock().unwrap().len(), 1);
        assert!(backend.defaults.lock().unwrap().is_empty());
    }

    #[test]
    fn test_terminal_prefix_names_a_program_on_path() {
        match SystemLauncher::terminal_prefix("top.desktop") {
            Ok(prefix) => assert!(which::which(&prefix[0]).is_ok()),
            Err(e) => assert!(matches!(e, LaunchError::NoTerminal(_))),
        }
    }

    #[tokio::test]
    async fn test_system_launcher_reports_missing_program() {
        let descriptor = LaunchDescriptor {
            app_id: "ghost.desktop".into(),
            name: None,
            icon: None,
            exec: "/nonexistent/dir-icons-test-binary".into(),
            working_dir: None,
            terminal: false,
            source: "/desk/ghost.desktop".into(),
        };
        let err = SystemLauncher.launch_application(&descriptor).unwrap_err();
        assert!(matches!(err, LaunchError::Spawn { .. }));
    }
}
