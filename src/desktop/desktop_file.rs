//! Launcher-definition (`.desktop`) files: validation into a
//! [`LaunchDescriptor`] and expansion of the `Exec` command line.

use crate::desktop::icons::IconRef;
use crate::desktop::keyfile::KeyFile;
use std::path::{Path, PathBuf};
use thiserror::Error;

const DESKTOP_ENTRY_GROUP: &str = "Desktop Entry";

/// Why a key file is not a launchable application.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("missing [Desktop Entry] group")]
    MissingGroup,

    #[error("entry type is `{0}`, not Application")]
    NotApplication(String),

    #[error("entry has no Exec key")]
    MissingExec,

    #[error("entry is hidden")]
    Hidden,

    #[error("TryExec program `{0}` not found")]
    TryExecMissing(String),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ExecError {
    #[error("unterminated quote in Exec line")]
    UnterminatedQuote,

    #[error("Exec line expands to an empty command")]
    Empty,
}

/// Structured launcher metadata extracted from a valid application entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchDescriptor {
    /// Desktop file id, the file name of the definition (`calc.desktop`).
    pub app_id: String,
    pub name: Option<String>,
    pub icon: Option<IconRef>,
    /// Unexpanded `Exec` value.
    pub exec: String,
    /// Working directory from `Path=`.
    pub working_dir: Option<PathBuf>,
    pub terminal: bool,
    /// Location of the definition file, substituted for `%k`.
    pub source: PathBuf,
}

impl LaunchDescriptor {
    /// Validate `keyfile` as an application entry loaded from `source`.
    pub fn from_keyfile(
        keyfile: &KeyFile,
        source: &Path,
        locale: Option<&str>,
    ) -> Result<Self, DescriptorError> {
        let g = DESKTOP_ENTRY_GROUP;
        if !keyfile.has_group(g) {
            return Err(DescriptorError::MissingGroup);
        }

        let kind = keyfile.get(g, "Type").unwrap_or_default();
        if kind != "Application" {
            return Err(DescriptorError::NotApplication(kind.to_string()));
        }

        if keyfile.get_bool(g, "Hidden") == Some(true) {
            return Err(DescriptorError::Hidden);
        }

        if let Some(try_exec) = keyfile.get(g, "TryExec").map(str::trim) {
            if !try_exec.is_empty() && which::which(try_exec).is_err() {
                return Err(DescriptorError::TryExecMissing(try_exec.to_string()));
            }
        }

        let exec = keyfile
            .get(g, "Exec")
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or(DescriptorError::MissingExec)?
            .to_string();

        let name = keyfile
            .get_localized(g, "Name", locale)
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);

        let icon = keyfile
            .get_localized(g, "Icon", locale)
            .map(str::trim)
            .filter(|i| !i.is_empty())
            .map(IconRef::from_icon_key);

        let working_dir = keyfile
            .get(g, "Path")
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);

        let app_id = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Self {
            app_id,
            name,
            icon,
            exec,
            working_dir,
            terminal: keyfile.get_bool(g, "Terminal").unwrap_or(false),
            source: source.to_path_buf(),
        })
    }

    /// Expand the `Exec` line into an argv for a launch without files.
    pub fn command_line(&self) -> Result<Vec<String>, ExecError> {
        let tokens = split_exec(&self.exec)?;
        let mut argv = Vec::with_capacity(tokens.len());

        for token in tokens {
            match token.as_str() {
                // A lone file/url code expands to nothing when launched bare.
                "%f" | "%F" | "%u" | "%U" => {}
                "%i" => {
                    if let Some(IconRef::Themed(names)) = &self.icon {
                        if let Some(first) = names.first() {
                            argv.push("--icon".to_string());
                            argv.push(first.clone());
                        }
                    } else if let Some(IconRef::File(path)) = &self.icon {
                        argv.push("--icon".to_string());
                        argv.push(path.to_string_lossy().into_owned());
                    }
                }
                _ => argv.push(self.expand_field_codes(&token)),
            }
        }

        if argv.is_empty() || argv[0].is_empty() {
            return Err(ExecError::Empty);
        }
        Ok(argv)
    }

    fn expand_field_codes(&self, token: &str) -> String {
        let mut out = String::with_capacity(token.len());
        let mut chars = token.chars();
        while let Some(c) = chars.next() {
            if c != '%' {
                out.push(c);
                continue;
            }
            match chars.next() {
                Some('%') => out.push('%'),
                Some('c') => out.push_str(self.name.as_deref().unwrap_or_default()),
                Some('k') => out.push_str(&self.source.to_string_lossy()),
                // %f %F %u %U %i inside a word, plus deprecated codes, vanish.
                Some(_) | None => {}
            }
        }
        out
    }
}

/// Split an `Exec` value into words following the desktop entry quoting rules.
///
/// Words are separated by spaces. Inside double quotes, `\"`, `` \` ``, `\$`
/// and `\\` are escapes; quotes group spaces into one word.
pub fn split_exec(exec: &str) -> Result<Vec<String>, ExecError> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut chars = exec.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.peek() {
                            Some(&next @ ('"' | '`' | '$' | '\\')) => {
                                current.push(next);
                                chars.next();
                            }
                            _ => current.push('\\'),
                        },
                        Some(other) => current.push(other),
                        None => return Err(ExecError::UnterminatedQuote),
                    }
                }
            }
            ' ' | '\t' => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            other => {
                in_word = true;
                current.push(other);
            }
        }
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}
