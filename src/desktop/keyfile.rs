//! Parser for the freedesktop key-file format (`[Group]` headers followed by
//! `Key=Value` lines).
//!
//! Only what launcher definitions need is supported: groups, plain and
//! localized keys (`Name[de_DE]`), comments, and the standard value escapes.
//! Anything that is not a comment, blank line, header or assignment makes the
//! whole file invalid, which is how ordinary documents on the desktop are told
//! apart from launcher definitions.

use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum KeyFileError {
    #[error("line {line}: key/value pair outside of any group")]
    KeyOutsideGroup { line: usize },

    #[error("line {line}: malformed group header")]
    MalformedGroup { line: usize },

    #[error("line {line}: not a key/value pair")]
    MalformedLine { line: usize },

    #[error("line {line}: invalid key name `{key}`")]
    InvalidKey { line: usize, key: String },
}

#[derive(Debug, Default, Clone)]
struct Group {
    /// Keys are stored with their locale suffix, e.g. `Name[fr]`.
    values: HashMap<String, String>,
}

/// A parsed key file. Later duplicates of a key win; repeated groups merge.
#[derive(Debug, Default, Clone)]
pub struct KeyFile {
    groups: HashMap<String, Group>,
}

impl KeyFile {
    pub fn parse(text: &str) -> Result<Self, KeyFileError> {
        let mut groups: HashMap<String, Group> = HashMap::new();
        let mut current: Option<String> = None;

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim_start();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(rest) = line.strip_prefix('[') {
                let name = rest
                    .trim_end()
                    .strip_suffix(']')
                    .filter(|n| !n.is_empty() && !n.contains(['[', ']']))
                    .ok_or(KeyFileError::MalformedGroup { line: line_no })?;
                groups.entry(name.to_string()).or_default();
                current = Some(name.to_string());
                continue;
            }

            let (key, value) = line
                .split_once('=')
                .ok_or(KeyFileError::MalformedLine { line: line_no })?;
            let key = key.trim_end();
            if !is_valid_key(key) {
                return Err(KeyFileError::InvalidKey {
                    line: line_no,
                    key: key.to_string(),
                });
            }

            let group = current
                .as_ref()
                .and_then(|g| groups.get_mut(g))
                .ok_or(KeyFileError::KeyOutsideGroup { line: line_no })?;
            group
                .values
                .insert(key.to_string(), unescape(value.trim_start()));
        }

        Ok(Self { groups })
    }

    pub fn has_group(&self, group: &str) -> bool {
        self.groups.contains_key(group)
    }

    /// Raw (unlocalized) string value.
    pub fn get(&self, group: &str, key: &str) -> Option<&str> {
        self.groups
            .get(group)
            .and_then(|g| g.values.get(key))
            .map(String::as_str)
    }

    /// Boolean value; only `true`/`false` are accepted, like GLib.
    pub fn get_bool(&self, group: &str, key: &str) -> Option<bool> {
        match self.get(group, key)?.trim() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        }
    }

    /// Localized value for `locale` (e.g. `de_DE.UTF-8@euro`), falling back
    /// through the standard match order to the unlocalized key.
    pub fn get_localized(&self, group: &str, key: &str, locale: Option<&str>) -> Option<&str> {
        if let Some(locale) = locale {
            for variant in locale_variants(locale) {
                if let Some(value) = self.get(group, &format!("{key}[{variant}]")) {
                    return Some(value);
                }
            }
        }
        self.get(group, key)
    }
}

fn is_valid_key(key: &str) -> bool {
    let (base, locale) = match key.split_once('[') {
        Some((base, rest)) => match rest.strip_suffix(']') {
            Some(locale) if !locale.is_empty() => (base, Some(locale)),
            _ => return false,
        },
        None => (key, None),
    };
    !base.is_empty()
        && base
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' || c == '/')
        && locale.map_or(true, |l| !l.contains(['[', ']', '=']))
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('s') => out.push(' '),
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Candidate locale suffixes in match order:
/// `lang_COUNTRY@MODIFIER`, `lang_COUNTRY`, `lang@MODIFIER`, `lang`.
fn locale_variants(locale: &str) -> Vec<String> {
    // The encoding part never takes part in matching.
    let (head, modifier) = match locale.split_once('@') {
        Some((head, m)) => (head, Some(m)),
        None => (locale, None),
    };
    let head = head.split('.').next().unwrap_or(head);
    let (lang, country) = match head.split_once('_') {
        Some((l, c)) => (l, Some(c)),
        None => (head, None),
    };
    if lang.is_empty() || lang == "C" || lang == "POSIX" {
        return Vec::new();
    }

    let mut variants = Vec::with_capacity(4);
    if let (Some(c), Some(m)) = (country, modifier) {
        variants.push(format!("{lang}_{c}@{m}"));
    }
    if let Some(c) = country {
        variants.push(format!("{lang}_{c}"));
    }
    if let Some(m) = modifier {
        variants.push(format!("{lang}@{m}"));
    }
    variants.push(lang.to_string());
    variants
}

/// Locale used for `Name[...]` lookups, read from the usual environment
/// variables in priority order.
pub fn current_locale() -> Option<String> {
    ["LC_ALL", "LC_MESSAGES", "LANG"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# a comment
[Desktop Entry]
Type=Application
Name=Calculator
Name[de]=Rechner
Name[de_AT]=Rechenmaschine
Exec = gnome-calculator %U
Comment=Line\\sone\\nline two
Terminal=false

[Desktop Action new]
Name=New window
";

    #[test]
    fn test_parse_groups_and_values() {
        let kf = KeyFile::parse(SAMPLE).unwrap();
        assert!(kf.has_group("Desktop Entry"));
        assert!(kf.has_group("Desktop Action new"));
        assert_eq!(kf.get("Desktop Entry", "Name"), Some("Calculator"));
        assert_eq!(kf.get("Desktop Entry", "Exec"), Some("gnome-calculator %U"));
        assert_eq!(kf.get("Desktop Action new", "Name"), Some("New window"));
        assert_eq!(kf.get_bool("Desktop Entry", "Terminal"), Some(false));
    }

    #[test]
    fn test_unescape_values() {
        let kf = KeyFile::parse(SAMPLE).unwrap();
        assert_eq!(
            kf.get("Desktop Entry", "Comment"),
            Some("Line one\nline two")
        );
    }

    #[test]
    fn test_localized_lookup_order() {
        let kf = KeyFile::parse(SAMPLE).unwrap();
        let get = |loc| kf.get_localized("Desktop Entry", "Name", Some(loc));
        assert_eq!(get("de_AT.UTF-8"), Some("Rechenmaschine"));
        assert_eq!(get("de_DE.UTF-8"), Some("Rechner"));
        assert_eq!(get("fr_FR"), Some("Calculator"));
        assert_eq!(get("C"), Some("Calculator"));
    }

    #[test]
    fn test_plain_text_is_rejected() {
        let err = KeyFile::parse("just some notes\nabout things\n").unwrap_err();
        assert_eq!(err, KeyFileError::MalformedLine { line: 1 });
    }

    #[test]
    fn test_key_before_group_is_rejected() {
        let err = KeyFile::parse("Name=foo\n[Desktop Entry]\n").unwrap_err();
        assert_eq!(err, KeyFileError::KeyOutsideGroup { line: 1 });
    }

    #[test]
    fn test_invalid_key_is_rejected() {
        assert!(matches!(
            KeyFile::parse("[Desktop Entry]\nfoo bar=baz\n"),
            Err(KeyFileError::InvalidKey { line: 2, .. })
        ));
    }
}
