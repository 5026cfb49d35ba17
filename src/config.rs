//! Command-line configuration.

use crate::desktop::icons::DEFAULT_ICON_SIZE;
use crate::ui::style::{GridLayout, LabelStyle};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("no desktop or home directory could be determined")]
    NoDefaultDirectory,

    #[error("cannot use {path} as the desktop directory: {source}")]
    Directory {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("icon size must be between 1 and 1024, got {0}")]
    IconSize(u32),
}

#[derive(Parser, Debug, Clone)]
#[command(name = "dir-icons")]
#[command(about = "Show the files of a directory as desktop icons")]
#[command(version)]
pub struct Config {
    /// Directory to show (defaults to the desktop directory, else home)
    #[arg(long, short = 'd')]
    pub dir: Option<PathBuf>,

    /// Icon theme to look icons up in
    #[arg(long, env = "DIRICONS_ICON_THEME", default_value = "hicolor")]
    pub icon_theme: String,

    /// Icon size in pixels
    #[arg(long, default_value_t = DEFAULT_ICON_SIZE)]
    pub icon_size: u32,

    /// Label text colour, any CSS colour value
    #[arg(long, env = "DIRICONS_FONT_COLOR")]
    pub font_color: Option<String>,

    /// Scan interval used when native notifications are unavailable
    #[arg(long, default_value_t = 1000)]
    pub poll_interval_ms: u64,
}

impl Config {
    /// The directory to watch, absolute and with symlinks resolved.
    pub fn watch_dir(&self) -> Result<PathBuf, ConfigError> {
        let dir = match &self.dir {
            Some(dir) => dir.clone(),
            None => dirs::desktop_dir()
                .filter(|d| d.is_dir())
                .or_else(dirs::home_dir)
                .ok_or(ConfigError::NoDefaultDirectory)?,
        };
        dir.canonicalize()
            .map_err(|source| ConfigError::Directory { path: dir, source })
    }

    pub fn icon_size(&self) -> Result<u32, ConfigError> {
        match self.icon_size {
            1..=1024 => Ok(self.icon_size),
            other => Err(ConfigError::IconSize(other)),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn label_style(&self) -> LabelStyle {
        LabelStyle::new(self.font_color.clone())
    }

    pub fn layout(&self) -> GridLayout {
        GridLayout::with_icon_size(self.icon_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_flags() {
        let temp = tempdir().unwrap();
        let config = Config::try_parse_from([
            "dir-icons",
            "--dir",
            temp.path().to_str().unwrap(),
            "--icon-theme",
            "Adwaita",
            "--icon-size",
            "64",
            "--font-color",
            "white",
            "--poll-interval-ms",
            "250",
        ])
        .unwrap();

        assert_eq!(config.watch_dir().unwrap(), temp.path().canonicalize().unwrap());
        assert_eq!(config.icon_theme, "Adwaita");
        assert_eq!(config.icon_size().unwrap(), 64);
        assert_eq!(config.poll_interval(), Duration::from_millis(250));
        assert_eq!(config.label_style().color(), Some("white"));
        assert_eq!(config.layout().icon_size, 64);
    }

    #[test]
    fn test_defaults() {
        let config = Config::try_parse_from(["dir-icons"]).unwrap();
        assert_eq!(config.icon_size, 48);
        assert_eq!(config.poll_interval_ms, 1000);
        assert!(config.dir.is_none());
    }

    #[test]
    fn test_invalid_values() {
        let temp = tempdir().unwrap();
        let missing = temp.path().join("missing");
        let config = Config::try_parse_from([
            "dir-icons",
            "--dir",
            missing.to_str().unwrap(),
            "--icon-size",
            "0",
        ])
        .unwrap();
        assert!(matches!(config.watch_dir(), Err(ConfigError::Directory { .. })));
        assert!(matches!(config.icon_size(), Err(ConfigError::IconSize(0))));

        assert!(Config::try_parse_from(["dir-icons", "--icon-size", "big"]).is_err());
    }
}
