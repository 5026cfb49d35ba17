//! Icon references and the theme-lookup capability used to render them.
//!
//! Resolution never fails on icons: anything the theme cannot produce is
//! rendered as the missing-icon glyph.

use crate::desktop::keyfile::KeyFile;
use image::imageops::FilterType;
use image::{Rgba, RgbaImage};
use lru::LruCache;
use std::collections::HashSet;
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Edge length, in pixels, of every icon on the grid.
pub const DEFAULT_ICON_SIZE: u32 = 48;

const ICON_CACHE_ENTRIES: usize = 256;
const FALLBACK_THEME: &str = "hicolor";
const MISSING_ICON_NAME: &str = "image-missing";

/// A resolved, not yet rendered, icon.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IconRef {
    /// Theme icon names, most specific first.
    Themed(Vec<String>),
    /// An image file referenced by absolute path.
    File(PathBuf),
}

impl IconRef {
    pub fn themed(name: impl Into<String>) -> Self {
        Self::Themed(vec![name.into()])
    }

    /// Interpret the value of an `Icon=` key: absolute paths are files, other
    /// values are theme names with any image extension dropped.
    pub fn from_icon_key(value: &str) -> Self {
        let path = Path::new(value);
        if path.is_absolute() {
            return Self::File(path.to_path_buf());
        }
        let name = [".png", ".svg", ".xpm"]
            .iter()
            .find_map(|ext| value.strip_suffix(ext))
            .unwrap_or(value);
        Self::themed(name)
    }
}

/// Where a rendered icon's pixels came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IconSource {
    Named(String),
    File(PathBuf),
    Missing,
}

/// A square RGBA bitmap at the grid's icon size.
#[derive(Debug, Clone)]
pub struct RenderedIcon {
    pub source: IconSource,
    pub image: Arc<RgbaImage>,
}

impl RenderedIcon {
    pub fn is_missing(&self) -> bool {
        self.source == IconSource::Missing
    }

    pub fn size(&self) -> u32 {
        self.image.width()
    }
}

/// Theme-lookup capability injected into the metadata resolver.
pub trait IconTheme: Send + Sync {
    /// Render the themed icon `name` at `size`, if the theme has it.
    fn lookup(&self, name: &str, size: u32) -> Option<RenderedIcon>;

    /// Render an icon stored in an image file.
    fn load_file(&self, path: &Path, size: u32) -> Option<RenderedIcon> {
        let image = load_png(path, size)?;
        Some(RenderedIcon {
            source: IconSource::File(path.to_path_buf()),
            image: Arc::new(image),
        })
    }

    /// Glyph shown when nothing else could be rendered.
    fn missing_icon(&self, size: u32) -> RenderedIcon {
        self.lookup(MISSING_ICON_NAME, size).unwrap_or_else(|| RenderedIcon {
            source: IconSource::Missing,
            image: Arc::new(missing_glyph(size)),
        })
    }
}

/// Render `icon` through `theme`, trying each candidate name in order.
pub fn render_icon(theme: &dyn IconTheme, icon: &IconRef, size: u32) -> RenderedIcon {
    let rendered = match icon {
        IconRef::Themed(names) => names.iter().find_map(|n| theme.lookup(n, size)),
        IconRef::File(path) => theme.load_file(path, size),
    };
    rendered.unwrap_or_else(|| {
        tracing::debug!("no icon for {:?} at {}px, using missing glyph", icon, size);
        theme.missing_icon(size)
    })
}

fn load_png(path: &Path, size: u32) -> Option<RgbaImage> {
    match image::open(path) {
        Ok(img) => {
            let rgba = img.to_rgba8();
            if rgba.width() == size && rgba.height() == size {
                Some(rgba)
            } else {
                Some(image::imageops::resize(&rgba, size, size, FilterType::Triangle))
            }
        }
        Err(e) => {
            tracing::debug!("failed to decode icon {}: {}", path.display(), e);
            None
        }
    }
}

/// Magenta/black checkerboard, the customary "no texture" pattern.
fn missing_glyph(size: u32) -> RgbaImage {
    let cell = (size / 4).max(1);
    RgbaImage::from_fn(size, size, |x, y| {
        if ((x / cell) + (y / cell)) % 2 == 0 {
            Rgba([255, 0, 255, 255])
        } else {
            Rgba([0, 0, 0, 255])
        }
    })
}

/// One `[subdir]` group of an `index.theme`.
#[derive(Debug, Clone)]
struct ThemeDir {
    path: String,
    size: u32,
    min_size: u32,
    max_size: u32,
    threshold: u32,
    kind: ThemeDirKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ThemeDirKind {
    Fixed,
    Scalable,
    Threshold,
}

impl ThemeDir {
    fn matches_size(&self, size: u32) -> bool {
        match self.kind {
            ThemeDirKind::Fixed => self.size == size,
            ThemeDirKind::Scalable => (self.min_size..=self.max_size).contains(&size),
            ThemeDirKind::Threshold => {
                self.size.saturating_sub(self.threshold) <= size && size <= self.size + self.threshold
            }
        }
    }

    fn size_distance(&self, size: u32) -> u32 {
        match self.kind {
            ThemeDirKind::Fixed => self.size.abs_diff(size),
            ThemeDirKind::Scalable => {
                if size < self.min_size {
                    self.min_size - size
                } else {
                    size.saturating_sub(self.max_size)
                }
            }
            ThemeDirKind::Threshold => {
                let low = self.size.saturating_sub(self.threshold);
                let high = self.size + self.threshold;
                if size < low {
                    low - size
                } else {
                    size.saturating_sub(high)
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
struct ThemeIndex {
    name: String,
    dirs: Vec<ThemeDir>,
    inherits: Vec<String>,
}

impl ThemeIndex {
    fn load(name: &str, base_dirs: &[PathBuf]) -> Option<Self> {
        let text = base_dirs
            .iter()
            .map(|base| base.join(name).join("index.theme"))
            .find_map(|p| fs::read_to_string(p).ok())?;
        let kf = match KeyFile::parse(&text) {
            Ok(kf) => kf,
            Err(e) => {
                tracing::warn!("ignoring malformed index.theme for {}: {}", name, e);
                return None;
            }
        };

        let list = |key: &str| -> Vec<String> {
            kf.get("Icon Theme", key)
                .unwrap_or_default()
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        };
        let num = |group: &str, key: &str| -> Option<u32> {
            kf.get(group, key).and_then(|v| v.trim().parse().ok())
        };

        let dirs = list("Directories")
            .into_iter()
            .filter_map(|dir| {
                let size = num(&dir, "Size")?;
                let kind = match kf.get(&dir, "Type").map(str::trim) {
                    Some("Fixed") => ThemeDirKind::Fixed,
                    Some("Scalable") => ThemeDirKind::Scalable,
                    _ => ThemeDirKind::Threshold,
                };
                Some(ThemeDir {
                    min_size: num(&dir, "MinSize").unwrap_or(size),
                    max_size: num(&dir, "MaxSize").unwrap_or(size),
                    threshold: num(&dir, "Threshold").unwrap_or(2),
                    path: dir,
                    size,
                    kind,
                })
            })
            .collect();

        Some(Self {
            name: name.to_string(),
            dirs,
            inherits: list("Inherits"),
        })
    }

    fn find(&self, icon: &str, size: u32, base_dirs: &[PathBuf]) -> Option<PathBuf> {
        let file_name = format!("{icon}.png");
        let candidate = |dir: &ThemeDir| {
            base_dirs
                .iter()
                .map(|base| base.join(&self.name).join(&dir.path).join(&file_name))
                .find(|p| p.is_file())
        };

        if let Some(found) = self
            .dirs
            .iter()
            .filter(|d| d.matches_size(size))
            .find_map(&candidate)
        {
            return Some(found);
        }

        let mut by_distance: Vec<&ThemeDir> = self.dirs.iter().collect();
        by_distance.sort_by_key(|d| d.size_distance(size));
        by_distance.into_iter().find_map(&candidate)
    }
}

/// Icon theme backed by the XDG icon directories on disk.
///
/// Only PNG images are rendered; names that exist solely as SVG fall through
/// to the next candidate and eventually the missing glyph.
pub struct XdgIconTheme {
    chain: Vec<ThemeIndex>,
    base_dirs: Vec<PathBuf>,
    pixmap_dirs: Vec<PathBuf>,
    cache: Mutex<LruCache<(String, u32), Option<RenderedIcon>>>,
}

impl XdgIconTheme {
    /// Load `theme` and its inheritance chain from the standard locations.
    pub fn new(theme: &str) -> Self {
        Self::with_dirs(theme, default_icon_dirs(), default_pixmap_dirs())
    }

    /// Load `theme` from explicit base directories (each containing theme
    /// subdirectories) and flat pixmap directories.
    pub fn with_dirs(theme: &str, base_dirs: Vec<PathBuf>, pixmap_dirs: Vec<PathBuf>) -> Self {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut pending = vec![theme.to_string()];

        while let Some(name) = pending.pop() {
            if !seen.insert(name.clone()) {
                continue;
            }
            if let Some(index) = ThemeIndex::load(&name, &base_dirs) {
                // Parents are searched after the child, in declaration order.
                pending.extend(index.inherits.iter().rev().cloned());
                chain.push(index);
            } else {
                tracing::debug!("icon theme {} not found", name);
            }
        }
        if !seen.contains(FALLBACK_THEME) {
            if let Some(index) = ThemeIndex::load(FALLBACK_THEME, &base_dirs) {
                chain.push(index);
            }
        }

        tracing::debug!(
            "icon theme chain: {:?}",
            chain.iter().map(|t| t.name.as_str()).collect::<Vec<_>>()
        );

        Self {
            chain,
            base_dirs,
            pixmap_dirs,
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(ICON_CACHE_ENTRIES).unwrap_or(NonZeroUsize::MIN),
            )),
        }
    }

    fn find_path(&self, name: &str, size: u32) -> Option<PathBuf> {
        self.chain
            .iter()
            .find_map(|theme| theme.find(name, size, &self.base_dirs))
            .or_else(|| {
                self.pixmap_dirs
                    .iter()
                    .map(|dir| dir.join(format!("{name}.png")))
                    .find(|p| p.is_file())
            })
    }
}

impl IconTheme for XdgIconTheme {
    fn lookup(&self, name: &str, size: u32) -> Option<RenderedIcon> {
        let key = (name.to_string(), size);
        if let Ok(mut cache) = self.cache.lock() {
            if let Some(hit) = cache.get(&key) {
                return hit.clone();
            }
        }

        let rendered = self.find_path(name, size).and_then(|path| {
            load_png(&path, size).map(|image| RenderedIcon {
                source: IconSource::Named(name.to_string()),
                image: Arc::new(image),
            })
        });

        if let Ok(mut cache) = self.cache.lock() {
            cache.put(key, rendered.clone());
        }
        rendered
    }
}

/// Theme that knows a fixed set of names and renders each as a flat tile.
///
/// Used where no real icon theme is available, such as headless runs.
#[derive(Debug, Default, Clone)]
pub struct MemoryIconTheme {
    names: HashSet<String>,
}

impl MemoryIconTheme {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }
}

impl IconTheme for MemoryIconTheme {
    fn lookup(&self, name: &str, size: u32) -> Option<RenderedIcon> {
        self.names.contains(name).then(|| RenderedIcon {
            source: IconSource::Named(name.to_string()),
            image: Arc::new(RgbaImage::from_pixel(size, size, Rgba([128, 128, 128, 255]))),
        })
    }
}

fn data_home() -> Option<PathBuf> {
    std::env::var_os("XDG_DATA_HOME")
        .map(PathBuf::from)
        .filter(|p| p.is_absolute())
        .or_else(dirs::data_dir)
}

fn data_dirs() -> Vec<PathBuf> {
    let raw = std::env::var("XDG_DATA_DIRS")
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "/usr/local/share:/usr/share".to_string());
    raw.split(':')
        .map(PathBuf::from)
        .filter(|p| p.is_absolute())
        .collect()
}

/// `$HOME/.icons`, `$XDG_DATA_HOME/icons`, then `$XDG_DATA_DIRS/*/icons`.
pub fn default_icon_dirs() -> Vec<PathBuf> {
    let mut dirs_out = Vec::new();
    if let Some(home) = dirs::home_dir() {
        dirs_out.push(home.join(".icons"));
    }
    if let Some(data) = data_home() {
        dirs_out.push(data.join("icons"));
    }
    dirs_out.extend(data_dirs().into_iter().map(|d| d.join("icons")));
    dirs_out
}

pub fn default_pixmap_dirs() -> Vec<PathBuf> {
    data_dirs().into_iter().map(|d| d.join("pixmaps")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_png(path: &Path, px: u32) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        RgbaImage::from_pixel(px, px, Rgba([10, 20, 30, 255]))
            .save(path)
            .unwrap();
    }

    fn write_theme(base: &Path, name: &str, index: &str) {
        let dir = base.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("index.theme"), index).unwrap();
    }

    #[test]
    fn test_icon_key_interpretation() {
        assert_eq!(IconRef::from_icon_key("firefox"), IconRef::themed("firefox"));
        assert_eq!(IconRef::from_icon_key("firefox.png"), IconRef::themed("firefox"));
        assert_eq!(
            IconRef::from_icon_key("/opt/app/icon.png"),
            IconRef::File(PathBuf::from("/opt/app/icon.png"))
        );
    }

    #[test]
    fn test_render_falls_back_through_names_then_missing() {
        let theme = MemoryIconTheme::new(["text-x-generic"]);
        let icon = IconRef::Themed(vec!["text-plain".into(), "text-x-generic".into()]);
        let rendered = render_icon(&theme, &icon, 48);
        assert_eq!(rendered.source, IconSource::Named("text-x-generic".into()));
        assert_eq!(rendered.size(), 48);

        let missing = render_icon(&theme, &IconRef::themed("nope"), 48);
        assert!(missing.is_missing());
        assert_eq!(missing.size(), 48);
    }

    #[test]
    fn test_xdg_theme_exact_size_and_inheritance() {
        let temp = tempdir().unwrap();
        let base = temp.path().join("icons");
        write_theme(
            &base,
            "child",
            "[Icon Theme]\nName=Child\nInherits=hicolor\nDirectories=48x48/apps\n\n[48x48/apps]\nSize=48\nType=Fixed\n",
        );
        write_theme(
            &base,
            "hicolor",
            "[Icon Theme]\nName=Hicolor\nDirectories=32x32/mimetypes,64x64/mimetypes\n\n[32x32/mimetypes]\nSize=32\nType=Fixed\n\n[64x64/mimetypes]\nSize=64\nType=Fixed\n",
        );
        write_png(&base.join("child/48x48/apps/calc.png"), 48);
        write_png(&base.join("hicolor/64x64/mimetypes/text-plain.png"), 64);

        let theme = XdgIconTheme::with_dirs("child", vec![base], vec![]);

        let calc = theme.lookup("calc", 48).unwrap();
        assert_eq!(calc.source, IconSource::Named("calc".into()));

        // Found in the inherited theme at the closest size and scaled down.
        let text = theme.lookup("text-plain", 48).unwrap();
        assert_eq!(text.size(), 48);

        assert!(theme.lookup("absent", 48).is_none());
    }

    #[test]
    fn test_xdg_theme_pixmap_fallback() {
        let temp = tempdir().unwrap();
        let pixmaps = temp.path().join("pixmaps");
        write_png(&pixmaps.join("legacy.png"), 16);

        let theme = XdgIconTheme::with_dirs("none", vec![temp.path().join("icons")], vec![pixmaps]);
        let icon = theme.lookup("legacy", 48).unwrap();
        assert_eq!(icon.size(), 48);
    }

    #[test]
    fn test_load_file_icon() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("app.png");
        write_png(&path, 24);

        let theme = MemoryIconTheme::default();
        let rendered = render_icon(&theme, &IconRef::File(path.clone()), 48);
        assert_eq!(rendered.source, IconSource::File(path));
        assert_eq!(rendered.size(), 48);
    }
}
