//! Presentation constants and label styling for the icon grid.

use crate::desktop::icons::DEFAULT_ICON_SIZE;

/// Width of one grid cell in pixels.
pub const ITEM_WIDTH: u32 = 96;

/// Gap between the top edge of the surface and the first row.
pub const TOP_MARGIN: u32 = 20;

/// Cell geometry of the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
    pub item_width: u32,
    pub top_margin: u32,
    pub icon_size: u32,
}

impl GridLayout {
    pub fn with_icon_size(icon_size: u32) -> Self {
        Self {
            icon_size,
            ..Self::default()
        }
    }

    /// How many cells fit across a surface `width` pixels wide. Never zero.
    pub fn columns(&self, width: u32) -> u32 {
        (width / self.item_width.max(1)).max(1)
    }
}

impl Default for GridLayout {
    fn default() -> Self {
        Self {
            item_width: ITEM_WIDTH,
            top_margin: TOP_MARGIN,
            icon_size: DEFAULT_ICON_SIZE,
        }
    }
}

/// Label appearance. Only the text colour is configurable; the background is
/// always transparent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelStyle {
    color: Option<String>,
}

impl LabelStyle {
    pub fn new(color: Option<String>) -> Self {
        Self {
            color: color.map(|c| c.trim().to_string()).filter(|c| !c.is_empty()),
        }
    }

    pub fn color(&self) -> Option<&str> {
        self.color.as_deref()
    }

    /// Stylesheet applied to every label.
    pub fn css(&self) -> String {
        match &self.color {
            Some(color) => {
                format!("* {{ background-color: rgba(0, 0, 0, 0); color: {color}; }}")
            }
            None => "* { background-color: rgba(0, 0, 0, 0); }".to_string(),
        }
    }
}
