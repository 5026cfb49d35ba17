//! Rendering-surface components driven by the desktop model.

pub mod icon_grid;
pub mod style;

pub use icon_grid::{
    GridState, IconGrid, IconGridBuilder, IconGridHandle, NoticeCallback, RedrawCallback,
};
pub use style::{GridLayout, LabelStyle};
