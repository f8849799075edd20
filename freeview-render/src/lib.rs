pub mod heatmap;
pub mod layout;

pub use heatmap::{HeatmapError, HeatmapRenderer, HeatmapStyle};
pub use layout::{LayoutMode, LayoutResult, LayoutTracker, place};
