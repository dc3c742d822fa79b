use serde::{Deserialize, Serialize};

/// Zoom expression used by the tile-path overview view.
pub const DEFAULT_ZOOM_LEVEL_EXPR: &str = "CDB_ZoomFromScale(!scale_denominator!)";
/// Histogram bins when neither the request nor the definition sets them.
pub const DEFAULT_BINS: u32 = 10;

/// Engine settings, built once at startup and held by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataviewSettings {
    pub zoom_level_expr: String,
    /// Ranked categories returned before the `Other` bucket
    pub default_categories: u32,
    pub max_bins: u32,
    pub search_limit: u32,
    /// Viewport size in pixels used to derive a scale from a bbox
    pub tile_size: u32,
}

impl Default for DataviewSettings {
    fn default() -> Self {
        Self {
            zoom_level_expr: DEFAULT_ZOOM_LEVEL_EXPR.to_string(),
            default_categories: 6,
            max_bins: 10_000,
            search_limit: 10,
            tile_size: 256,
        }
    }
}
