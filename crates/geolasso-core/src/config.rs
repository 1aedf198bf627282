//! Selection tool configuration.

use crate::error::{SelectionError, SelectionResult};
use crate::input::ModifierBindings;
use crate::scheduler::DEFAULT_CHUNK_SIZE;
use crate::viewport::MAX_LATITUDE;
use geo::{Coord, Rect};
use peniko::Color;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Serializable color representation (RGBA8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializableColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl SerializableColor {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

impl From<Color> for SerializableColor {
    fn from(color: Color) -> Self {
        let rgba = color.to_rgba8();
        Self {
            r: rgba.r,
            g: rgba.g,
            b: rgba.b,
            a: rgba.a,
        }
    }
}

impl From<SerializableColor> for Color {
    fn from(color: SerializableColor) -> Self {
        Color::from_rgba8(color.r, color.g, color.b, color.a)
    }
}

/// Tunables for drawing, batching and visual emphasis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Features tested per animation frame.
    pub chunk_size: usize,
    /// How long the finished stroke stays visible.
    pub preview_linger_ms: u64,
    /// Minimum interval between on-screen mask refreshes while the map moves.
    pub mask_refresh_ms: u64,
    /// Outer ring of the inverse mask: `[min_lon, min_lat, max_lon, max_lat]`.
    pub mask_extent: [f64; 4],
    pub modifier_bindings: ModifierBindings,
    /// Match lines lying entirely inside a region without crossing it.
    pub lines_match_when_contained: bool,
    pub mask_color: SerializableColor,
    pub highlight_color: SerializableColor,
    pub preview_color: SerializableColor,
    /// Outline stroke width in screen pixels.
    pub outline_width: f64,
    /// Radius of the highlight marker drawn around selected points, in pixels.
    pub point_marker_radius: f64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            preview_linger_ms: 400,
            mask_refresh_ms: 16,
            mask_extent: [-360.0, -MAX_LATITUDE, 360.0, MAX_LATITUDE],
            modifier_bindings: ModifierBindings::default(),
            lines_match_when_contained: false,
            mask_color: SerializableColor::new(0, 0, 0, 102),
            highlight_color: SerializableColor::new(255, 196, 0, 255),
            preview_color: SerializableColor::new(30, 136, 229, 255),
            outline_width: 2.0,
            point_marker_radius: 5.0,
        }
    }
}

impl SelectionConfig {
    /// Parse and validate a JSON configuration. Missing fields take defaults.
    pub fn from_json(json: &str) -> SelectionResult<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| SelectionError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file.
    pub fn load(path: &Path) -> SelectionResult<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| SelectionError::Io(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> SelectionResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| SelectionError::Config(e.to_string()))
    }

    pub fn validate(&self) -> SelectionResult<()> {
        if self.chunk_size == 0 {
            return Err(SelectionError::Config("chunk_size must be at least 1".to_string()));
        }
        let [x0, y0, x1, y1] = self.mask_extent;
        if !(x0 < x1 && y0 < y1) || self.mask_extent.iter().any(|v| !v.is_finite()) {
            return Err(SelectionError::Config(format!("invalid mask_extent {:?}", self.mask_extent)));
        }
        if !(self.outline_width >= 0.0 && self.point_marker_radius >= 0.0) {
            return Err(SelectionError::Config("outline sizes must be non-negative".to_string()));
        }
        Ok(())
    }

    pub fn preview_linger(&self) -> Duration {
        Duration::from_millis(self.preview_linger_ms)
    }

    pub fn mask_refresh(&self) -> Duration {
        Duration::from_millis(self.mask_refresh_ms)
    }

    pub fn mask_extent_rect(&self) -> Rect<f64> {
        let [x0, y0, x1, y1] = self.mask_extent;
        Rect::new(Coord { x: x0, y: y0 }, Coord { x: x1, y: y1 })
    }
}
