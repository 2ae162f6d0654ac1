//! Column layout measurement.
//!
//! Measurement is a pure read of the current container width and layout settings.
//! Nothing is cached: every generation cycle measures again, so a resize is always
//! picked up by the next cycle.

use crate::config::LayoutConfig;
use crate::surface::{ElementId, Surface};

/// Column count used when the declared value is unset or unparseable.
pub const DEFAULT_COLUMNS: u32 = 6;

/// Pixels per `rem`/`em` when a gap is declared in font-relative units.
const ROOT_FONT_SIZE_PX: f32 = 16.0;

/// Smallest width any column may have.
const MIN_COLUMN_WIDTH_PX: f32 = 1.0;

/// Snapshot of the container geometry for one generation cycle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayoutMetrics {
    /// Number of columns, always at least 1
    pub column_count: u32,
    /// Gap between adjacent columns in pixels, never negative
    pub gap_px: f32,
    /// Content width of the container in pixels, never negative
    pub container_width_px: f32,
}

impl LayoutMetrics {
    /// Build metrics, sanitizing each input.
    ///
    /// A zero column count is raised to 1; negative or non-finite gaps and widths
    /// become 0.
    #[must_use]
    pub fn new(column_count: u32, gap_px: f32, container_width_px: f32) -> Self {
        Self {
            column_count: column_count.max(1),
            gap_px: non_negative(gap_px),
            container_width_px: non_negative(container_width_px),
        }
    }

    /// Width of a single column: `(width - gap * (columns - 1)) / columns`, floored at 1.
    #[must_use]
    pub fn column_width_px(&self) -> f32 {
        let columns = self.column_count.max(1) as f32;
        let gutters = self.gap_px * (columns - 1.0);
        let width = (self.container_width_px - gutters) / columns;
        if width.is_finite() {
            width.max(MIN_COLUMN_WIDTH_PX)
        } else {
            MIN_COLUMN_WIDTH_PX
        }
    }
}

/// Measure the container's current geometry against the given layout settings.
pub fn measure(surface: &dyn Surface, container: ElementId, config: &LayoutConfig) -> LayoutMetrics {
    let column_count = config
        .columns()
        .map_or(DEFAULT_COLUMNS, parse_column_count);
    let gap_px = config.gap().and_then(parse_length).unwrap_or(0.0);
    LayoutMetrics::new(column_count, gap_px, surface.content_width(container))
}

/// Parse a declared column count; unset, zero and unparseable values fall back.
pub fn parse_column_count(text: &str) -> u32 {
    text.trim()
        .parse::<u32>()
        .ok()
        .filter(|count| *count > 0)
        .unwrap_or(DEFAULT_COLUMNS)
}

/// Parse a length such as `12px`, `0`, `1.5rem` or `8.5` into pixels.
///
/// Returns `None` for unparseable or negative values.
pub fn parse_length(text: &str) -> Option<f32> {
    let trimmed = text.trim();
    let (number, scale) = if let Some(value) = trimmed.strip_suffix("px") {
        (value, 1.0)
    } else if let Some(value) = trimmed.strip_suffix("rem") {
        (value, ROOT_FONT_SIZE_PX)
    } else if let Some(value) = trimmed.strip_suffix("em") {
        (value, ROOT_FONT_SIZE_PX)
    } else {
        (trimmed, 1.0)
    };
    let parsed = number.trim().parse::<f32>().ok()? * scale;
    (parsed.is_finite() && parsed >= 0.0).then_some(parsed)
}

fn non_negative(value: f32) -> f32 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        0.0
    }
}
