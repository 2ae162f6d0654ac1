//! Remote image request construction.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::{EndpointTemplate, normalize_dpr};
use crate::random::RandomSource;

/// Height-to-width ratios a cell may take.
pub const ASPECT_RATIO_PALETTE: [f32; 7] = [0.75, 0.85, 1.00, 1.15, 1.30, 1.50, 1.65];

/// Immutable descriptor of one remote image, one per grid cell.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageRequest {
    /// Cache-busting token; carries no meaning beyond uniqueness
    pub seed: String,
    /// Requested pixel width, already scaled by the device pixel ratio
    pub target_width_px: u32,
    /// Requested pixel height, already scaled by the device pixel ratio
    pub target_height_px: u32,
    /// Ratio applied to the layout size, in `(0, 2]`
    pub device_pixel_ratio: f32,
    /// Fully expanded endpoint URL
    pub url: String,
}

impl ImageRequest {
    /// Layout width of the cell in CSS pixels.
    pub fn display_width_px(&self) -> f32 {
        self.target_width_px as f32 / self.device_pixel_ratio
    }

    /// Layout height of the cell in CSS pixels.
    pub fn display_height_px(&self) -> f32 {
        self.target_height_px as f32 / self.device_pixel_ratio
    }
}

/// Builds unique, density-scaled image requests against an endpoint template.
#[derive(Clone)]
pub struct SourceUrlBuilder {
    endpoint: EndpointTemplate,
    random: Arc<dyn RandomSource>,
}

impl SourceUrlBuilder {
    pub fn new(endpoint: EndpointTemplate, random: Arc<dyn RandomSource>) -> Self {
        Self { endpoint, random }
    }

    /// Build a request for a cell of `width_px` × `height_px` CSS pixels.
    ///
    /// Both dimensions are scaled by `dpr` (clamped to `(0, 2]`) and rounded to the
    /// nearest integer, never below 1.
    pub fn build(&self, width_px: f32, height_px: f32, dpr: f32) -> ImageRequest {
        let dpr = normalize_dpr(dpr);
        let seed = self.fresh_seed();
        let target_width_px = scale(width_px, dpr);
        let target_height_px = scale(height_px, dpr);
        ImageRequest {
            url: self.endpoint.expand(&seed, target_width_px, target_height_px),
            seed,
            target_width_px,
            target_height_px,
            device_pixel_ratio: dpr,
        }
    }

    /// Pick an aspect ratio uniformly from the palette.
    pub fn pick_ratio(&self) -> f32 {
        let index = self.random.pick_index(ASPECT_RATIO_PALETTE.len());
        ASPECT_RATIO_PALETTE
            .get(index)
            .copied()
            .unwrap_or(1.0)
    }

    fn fresh_seed(&self) -> String {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_millis());
        format!("{millis:x}-{}", self.random.token())
    }
}

fn scale(size_px: f32, dpr: f32) -> u32 {
    let scaled = (size_px * dpr).round();
    if scaled.is_finite() && scaled >= 1.0 {
        scaled.min(u32::MAX as f32) as u32
    } else {
        1
    }
}
