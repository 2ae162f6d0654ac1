//! Configuration for the moodboard pipeline.
//!
//! `MoodboardConfig` holds runtime settings (endpoint, batch size, timing) and can be
//! loaded from environment variables or constructed programmatically. `LayoutConfig`
//! holds the style settings the layout measurer consumes, kept as raw custom-property
//! strings the way a stylesheet declares them.

use core::fmt::{Display, Formatter, Result as FmtResult};
use core::str::FromStr;
use core::time::Duration;
use std::collections::HashMap;
use std::env;
use std::error::Error;

use url::Url;

/// Custom property holding the declared column count.
pub const COLUMNS_PROPERTY: &str = "--columns";
/// Custom property holding the gap between cells.
pub const GAP_PROPERTY: &str = "--gap";

/// Gap applied when spacing is switched on.
pub const DEFAULT_GAP: &str = "12px";
/// Gap applied when spacing is switched off.
pub const COLLAPSED_GAP: &str = "0px";

/// Default remote image endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://picsum.photos/seed/{seed}/{width}/{height}";

/// Errors raised while validating configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The endpoint template lacks a required placeholder.
    MissingPlaceholder(&'static str),
    /// The endpoint template does not expand to a valid URL.
    InvalidEndpoint(String),
}

impl Display for ConfigError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::MissingPlaceholder(name) => {
                write!(formatter, "endpoint template is missing the {name} placeholder")
            }
            Self::InvalidEndpoint(message) => write!(formatter, "invalid endpoint: {message}"),
        }
    }
}

impl Error for ConfigError {}

/// Validated URL template with `{seed}`, `{width}` and `{height}` placeholders.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EndpointTemplate(String);

impl EndpointTemplate {
    const PLACEHOLDERS: [&'static str; 3] = ["{seed}", "{width}", "{height}"];

    /// Validate a template.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingPlaceholder` if any placeholder is absent and
    /// `ConfigError::InvalidEndpoint` if a sample expansion is not a valid URL.
    pub fn parse(template: &str) -> Result<Self, ConfigError> {
        for placeholder in Self::PLACEHOLDERS {
            if !template.contains(placeholder) {
                return Err(ConfigError::MissingPlaceholder(placeholder));
            }
        }
        let candidate = Self(template.to_owned());
        Url::parse(&candidate.expand("probe", 1, 1))
            .map_err(|err| ConfigError::InvalidEndpoint(format!("{template}: {err}")))?;
        Ok(candidate)
    }

    /// Substitute the placeholders.
    pub fn expand(&self, seed: &str, width: u32, height: u32) -> String {
        self.0
            .replace("{seed}", seed)
            .replace("{width}", &width.to_string())
            .replace("{height}", &height.to_string())
    }

    /// The raw template text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EndpointTemplate {
    fn default() -> Self {
        Self(DEFAULT_ENDPOINT.to_owned())
    }
}

/// Runtime configuration for the moodboard pipeline.
#[derive(Clone, Debug)]
pub struct MoodboardConfig {
    /// Remote image endpoint template
    pub endpoint: EndpointTemplate,
    /// Number of cells requested per generation
    pub count: usize,
    /// Quiet period for collapsing bursts of resize signals, in milliseconds
    pub resize_debounce_ms: u64,
    /// Interval between render opportunities, in milliseconds
    pub frame_ms: u64,
    /// Longest a single image fetch may take before it counts as failed, in milliseconds
    pub fetch_timeout_ms: u64,
    /// Device pixel ratio applied to requested image sizes
    pub device_pixel_ratio: f32,
    /// Whether to emit per-generation telemetry lines
    pub telemetry_enabled: bool,
    /// Initial container width used by headless drivers
    pub container_width_px: f32,
}

impl MoodboardConfig {
    /// Default number of cells per board.
    pub const DEFAULT_COUNT: usize = 80;
    /// Default resize quiet period.
    pub const DEFAULT_RESIZE_DEBOUNCE_MS: u64 = 120;
    /// Default render-opportunity interval.
    pub const DEFAULT_FRAME_MS: u64 = 16;
    /// Default per-image fetch timeout.
    pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 10_000;
    /// Default container width for headless drivers.
    pub const DEFAULT_CONTAINER_WIDTH_PX: f32 = 1200.0;

    /// Construct a configuration with explicit timing values.
    ///
    /// Both intervals are clamped to at least 1ms; the device pixel ratio is
    /// normalized with [`normalize_dpr`].
    #[must_use]
    pub fn new(
        endpoint: EndpointTemplate,
        count: usize,
        resize_debounce_ms: u64,
        frame_ms: u64,
        device_pixel_ratio: f32,
    ) -> Self {
        Self {
            endpoint,
            count,
            resize_debounce_ms: resize_debounce_ms.max(1),
            frame_ms: frame_ms.max(1),
            fetch_timeout_ms: Self::DEFAULT_FETCH_TIMEOUT_MS,
            device_pixel_ratio: normalize_dpr(device_pixel_ratio),
            telemetry_enabled: false,
            container_width_px: Self::DEFAULT_CONTAINER_WIDTH_PX,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Reads the following environment variables:
    /// - `MOODBOARD_ENDPOINT`: URL template (default: picsum seed endpoint)
    /// - `MOODBOARD_COUNT`: cells per board (default: 80)
    /// - `MOODBOARD_RESIZE_DEBOUNCE_MS`: resize quiet period (default: 120)
    /// - `MOODBOARD_FRAME_MS`: render-opportunity interval (default: 16)
    /// - `MOODBOARD_FETCH_TIMEOUT_MS`: per-image fetch timeout (default: 10000)
    /// - `MOODBOARD_DPR`: device pixel ratio (default: 1.0)
    /// - `MOODBOARD_TELEMETRY`: set to "1" to enable telemetry (default: disabled)
    /// - `MOODBOARD_CONTAINER_WIDTH`: initial container width (default: 1200)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `MOODBOARD_ENDPOINT` is set to an invalid template.
    pub fn from_env() -> Result<Self, ConfigError> {
        let endpoint = match env::var("MOODBOARD_ENDPOINT") {
            Ok(template) => EndpointTemplate::parse(&template)?,
            Err(_) => EndpointTemplate::default(),
        };
        let count = parse_env("MOODBOARD_COUNT").unwrap_or(Self::DEFAULT_COUNT);
        let resize_debounce_ms = parse_env("MOODBOARD_RESIZE_DEBOUNCE_MS")
            .unwrap_or(Self::DEFAULT_RESIZE_DEBOUNCE_MS);
        let frame_ms = parse_env("MOODBOARD_FRAME_MS").unwrap_or(Self::DEFAULT_FRAME_MS);
        let device_pixel_ratio = parse_env("MOODBOARD_DPR").unwrap_or(1.0);
        let mut config = Self::new(endpoint, count, resize_debounce_ms, frame_ms, device_pixel_ratio);
        config.fetch_timeout_ms = parse_env::<u64>("MOODBOARD_FETCH_TIMEOUT_MS")
            .unwrap_or(Self::DEFAULT_FETCH_TIMEOUT_MS)
            .max(1);
        config.telemetry_enabled = env::var("MOODBOARD_TELEMETRY").ok().as_deref() == Some("1");
        config.container_width_px = parse_env::<f32>("MOODBOARD_CONTAINER_WIDTH")
            .filter(|width| width.is_finite() && *width >= 0.0)
            .unwrap_or(Self::DEFAULT_CONTAINER_WIDTH_PX);
        Ok(config)
    }

    /// The resize quiet period as a `Duration`.
    #[must_use]
    pub const fn resize_debounce(&self) -> Duration {
        Duration::from_millis(self.resize_debounce_ms)
    }

    /// The render-opportunity interval as a `Duration`.
    #[must_use]
    pub const fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_ms)
    }

    /// The per-image fetch timeout as a `Duration`, at least 1ms.
    #[must_use]
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms.max(1))
    }
}

impl Default for MoodboardConfig {
    fn default() -> Self {
        Self::new(
            EndpointTemplate::default(),
            Self::DEFAULT_COUNT,
            Self::DEFAULT_RESIZE_DEBOUNCE_MS,
            Self::DEFAULT_FRAME_MS,
            1.0,
        )
    }
}

fn parse_env<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|val| val.trim().parse::<T>().ok())
}

/// Clamp a device pixel ratio into `(0, 2]`.
///
/// Non-finite or non-positive ratios fall back to 1.
#[must_use]
pub fn normalize_dpr(dpr: f32) -> f32 {
    if dpr.is_finite() && dpr > 0.0 {
        dpr.min(2.0)
    } else {
        1.0
    }
}

/// Style settings consumed by the layout measurer.
///
/// Values are stored as raw custom-property text (`"6"`, `"12px"`), and parsed at
/// measurement time so an unparseable value falls back instead of failing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayoutConfig {
    properties: HashMap<String, String>,
    /// Gap restored when spacing is switched back on.
    spacious_gap: String,
}

impl LayoutConfig {
    /// Build a config with an explicit column count and gap.
    #[must_use]
    pub fn new(columns: &str, gap: &str) -> Self {
        let mut properties = HashMap::new();
        properties.insert(COLUMNS_PROPERTY.to_owned(), columns.to_owned());
        properties.insert(GAP_PROPERTY.to_owned(), gap.to_owned());
        let spacious_gap = if is_collapsed(gap) {
            DEFAULT_GAP.to_owned()
        } else {
            gap.to_owned()
        };
        Self {
            properties,
            spacious_gap,
        }
    }

    /// Look up a raw custom property.
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    /// Set a raw custom property.
    pub fn set_property(&mut self, name: &str, value: &str) {
        self.properties.insert(name.to_owned(), value.to_owned());
    }

    /// Remove a custom property, leaving the measurer to fall back.
    pub fn remove_property(&mut self, name: &str) {
        self.properties.remove(name);
    }

    /// Declared column count text.
    pub fn columns(&self) -> Option<&str> {
        self.property(COLUMNS_PROPERTY)
    }

    /// Declared gap text.
    pub fn gap(&self) -> Option<&str> {
        self.property(GAP_PROPERTY)
    }

    /// Whether spacing is currently collapsed.
    pub fn is_spacing_collapsed(&self) -> bool {
        self.gap().is_some_and(is_collapsed)
    }

    /// Flip the gap between its spacious value and zero; returns the new gap text.
    pub fn toggle_spacing(&mut self) -> String {
        let next = if self.is_spacing_collapsed() {
            self.spacious_gap.clone()
        } else {
            if let Some(current) = self.gap() {
                self.spacious_gap = current.to_owned();
            }
            COLLAPSED_GAP.to_owned()
        };
        self.set_property(GAP_PROPERTY, &next);
        next
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self::new("6", DEFAULT_GAP)
    }
}

fn is_collapsed(gap: &str) -> bool {
    crate::layout::parse_length(gap).is_some_and(|px| px == 0.0)
}
