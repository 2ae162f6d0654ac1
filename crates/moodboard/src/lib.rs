//! Moodboard generation pipeline.
//!
//! This crate measures a column layout, requests a batch of remotely generated
//! images sized to fit it, preloads and decodes them off-screen, and swaps the
//! finished board into the visible surface in one step.
//!
//! # Architecture
//!
//! ```text
//! RegenerationTrigger (actions, debounced resize)
//!     ↓
//! BoardGenerator
//!     ↓ measure (sync)        ↓ build requests (sync, N times)
//! layout::measure         SourceUrlBuilder
//!     ↓
//! ImagePreloader (N concurrent fetch + decode)
//!     ↓
//! Surface (atomic board swap, busy flag, veil)
//! ```

pub mod config;
pub mod generator;
pub mod layout;
pub mod preload;
pub mod random;
pub mod source;
pub mod surface;
pub mod telemetry;
pub mod trigger;

pub use config::{LayoutConfig, MoodboardConfig};
pub use generator::{BoardGenerator, GenerationOutcome};
pub use layout::LayoutMetrics;
pub use preload::{ImagePreloader, LoadError, PreloadedImage};
pub use source::{ImageRequest, SourceUrlBuilder};
pub use surface::{Board, MemorySurface, Surface, SurfaceHandles};
pub use trigger::{RegenerationTrigger, TriggerEvent, TriggerHandle, TriggerSummary};
