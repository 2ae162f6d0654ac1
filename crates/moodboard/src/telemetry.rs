//! Telemetry utilities for formatting and emitting per-generation counters.
//! Kept independent of the generator internals; callers pass in stats explicitly.

use log::info;
use serde::Serialize;

/// Counters collected over one generation cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GenerationStats {
    /// Generation sequence number
    pub sequence: u64,
    /// Cells requested
    pub requested: usize,
    /// Cells whose image loaded
    pub loaded: usize,
    /// Cells dropped because their image failed to load
    pub failed: usize,
    /// Loaded cells shown without a successful decode
    pub decode_fallbacks: usize,
    /// Wall time from start to swap (or discard)
    pub elapsed_ms: u64,
    /// Whether the board reached the surface
    pub committed: bool,
}

pub fn stats_json(stats: &GenerationStats) -> String {
    serde_json::to_string(stats).unwrap_or_default()
}

pub fn maybe_emit(enabled: bool, json_line: &str) {
    if enabled {
        info!(target: "moodboard::telemetry", "{json_line}");
    }
}
