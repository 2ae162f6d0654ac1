//! Board generation: measure, request, preload, swap.
//!
//! Each call to [`BoardGenerator::generate`] takes a new generation number. The swap
//! only commits if no newer generation has started in the meantime, so an older batch
//! that resolves late can never overwrite a newer board.

use core::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::future::join_all;
use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use tokio::time::Instant;

use crate::config::{LayoutConfig, MoodboardConfig};
use crate::layout::{LayoutMetrics, measure};
use crate::preload::{ImageFetcher, ImagePreloader};
use crate::random::RandomSource;
use crate::source::{ImageRequest, SourceUrlBuilder};
use crate::surface::{Board, FrameClock, IntervalFrameClock, SharedSurface, SurfaceHandles};
use crate::telemetry::{GenerationStats, maybe_emit, stats_json};

/// Render opportunities to wait after a swap before lifting the veil.
const SETTLE_FRAMES: usize = 2;

/// Layout settings shared between the generator and the spacing toggle.
pub type SharedLayout = Arc<RwLock<LayoutConfig>>;

/// Result of one generation cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GenerationOutcome {
    /// The board was swapped into view.
    Committed(GenerationStats),
    /// A newer generation started first; the board was discarded.
    Stale(GenerationStats),
}

impl GenerationOutcome {
    pub const fn stats(&self) -> &GenerationStats {
        match self {
            Self::Committed(stats) | Self::Stale(stats) => stats,
        }
    }

    pub const fn is_committed(&self) -> bool {
        matches!(self, Self::Committed(_))
    }
}

/// Monotonic generation counter.
#[derive(Debug, Default)]
struct GenerationCounter {
    current: AtomicU64,
}

impl GenerationCounter {
    /// Start a new generation and return its number.
    fn advance(&self) -> u64 {
        self.current.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn is_latest(&self, sequence: u64) -> bool {
        self.current.load(Ordering::Acquire) == sequence
    }
}

/// Orchestrates one moodboard generation per call.
pub struct BoardGenerator {
    surface: SharedSurface,
    handles: SurfaceHandles,
    layout: SharedLayout,
    builder: SourceUrlBuilder,
    preloader: ImagePreloader,
    frames: Arc<dyn FrameClock>,
    device_pixel_ratio: f32,
    default_count: usize,
    telemetry_enabled: bool,
    generations: GenerationCounter,
    last_stats: Mutex<Option<GenerationStats>>,
}

impl BoardGenerator {
    /// Create a generator with a 1x pixel ratio, a 16ms frame clock and
    /// the default batch size.
    pub fn new(
        surface: SharedSurface,
        handles: SurfaceHandles,
        layout: SharedLayout,
        builder: SourceUrlBuilder,
        preloader: ImagePreloader,
    ) -> Self {
        Self {
            surface,
            handles,
            layout,
            builder,
            preloader,
            frames: Arc::new(IntervalFrameClock::new(
                MoodboardConfig::default().frame_interval(),
            )),
            device_pixel_ratio: 1.0,
            default_count: MoodboardConfig::DEFAULT_COUNT,
            telemetry_enabled: false,
            generations: GenerationCounter::default(),
            last_stats: Mutex::new(None),
        }
    }

    /// Wire a generator from runtime configuration.
    pub fn from_config(
        config: &MoodboardConfig,
        surface: SharedSurface,
        handles: SurfaceHandles,
        layout: SharedLayout,
        random: Arc<dyn RandomSource>,
        fetcher: Arc<dyn ImageFetcher>,
    ) -> Self {
        let builder = SourceUrlBuilder::new(config.endpoint.clone(), random);
        let preloader = ImagePreloader::new(fetcher).with_fetch_timeout(config.fetch_timeout());
        Self::new(surface, handles, layout, builder, preloader)
            .with_frame_clock(Arc::new(IntervalFrameClock::new(config.frame_interval())))
            .with_device_pixel_ratio(config.device_pixel_ratio)
            .with_default_count(config.count)
            .with_telemetry(config.telemetry_enabled)
    }

    #[must_use]
    pub fn with_frame_clock(mut self, frames: Arc<dyn FrameClock>) -> Self {
        self.frames = frames;
        self
    }

    #[must_use]
    pub fn with_device_pixel_ratio(mut self, dpr: f32) -> Self {
        self.device_pixel_ratio = dpr;
        self
    }

    #[must_use]
    pub fn with_default_count(mut self, count: usize) -> Self {
        self.default_count = count;
        self
    }

    #[must_use]
    pub fn with_telemetry(mut self, enabled: bool) -> Self {
        self.telemetry_enabled = enabled;
        self
    }

    /// Stats of the most recently finished generation.
    pub fn last_stats(&self) -> Option<GenerationStats> {
        *self.last_stats.lock()
    }

    /// Generate a board of the configured default size.
    pub fn generate_default(&self) -> impl Future<Output = GenerationOutcome> + Send + '_ {
        self.generate(self.default_count)
    }

    /// Generate a board of `count` cells and swap it into view.
    ///
    /// The container is marked busy, the veil shown and the layout measured before
    /// this returns, so the surface reflects the pending work even if the returned
    /// future is polled later. The future never fails: images that do not load are
    /// left out, and the busy state is cleared even when every image fails.
    pub fn generate(&self, count: usize) -> impl Future<Output = GenerationOutcome> + Send + '_ {
        let sequence = self.generations.advance();
        let started = Instant::now();
        let metrics = self.begin();
        debug!(
            "Generation {sequence}: {count} cells, {} columns at {:.1}px",
            metrics.column_count,
            metrics.column_width_px()
        );
        let requests = self.plan(&metrics, count);
        self.complete(sequence, started, requests)
    }

    /// Mark busy, show the veil and measure, all under one surface lock.
    fn begin(&self) -> LayoutMetrics {
        let mut surface = self.surface.lock();
        surface.set_busy(self.handles.container, true);
        surface.set_visible(self.handles.veil, true);
        measure(&*surface, self.handles.container, &self.layout.read())
    }

    /// One request per cell, all sized from the same measurement.
    fn plan(&self, metrics: &LayoutMetrics, count: usize) -> Vec<ImageRequest> {
        let column_width = metrics.column_width_px();
        (0..count)
            .map(|_| {
                let ratio = self.builder.pick_ratio();
                self.builder
                    .build(column_width, column_width * ratio, self.device_pixel_ratio)
            })
            .collect()
    }

    async fn complete(
        &self,
        sequence: u64,
        started: Instant,
        requests: Vec<ImageRequest>,
    ) -> GenerationOutcome {
        let requested = requests.len();
        let settled = join_all(
            requests
                .into_iter()
                .map(|request| self.preloader.preload(request)),
        )
        .await;

        let mut images = Vec::with_capacity(requested);
        let mut failed = 0;
        for result in settled {
            match result {
                Ok(image) => images.push(image),
                Err(err) => {
                    warn!("Generation {sequence}: {err}");
                    failed += 1;
                }
            }
        }
        let decode_fallbacks = images
            .iter()
            .filter(|image| !image.element.is_decoded())
            .count();
        let board = Board::from_images(images);
        let mut stats = GenerationStats {
            sequence,
            requested,
            loaded: board.len(),
            failed,
            decode_fallbacks,
            elapsed_ms: 0,
            committed: false,
        };

        if !self.generations.is_latest(sequence) {
            debug!("Generation {sequence}: superseded, discarding {} cells", board.len());
            return GenerationOutcome::Stale(self.finish(stats, started));
        }

        {
            let mut surface = self.surface.lock();
            surface.set_dimmed(self.handles.container, true);
            let detached = surface.replace_board(self.handles.container, board);
            debug!("Generation {sequence}: detached {} cells", detached.len());
        }
        stats.committed = true;

        for _ in 0..SETTLE_FRAMES {
            self.frames.next_frame().await;
        }
        // A newer generation that started during the settle owns the busy state now.
        if self.generations.is_latest(sequence) {
            let mut surface = self.surface.lock();
            surface.set_dimmed(self.handles.container, false);
            surface.set_visible(self.handles.veil, false);
            surface.set_busy(self.handles.container, false);
        }
        info!(
            "Generation {sequence}: {} of {requested} cells in view ({failed} failed)",
            stats.loaded
        );
        GenerationOutcome::Committed(self.finish(stats, started))
    }

    fn finish(&self, mut stats: GenerationStats, started: Instant) -> GenerationStats {
        stats.elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        maybe_emit(self.telemetry_enabled, &stats_json(&stats));
        *self.last_stats.lock() = Some(stats);
        stats
    }
}
