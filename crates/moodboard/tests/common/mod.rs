#![allow(dead_code, reason = "Each test binary uses a different subset of helpers")]

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use image::{ImageFormat, Rgba, RgbaImage};
use moodboard::config::EndpointTemplate;
use moodboard::generator::SharedLayout;
use moodboard::preload::{FetchFuture, ImageFetcher, ImagePreloader, LoadFailure};
use moodboard::random::RandomSource;
use moodboard::surface::SharedSurface;
use moodboard::{BoardGenerator, LayoutConfig, MemorySurface, SourceUrlBuilder};
use parking_lot::{Mutex, RwLock};

pub const TEST_ENDPOINT: &str = "http://images.test/seed/{seed}/{width}/{height}";

pub fn init_logging() {
    drop(
        env_logger::builder()
            .filter_level(log::LevelFilter::Debug)
            .is_test(true)
            .try_init(),
    );
}

/// Deterministic tokens (`t0`, `t1`, ...) and a cycling list of palette indices.
pub struct ScriptedRandom {
    next_token: AtomicUsize,
    next_pick: AtomicUsize,
    picks: Vec<usize>,
}

impl ScriptedRandom {
    pub fn new(picks: Vec<usize>) -> Self {
        Self {
            next_token: AtomicUsize::new(0),
            next_pick: AtomicUsize::new(0),
            picks,
        }
    }
}

impl RandomSource for ScriptedRandom {
    fn token(&self) -> String {
        format!("t{}", self.next_token.fetch_add(1, Ordering::SeqCst))
    }

    fn pick_index(&self, len: usize) -> usize {
        let step = self.next_pick.fetch_add(1, Ordering::SeqCst);
        if self.picks.is_empty() {
            return 0;
        }
        self.picks[step % self.picks.len()] % len
    }
}

/// How the fake transport answers one token.
#[derive(Clone, Debug)]
pub enum Reply {
    Png,
    Garbage,
    Fail(LoadFailure),
}

#[derive(Clone, Debug)]
struct Script {
    delay: Duration,
    reply: Reply,
}

/// In-memory transport keyed by the token embedded in the request seed.
#[derive(Default)]
pub struct FakeFetcher {
    scripts: Mutex<HashMap<String, Script>>,
    calls: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, token: &str, delay: Duration, reply: Reply) {
        self.scripts
            .lock()
            .insert(token.to_owned(), Script { delay, reply });
    }

    /// URLs fetched so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

impl ImageFetcher for FakeFetcher {
    fn fetch<'fetch>(&'fetch self, url: &'fetch str) -> FetchFuture<'fetch> {
        self.calls.lock().push(url.to_owned());
        let script = self
            .scripts
            .lock()
            .get(&token_of(url))
            .cloned()
            .unwrap_or(Script {
                delay: Duration::ZERO,
                reply: Reply::Png,
            });
        Box::pin(async move {
            if !script.delay.is_zero() {
                tokio::time::sleep(script.delay).await;
            }
            match script.reply {
                Reply::Png => Ok(png_bytes(2, 3)),
                Reply::Garbage => Ok(Bytes::from_static(b"definitely not an image")),
                Reply::Fail(reason) => Err(reason),
            }
        })
    }
}

/// Extract the scripted token from `.../seed/<millis>-<token>/<w>/<h>`.
pub fn token_of(url: &str) -> String {
    url.split("/seed/")
        .nth(1)
        .and_then(|rest| rest.split('/').next())
        .and_then(|seed| seed.rsplit('-').next())
        .unwrap_or_default()
        .to_owned()
}

pub fn png_bytes(width: u32, height: u32) -> Bytes {
    let pixels = RgbaImage::from_pixel(width, height, Rgba([200, 120, 40, 255]));
    let mut out = Cursor::new(Vec::new());
    pixels
        .write_to(&mut out, ImageFormat::Png)
        .expect("encode png fixture");
    Bytes::from(out.into_inner())
}

/// A generator over an in-memory surface and a fake transport.
pub struct Harness {
    pub surface: Arc<Mutex<MemorySurface>>,
    pub layout: SharedLayout,
    pub fetcher: Arc<FakeFetcher>,
    pub generator: Arc<BoardGenerator>,
}

impl Harness {
    pub fn new(width: f32, layout: LayoutConfig, picks: Vec<usize>, dpr: f32) -> Self {
        let memory = MemorySurface::new(width);
        let handles = memory.handles();
        let surface = Arc::new(Mutex::new(memory));
        let shared = Arc::clone(&surface) as SharedSurface;
        let layout = Arc::new(RwLock::new(layout));
        let fetcher = Arc::new(FakeFetcher::new());
        let endpoint = EndpointTemplate::parse(TEST_ENDPOINT).expect("valid test endpoint");
        let builder = SourceUrlBuilder::new(endpoint, Arc::new(ScriptedRandom::new(picks)));
        let preloader = ImagePreloader::new(Arc::clone(&fetcher) as Arc<dyn ImageFetcher>);
        let generator = BoardGenerator::new(shared, handles, Arc::clone(&layout), builder, preloader)
            .with_device_pixel_ratio(dpr)
            .with_default_count(8);
        Self {
            surface,
            layout,
            fetcher,
            generator: Arc::new(generator),
        }
    }

    /// Tokens of the cells currently in view, in board order.
    pub fn visible_tokens(&self) -> Vec<String> {
        self.surface
            .lock()
            .board()
            .cells()
            .iter()
            .map(|cell| token_of(&cell.image.request.url))
            .collect()
    }
}
