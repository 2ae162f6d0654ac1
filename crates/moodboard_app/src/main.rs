//! Headless moodboard driver.
//!
//! Builds a board against the configured endpoint, then reads commands from stdin:
//! `regen`, `spacing`, `resize <width>`, `quit`.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Error, anyhow};
use log::{error, info, warn};
use moodboard::preload::HttpFetcher;
use moodboard::random::ThreadRandom;
use moodboard::surface::{CONTAINER_ID, SharedSurface, VEIL_ID};
use moodboard::{
    BoardGenerator, LayoutConfig, MemorySurface, MoodboardConfig, RegenerationTrigger,
    SurfaceHandles, TriggerEvent, TriggerHandle,
};
use parking_lot::{Mutex, RwLock};
use tokio::io::{AsyncBufReadExt as _, BufReader, stdin};
use tokio::runtime::Builder;

pub fn main() -> ExitCode {
    env_logger::init();
    exit_code(run())
}

fn exit_code(result: Result<(), Error>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("Moodboard exited with error: {err:?}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Error> {
    let config = MoodboardConfig::from_env()?;
    let runtime = Builder::new_current_thread().enable_all().build()?;
    runtime.block_on(drive(config))
}

async fn drive(config: MoodboardConfig) -> Result<(), Error> {
    let memory = Arc::new(Mutex::new(MemorySurface::new(config.container_width_px)));
    let surface = Arc::clone(&memory) as SharedSurface;
    let handles = SurfaceHandles::resolve(&*memory.lock(), CONTAINER_ID, VEIL_ID)?;
    let layout = Arc::new(RwLock::new(LayoutConfig::default()));

    let generator = Arc::new(BoardGenerator::from_config(
        &config,
        surface,
        handles,
        Arc::clone(&layout),
        Arc::new(ThreadRandom),
        Arc::new(
            HttpFetcher::with_timeout(config.fetch_timeout())
                .map_err(|err| anyhow!("cannot build HTTP client: {err}"))?,
        ),
    ));
    let (trigger, trigger_handle) =
        RegenerationTrigger::new(generator, layout, config.resize_debounce());
    let running = tokio::spawn(trigger.run());

    info!("Requesting {} images from {}", config.count, config.endpoint.as_str());
    dispatch(&trigger_handle, TriggerEvent::Regenerate);
    read_commands(&memory, handles, &trigger_handle).await?;

    drop(trigger_handle);
    let summary = running.await.map_err(|err| anyhow!("trigger loop failed: {err}"))?;
    let board_len = memory.lock().board().len();
    info!(
        "{} of {} generations committed; {board_len} cells in view",
        summary.committed, summary.finished
    );
    Ok(())
}

async fn read_commands(
    memory: &Mutex<MemorySurface>,
    handles: SurfaceHandles,
    trigger: &TriggerHandle,
) -> Result<(), Error> {
    let mut lines = BufReader::new(stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let mut words = line.split_whitespace();
        match (words.next(), words.next()) {
            (Some("regen"), _) => dispatch(trigger, TriggerEvent::Regenerate),
            (Some("spacing"), _) => dispatch(trigger, TriggerEvent::ToggleSpacing),
            (Some("resize"), Some(width)) => match width.parse::<f32>() {
                Ok(width_px) if width_px.is_finite() && width_px >= 0.0 => {
                    memory.lock().set_content_width(handles.container, width_px);
                    dispatch(trigger, TriggerEvent::Resize);
                }
                _ => warn!("Ignoring resize to `{width}`"),
            },
            (Some("quit"), _) => break,
            (None, _) => {}
            (Some(other), _) => warn!("Unknown command `{other}`"),
        }
    }
    Ok(())
}

fn dispatch(trigger: &TriggerHandle, event: TriggerEvent) {
    if !trigger.send(event) {
        warn!("Trigger loop has stopped; dropping {event:?}");
    }
}
