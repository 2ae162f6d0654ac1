use std::time::Duration;

use anyhow::Result;
use moodboard::LayoutConfig;
use moodboard::preload::LoadFailure;
use moodboard::surface::SurfaceEvent;

mod common;

use common::{Harness, Reply};

/// Palette index of the 1.0 ratio.
const SQUARE: usize = 2;

fn tokens(range: core::ops::Range<usize>) -> Vec<String> {
    range.map(|index| format!("t{index}")).collect()
}

#[tokio::test(start_paused = true)]
async fn square_cells_at_double_density() -> Result<()> {
    common::init_logging();
    let harness = Harness::new(1200.0, LayoutConfig::new("6", "0px"), vec![SQUARE], 2.0);

    let outcome = harness.generator.generate(6).await;

    assert!(outcome.is_committed());
    let surface = harness.surface.lock();
    assert_eq!(surface.board().len(), 6);
    for cell in surface.board().cells() {
        assert_eq!(cell.image.request.target_width_px, 400);
        assert_eq!(cell.image.request.target_height_px, 400);
        assert!(cell.image.request.url.ends_with("/400/400"));
        assert!(cell.image.element.is_decoded());
        assert_eq!(cell.image.element.dimensions(), Some((2, 3)));
    }
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn heights_follow_picked_ratios() -> Result<()> {
    let harness = Harness::new(1200.0, LayoutConfig::new("6", "0"), vec![0, 6, 3], 1.0);

    harness.generator.generate(3).await;

    let heights: Vec<u32> = harness
        .surface
        .lock()
        .board()
        .cells()
        .iter()
        .map(|cell| cell.image.request.target_height_px)
        .collect();
    assert_eq!(heights, vec![150, 330, 230]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn order_survives_reversed_completion() -> Result<()> {
    let harness = Harness::new(800.0, LayoutConfig::default(), vec![1, 4], 1.0);
    for index in 0..8_u64 {
        let delay = Duration::from_millis((8 - index) * 25);
        harness.fetcher.script(&format!("t{index}"), delay, Reply::Png);
    }

    let outcome = harness.generator.generate(8).await;

    assert!(outcome.is_committed());
    assert_eq!(harness.visible_tokens(), tokens(0..8));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn empty_batch_still_clears_busy_state() -> Result<()> {
    let harness = Harness::new(800.0, LayoutConfig::default(), vec![SQUARE], 1.0);

    let outcome = harness.generator.generate(0).await;

    assert!(outcome.is_committed());
    assert_eq!(outcome.stats().requested, 0);
    let surface = harness.surface.lock();
    let handles = surface.handles();
    assert!(surface.board().is_empty());
    assert!(!surface.is_busy(handles.container));
    assert!(!surface.is_visible(handles.veil));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn total_failure_renders_empty_board() -> Result<()> {
    let harness = Harness::new(800.0, LayoutConfig::default(), vec![SQUARE], 1.0);
    harness.generator.generate(4).await;
    assert_eq!(harness.visible_tokens(), tokens(0..4));

    for index in 4..8 {
        harness.fetcher.script(
            &format!("t{index}"),
            Duration::from_millis(10),
            Reply::Fail(LoadFailure::Network("offline".to_owned())),
        );
    }
    let outcome = harness.generator.generate(4).await;

    assert!(outcome.is_committed());
    assert_eq!(outcome.stats().loaded, 0);
    assert_eq!(outcome.stats().failed, 4);
    let surface = harness.surface.lock();
    let handles = surface.handles();
    assert!(surface.board().is_empty());
    assert!(!surface.is_busy(handles.container));
    assert!(!surface.is_visible(handles.veil));
    assert!(!surface.is_dimmed(handles.container));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn partial_failure_keeps_only_successes() -> Result<()> {
    let harness = Harness::new(1200.0, LayoutConfig::new("6", "0px"), vec![0, 1, 2, 3, 4, 5, 6], 1.0);
    harness
        .fetcher
        .script("t1", Duration::from_millis(5), Reply::Fail(LoadFailure::Status(503)));
    harness
        .fetcher
        .script("t4", Duration::ZERO, Reply::Fail(LoadFailure::Status(404)));

    let outcome = harness.generator.generate(7).await;

    assert_eq!(outcome.stats().loaded, 5);
    assert_eq!(outcome.stats().failed, 2);
    assert_eq!(harness.visible_tokens(), vec!["t0", "t2", "t3", "t5", "t6"]);

    let expected_heights = [150, 200, 230, 300, 330];
    let surface = harness.surface.lock();
    for (cell, height) in surface.board().cells().iter().zip(expected_heights) {
        assert_eq!(cell.image.request.target_width_px, 200);
        assert_eq!(cell.image.request.target_height_px, height);
    }
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn stalled_fetch_times_out_and_clears_busy_state() -> Result<()> {
    let harness = Harness::new(1200.0, LayoutConfig::new("6", "0px"), vec![SQUARE], 1.0);
    harness
        .fetcher
        .script("t1", Duration::from_secs(3600), Reply::Png);
    let started = tokio::time::Instant::now();

    let outcome = harness.generator.generate(3).await;

    assert!(outcome.is_committed());
    assert!(started.elapsed() < Duration::from_secs(60));
    assert_eq!(outcome.stats().failed, 1);
    assert_eq!(harness.visible_tokens(), vec!["t0", "t2"]);
    let surface = harness.surface.lock();
    let handles = surface.handles();
    assert!(!surface.is_busy(handles.container));
    assert!(!surface.is_visible(handles.veil));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn undecodable_images_are_still_shown() -> Result<()> {
    let harness = Harness::new(800.0, LayoutConfig::default(), vec![SQUARE], 1.0);
    harness.fetcher.script("t1", Duration::ZERO, Reply::Garbage);

    let outcome = harness.generator.generate(3).await;

    assert_eq!(outcome.stats().loaded, 3);
    assert_eq!(outcome.stats().decode_fallbacks, 1);
    let surface = harness.surface.lock();
    let decoded: Vec<bool> = surface
        .board()
        .cells()
        .iter()
        .map(|cell| cell.image.element.is_decoded())
        .collect();
    assert_eq!(decoded, vec![true, false, true]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn busy_state_is_set_before_first_poll() -> Result<()> {
    let harness = Harness::new(800.0, LayoutConfig::default(), vec![SQUARE], 1.0);

    let pending = harness.generator.generate(2);
    {
        let surface = harness.surface.lock();
        let handles = surface.handles();
        assert!(surface.is_busy(handles.container));
        assert!(surface.is_visible(handles.veil));
        assert_eq!(surface.swap_count(), 0);
    }
    pending.await;

    let surface = harness.surface.lock();
    assert_eq!(
        surface.events(),
        &[
            SurfaceEvent::Busy(true),
            SurfaceEvent::Veil(true),
            SurfaceEvent::Dimmed(true),
            SurfaceEvent::Replaced(2),
            SurfaceEvent::Dimmed(false),
            SurfaceEvent::Veil(false),
            SurfaceEvent::Busy(false),
        ]
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn one_measurement_per_cycle() -> Result<()> {
    let harness = Harness::new(1200.0, LayoutConfig::new("6", "0px"), vec![SQUARE], 1.0);
    for index in 0..4 {
        harness
            .fetcher
            .script(&format!("t{index}"), Duration::from_millis(50), Reply::Png);
    }

    let pending = harness.generator.generate(4);
    {
        let mut surface = harness.surface.lock();
        let handles = surface.handles();
        surface.set_content_width(handles.container, 600.0);
    }
    pending.await;
    let first_widths: Vec<u32> = harness
        .surface
        .lock()
        .board()
        .cells()
        .iter()
        .map(|cell| cell.image.request.target_width_px)
        .collect();
    assert_eq!(first_widths, vec![200; 4]);

    harness.generator.generate(2).await;
    let second_widths: Vec<u32> = harness
        .surface
        .lock()
        .board()
        .cells()
        .iter()
        .map(|cell| cell.image.request.target_width_px)
        .collect();
    assert_eq!(second_widths, vec![100; 2]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn late_batch_from_older_generation_is_discarded() -> Result<()> {
    let harness = Harness::new(800.0, LayoutConfig::default(), vec![SQUARE], 1.0);
    for index in 0..4 {
        harness
            .fetcher
            .script(&format!("t{index}"), Duration::from_millis(500), Reply::Png);
    }

    let older = harness.generator.generate(4);
    let newer = harness.generator.generate(4);
    let (older_outcome, newer_outcome) = tokio::join!(older, newer);

    assert!(!older_outcome.is_committed());
    assert_eq!(older_outcome.stats().sequence, 1);
    assert!(newer_outcome.is_committed());
    assert_eq!(newer_outcome.stats().sequence, 2);
    assert_eq!(harness.visible_tokens(), tokens(4..8));

    let surface = harness.surface.lock();
    let handles = surface.handles();
    assert_eq!(surface.swap_count(), 1);
    assert!(!surface.is_busy(handles.container));
    assert!(!surface.is_visible(handles.veil));
    assert_eq!(harness.generator.last_stats().map(|stats| stats.sequence), Some(1));
    Ok(())
}
