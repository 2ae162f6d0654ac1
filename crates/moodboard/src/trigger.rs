//! Regeneration triggers: explicit actions, spacing toggle, debounced resize.
//!
//! A [`RegenerationTrigger`] owns an event loop fed through a [`TriggerHandle`].
//! Explicit actions start a generation immediately. Resize signals restart a quiet
//! period and only the last signal of a burst starts a generation. Generations are
//! spawned and not awaited by the loop, so a slow batch never delays the next trigger.
//! Finished generations are reaped whenever a new one is spawned, so only the tasks
//! still running are held.

use core::future::Future;
use core::pin::Pin;
use core::time::Duration;
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::task::{JoinError, JoinSet};
use tokio::time::{Instant, sleep_until};

use crate::generator::{BoardGenerator, GenerationOutcome, SharedLayout};

/// Type alias for the pinned future returned by [`Regenerate`] implementors.
pub type GenerateFuture<'generate> =
    Pin<Box<dyn Future<Output = GenerationOutcome> + Send + 'generate>>;

/// Anything that can rebuild the board on demand.
pub trait Regenerate: Send + Sync + 'static {
    fn regenerate(&self) -> GenerateFuture<'_>;
}

impl Regenerate for BoardGenerator {
    fn regenerate(&self) -> GenerateFuture<'_> {
        Box::pin(self.generate_default())
    }
}

/// Stimuli the trigger reacts to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerEvent {
    /// Explicit user request for a new board.
    Regenerate,
    /// Flip spacing, then regenerate.
    ToggleSpacing,
    /// The viewport changed size.
    Resize,
}

/// Collapses bursts of signals into one firing after a quiet period.
#[derive(Debug, Clone)]
pub struct Debouncer {
    quiet: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub const fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            deadline: None,
        }
    }

    /// Record a signal at `now`, restarting the quiet period.
    pub fn signal(&mut self, now: Instant) {
        self.deadline = Some(now + self.quiet);
    }

    /// Pending firing time, if a signal is waiting.
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns true exactly once when the quiet period has elapsed at `now`.
    pub fn fire_if_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// Cloneable sender side of a [`RegenerationTrigger`].
#[derive(Clone, Debug)]
pub struct TriggerHandle {
    sender: UnboundedSender<TriggerEvent>,
}

impl TriggerHandle {
    /// Queue an event. Returns false once the trigger loop has stopped.
    #[must_use]
    pub fn send(&self, event: TriggerEvent) -> bool {
        self.sender.send(event).is_ok()
    }

    #[must_use]
    pub fn regenerate(&self) -> bool {
        self.send(TriggerEvent::Regenerate)
    }

    #[must_use]
    pub fn toggle_spacing(&self) -> bool {
        self.send(TriggerEvent::ToggleSpacing)
    }

    #[must_use]
    pub fn resize(&self) -> bool {
        self.send(TriggerEvent::Resize)
    }
}

/// Totals over every generation a trigger started.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TriggerSummary {
    /// Generations that ran to completion
    pub finished: usize,
    /// Finished generations whose board reached the surface
    pub committed: usize,
    /// Generation tasks that panicked or were cancelled
    pub aborted: usize,
    /// Outcome of the generation that finished last
    pub last: Option<GenerationOutcome>,
}

impl TriggerSummary {
    fn record(&mut self, result: Result<GenerationOutcome, JoinError>) {
        match result {
            Ok(outcome) => {
                self.finished += 1;
                if outcome.is_committed() {
                    self.committed += 1;
                }
                self.last = Some(outcome);
            }
            Err(err) => {
                warn!("Generation task did not finish: {err}");
                self.aborted += 1;
            }
        }
    }
}

/// Event loop binding user actions and viewport resizes to a generator.
pub struct RegenerationTrigger<G: Regenerate> {
    generator: Arc<G>,
    layout: SharedLayout,
    debouncer: Debouncer,
    receiver: UnboundedReceiver<TriggerEvent>,
    in_flight: JoinSet<GenerationOutcome>,
    summary: TriggerSummary,
}

impl<G: Regenerate> RegenerationTrigger<G> {
    /// Create a trigger and the handle that feeds it.
    pub fn new(
        generator: Arc<G>,
        layout: SharedLayout,
        resize_quiet: Duration,
    ) -> (Self, TriggerHandle) {
        let (sender, receiver) = unbounded_channel();
        let trigger = Self {
            generator,
            layout,
            debouncer: Debouncer::new(resize_quiet),
            receiver,
            in_flight: JoinSet::new(),
            summary: TriggerSummary::default(),
        };
        (trigger, TriggerHandle { sender })
    }

    /// Run until every handle is dropped, then wait for in-flight generations.
    ///
    /// A resize still waiting out its quiet period when the handles drop is discarded.
    pub async fn run(mut self) -> TriggerSummary {
        loop {
            let deadline = self.debouncer.deadline();
            tokio::select! {
                event = self.receiver.recv() => match event {
                    Some(event) => self.handle(event),
                    None => break,
                },
                () = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    if self.debouncer.fire_if_due(Instant::now()) {
                        debug!("Resize settled, regenerating");
                        self.spawn_generation();
                    }
                }
            }
        }
        self.drain().await
    }

    /// Wait for every generation still running and fold it into the summary.
    async fn drain(mut self) -> TriggerSummary {
        while let Some(result) = self.in_flight.join_next().await {
            self.summary.record(result);
        }
        self.summary
    }

    fn handle(&mut self, event: TriggerEvent) {
        match event {
            TriggerEvent::Regenerate => self.spawn_generation(),
            TriggerEvent::ToggleSpacing => {
                let gap = self.layout.write().toggle_spacing();
                info!("Spacing toggled, gap is now {gap}");
                self.spawn_generation();
            }
            TriggerEvent::Resize => self.debouncer.signal(Instant::now()),
        }
    }

    fn spawn_generation(&mut self) {
        while let Some(result) = self.in_flight.try_join_next() {
            self.summary.record(result);
        }
        let generator = Arc::clone(&self.generator);
        drop(self.in_flight.spawn(async move { generator.regenerate().await }));
    }
}
