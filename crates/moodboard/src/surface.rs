//! Rendering surface abstraction.
//!
//! The generator never looks elements up by string id. A [`SurfaceHandles`] table is
//! resolved once at startup and passed in, and every mutation goes through the
//! [`Surface`] trait so the pipeline can be driven without a real display.

use core::fmt::{Display, Formatter, Result as FmtResult};
use core::future::Future;
use core::mem;
use core::pin::Pin;
use core::time::Duration;
use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::preload::PreloadedImage;

/// Stable id of the board container in the default surface.
pub const CONTAINER_ID: &str = "board";
/// Stable id of the loading veil in the default surface.
pub const VEIL_ID: &str = "veil";

/// Opaque handle to an element on a surface.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ElementId(u32);

impl ElementId {
    /// Wrap a raw element index.
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// The raw element index.
    #[inline]
    pub const fn get(self) -> u32 {
        self.0
    }
}

/// A single display container wrapping one preloaded image.
#[derive(Clone, Debug)]
pub struct Cell {
    pub image: PreloadedImage,
    /// Minimal accessible label
    pub label: String,
}

/// Ordered, complete collection of cells ready to be swapped into view.
#[derive(Clone, Debug, Default)]
pub struct Board {
    cells: Vec<Cell>,
}

impl Board {
    /// Wrap preloaded images in display cells, keeping their order.
    pub fn from_images(images: Vec<PreloadedImage>) -> Self {
        let cells = images
            .into_iter()
            .enumerate()
            .map(|(index, image)| Cell {
                image,
                label: format!("Moodboard image {}", index + 1),
            })
            .collect();
        Self { cells }
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Errors raised while resolving surface handles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    /// No element carries the requested id.
    MissingElement(String),
}

impl Display for SurfaceError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::MissingElement(id) => write!(formatter, "no element with id `{id}`"),
        }
    }
}

impl Error for SurfaceError {}

/// Mutations and reads the pipeline performs on the visible surface.
pub trait Surface: Send {
    /// Resolve a stable string id to a handle. Only used while building [`SurfaceHandles`].
    fn lookup(&self, id: &str) -> Option<ElementId>;

    /// Current content width of an element in pixels.
    fn content_width(&self, element: ElementId) -> f32;

    /// Toggle the busy flag exposed to assistive technology.
    fn set_busy(&mut self, element: ElementId, busy: bool);

    /// Show or hide an element.
    fn set_visible(&mut self, element: ElementId, visible: bool);

    /// Dim or undim an element.
    fn set_dimmed(&mut self, element: ElementId, dimmed: bool);

    /// Replace every child of `element` with `board` in one step, returning the
    /// detached previous board.
    fn replace_board(&mut self, element: ElementId, board: Board) -> Board;
}

/// Surface shared between the generator and whoever owns the display.
pub type SharedSurface = Arc<Mutex<dyn Surface>>;

/// Element handles resolved once at startup and injected into components.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SurfaceHandles {
    /// Board container receiving cells
    pub container: ElementId,
    /// Busy overlay
    pub veil: ElementId,
}

impl SurfaceHandles {
    /// Resolve the container and veil by their stable ids.
    ///
    /// # Errors
    ///
    /// Returns `SurfaceError::MissingElement` if either id is unknown to the surface.
    pub fn resolve(
        surface: &dyn Surface,
        container_id: &str,
        veil_id: &str,
    ) -> Result<Self, SurfaceError> {
        let find = |id: &str| {
            surface
                .lookup(id)
                .ok_or_else(|| SurfaceError::MissingElement(id.to_owned()))
        };
        Ok(Self {
            container: find(container_id)?,
            veil: find(veil_id)?,
        })
    }
}

/// Type alias for the pinned future returned by frame clocks.
pub type FrameFuture<'frame> = Pin<Box<dyn Future<Output = ()> + Send + 'frame>>;

/// Source of render opportunities.
pub trait FrameClock: Send + Sync {
    /// Resolve at the next render opportunity.
    fn next_frame(&self) -> FrameFuture<'_>;
}

/// Frame clock ticking at a fixed interval.
#[derive(Clone, Copy, Debug)]
pub struct IntervalFrameClock {
    interval: Duration,
}

impl IntervalFrameClock {
    pub const fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl FrameClock for IntervalFrameClock {
    fn next_frame(&self) -> FrameFuture<'_> {
        let interval = self.interval;
        Box::pin(async move { tokio::time::sleep(interval).await })
    }
}

/// Observable change applied to a [`MemorySurface`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SurfaceEvent {
    Busy(bool),
    Veil(bool),
    Dimmed(bool),
    /// A board of the given length replaced the previous one.
    Replaced(usize),
}

#[derive(Debug, Default)]
struct ElementState {
    width_px: f32,
    busy: bool,
    visible: bool,
    dimmed: bool,
}

/// In-memory surface with a container and a veil.
///
/// Records every mutation as a [`SurfaceEvent`] so the swap sequence can be inspected.
#[derive(Debug)]
pub struct MemorySurface {
    ids: HashMap<String, ElementId>,
    elements: HashMap<ElementId, ElementState>,
    board: Board,
    events: Vec<SurfaceEvent>,
}

impl MemorySurface {
    /// Create a surface whose container has the given content width.
    pub fn new(container_width_px: f32) -> Self {
        let container = ElementId::new(1);
        let veil = ElementId::new(2);
        let mut ids = HashMap::new();
        ids.insert(CONTAINER_ID.to_owned(), container);
        ids.insert(VEIL_ID.to_owned(), veil);
        let mut elements = HashMap::new();
        elements.insert(
            container,
            ElementState {
                width_px: container_width_px,
                visible: true,
                ..ElementState::default()
            },
        );
        elements.insert(veil, ElementState::default());
        Self {
            ids,
            elements,
            board: Board::default(),
            events: Vec::new(),
        }
    }

    /// Handles for the built-in container and veil.
    pub fn handles(&self) -> SurfaceHandles {
        SurfaceHandles {
            container: ElementId::new(1),
            veil: ElementId::new(2),
        }
    }

    /// Simulate a viewport resize.
    pub fn set_content_width(&mut self, element: ElementId, width_px: f32) {
        if let Some(state) = self.elements.get_mut(&element) {
            state.width_px = width_px;
        }
    }

    /// The board currently in view.
    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn events(&self) -> &[SurfaceEvent] {
        &self.events
    }

    pub fn is_busy(&self, element: ElementId) -> bool {
        self.elements.get(&element).is_some_and(|state| state.busy)
    }

    pub fn is_visible(&self, element: ElementId) -> bool {
        self.elements.get(&element).is_some_and(|state| state.visible)
    }

    pub fn is_dimmed(&self, element: ElementId) -> bool {
        self.elements.get(&element).is_some_and(|state| state.dimmed)
    }

    /// Number of board swaps performed so far.
    pub fn swap_count(&self) -> usize {
        self.events
            .iter()
            .filter(|event| matches!(event, SurfaceEvent::Replaced(_)))
            .count()
    }
}

impl Surface for MemorySurface {
    fn lookup(&self, id: &str) -> Option<ElementId> {
        self.ids.get(id).copied()
    }

    fn content_width(&self, element: ElementId) -> f32 {
        self.elements.get(&element).map_or(0.0, |state| state.width_px)
    }

    fn set_busy(&mut self, element: ElementId, busy: bool) {
        if let Some(state) = self.elements.get_mut(&element) {
            state.busy = busy;
            self.events.push(SurfaceEvent::Busy(busy));
        }
    }

    fn set_visible(&mut self, element: ElementId, visible: bool) {
        if let Some(state) = self.elements.get_mut(&element) {
            state.visible = visible;
            self.events.push(SurfaceEvent::Veil(visible));
        }
    }

    fn set_dimmed(&mut self, element: ElementId, dimmed: bool) {
        if let Some(state) = self.elements.get_mut(&element) {
            state.dimmed = dimmed;
            self.events.push(SurfaceEvent::Dimmed(dimmed));
        }
    }

    fn replace_board(&mut self, _element: ElementId, board: Board) -> Board {
        self.events.push(SurfaceEvent::Replaced(board.len()));
        mem::replace(&mut self.board, board)
    }
}
