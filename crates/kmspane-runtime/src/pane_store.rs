#![forbid(unsafe_code)]

//! Named panes and the rotation cursor.
//!
//! A [`PaneStore`] holds every pane's canvas behind one mutex. Each public
//! operation takes the lock for its whole duration, so a drawing command and
//! the rotation thread's `show` never interleave on the same canvas. Panes
//! keep insertion order; removal shifts later panes down.

use std::sync::{Mutex, MutexGuard};

use kmspane_backend::DisplayBackend;
use kmspane_render::raster;
use kmspane_render::{Canvas, CanvasLayout, Circle, Color, Rect, RectCopy, Shape};

/// Name of the pane created with the store.
pub const ROOT_PANE: &str = "root";

/// Default upper bound on the number of panes.
pub const DEFAULT_MAX_PANES: usize = 1024;

/// Recoverable pane operation failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaneError {
    #[error("duplicate pane: {0}")]
    Duplicate(String),
    #[error("oom: cannot allocate canvas for pane {0}")]
    OutOfMemory(String),
    #[error("targeted pane doesn't exist: {0}")]
    NoSuchPane(String),
    #[error("pane name must not be empty")]
    InvalidName,
    #[error("pane capacity of {0} reached")]
    Full(usize),
}

#[derive(Debug)]
struct Pane {
    name: String,
    canvas: Canvas,
}

/// Thread-safe, ordered collection of named canvases.
#[derive(Debug)]
pub struct PaneStore {
    panes: Mutex<Vec<Pane>>,
    layout: CanvasLayout,
    capacity: usize,
}

impl PaneStore {
    /// An empty store whose canvases use `layout`.
    pub fn new(layout: CanvasLayout, capacity: usize) -> Self {
        Self {
            panes: Mutex::new(Vec::new()),
            layout,
            capacity,
        }
    }

    /// A store holding the [`ROOT_PANE`] filled with `root_fill`.
    pub fn with_root(layout: CanvasLayout, capacity: usize, root_fill: Color) -> Result<Self, PaneError> {
        let store = Self::new(layout, capacity);
        store.try_create(ROOT_PANE, root_fill)?;
        Ok(store)
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Pane>> {
        self.panes.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn layout(&self) -> CanvasLayout {
        self.layout
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Add a pane filled with `fill`.
    ///
    /// # Panics
    ///
    /// If the store already holds `capacity` panes. Use
    /// [`try_create`](Self::try_create) for untrusted input.
    pub fn create(&self, name: &str, fill: Color) -> Result<(), PaneError> {
        match self.try_create(name, fill) {
            Err(PaneError::Full(capacity)) => panic!("pane capacity of {capacity} exceeded"),
            other => other,
        }
    }

    /// Add a pane filled with `fill`, or fail with [`PaneError::Full`].
    ///
    /// Name, duplicate and capacity checks run under one lock, in that order.
    pub fn try_create(&self, name: &str, fill: Color) -> Result<(), PaneError> {
        if name.is_empty() {
            return Err(PaneError::InvalidName);
        }
        let mut panes = self.lock();
        if panes.iter().any(|p| p.name == name) {
            return Err(PaneError::Duplicate(name.to_owned()));
        }
        if panes.len() >= self.capacity {
            return Err(PaneError::Full(self.capacity));
        }

        let mut canvas = Canvas::try_from_layout(self.layout).map_err(|err| {
            tracing::warn!(pane = name, error = %err, "canvas allocation failed");
            PaneError::OutOfMemory(name.to_owned())
        })?;
        raster::fill(&mut canvas, fill);
        panes.push(Pane {
            name: name.to_owned(),
            canvas,
        });
        tracing::debug!(pane = name, %fill, count = panes.len(), "pane created");
        Ok(())
    }

    /// Remove a pane, shifting later panes down one index.
    pub fn remove(&self, name: &str) -> Result<(), PaneError> {
        let mut panes = self.lock();
        let idx = position(&panes, name)?;
        panes.remove(idx);
        tracing::debug!(pane = name, count = panes.len(), "pane removed");
        Ok(())
    }

    /// Remove every pane.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Run `f` on the named pane's canvas under the lock.
    pub fn with_canvas_mut<R>(&self, name: &str, f: impl FnOnce(&mut Canvas) -> R) -> Result<R, PaneError> {
        let mut panes = self.lock();
        let idx = position(&panes, name)?;
        Ok(f(&mut panes[idx].canvas))
    }

    /// Read-only access to the named pane's canvas under the lock.
    pub fn with_canvas<R>(&self, name: &str, f: impl FnOnce(&Canvas) -> R) -> Result<R, PaneError> {
        let panes = self.lock();
        let idx = position(&panes, name)?;
        Ok(f(&panes[idx].canvas))
    }

    pub fn draw_rect(&self, name: &str, rect: &Rect, color: Color) -> Result<(), PaneError> {
        self.with_canvas_mut(name, |c| raster::draw_rect(c, rect, color))
    }

    pub fn draw_circle(&self, name: &str, circle: &Circle, color: Color) -> Result<(), PaneError> {
        self.with_canvas_mut(name, |c| raster::draw_circle(c, circle, color))
    }

    pub fn draw(&self, name: &str, shape: &Shape, color: Color) -> Result<(), PaneError> {
        tracing::trace!(pane = name, shape = shape.kind(), "draw");
        self.with_canvas_mut(name, |c| raster::draw_shape(c, shape, color))
    }

    pub fn fill(&self, name: &str, color: Color) -> Result<(), PaneError> {
        self.with_canvas_mut(name, |c| raster::fill(c, color))
    }

    pub fn copy_rect(&self, name: &str, copy: &RectCopy) -> Result<(), PaneError> {
        self.with_canvas_mut(name, |c| raster::copy_rect(c, copy))
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Pane names in rotation order.
    pub fn names(&self) -> Vec<String> {
        self.lock().iter().map(|p| p.name.clone()).collect()
    }

    /// Show the pane after the one `cursor` last showed.
    ///
    /// The lock is held while the backend copies the canvas. Returns the
    /// name shown, or `None` if the store is empty.
    pub fn show_next<B: DisplayBackend>(
        &self,
        cursor: &mut RotationCursor,
        backend: &mut B,
    ) -> Result<Option<String>, B::Error> {
        let panes = self.lock();
        let Some(idx) = cursor.next_index(panes.iter().map(|p| p.name.as_str())) else {
            return Ok(None);
        };
        let pane = &panes[idx];
        backend.show(&pane.canvas)?;
        cursor.record(&pane.name, idx);
        Ok(Some(pane.name.clone()))
    }
}

fn position(panes: &[Pane], name: &str) -> Result<usize, PaneError> {
    panes
        .iter()
        .position(|p| p.name == name)
        .ok_or_else(|| PaneError::NoSuchPane(name.to_owned()))
}

/// Where the rotation left off.
///
/// Remembers the last pane shown by name and index, so removing panes
/// between ticks neither skips nor repeats a survivor: the next pick is the
/// pane after the remembered one or, if that pane is gone, whichever pane
/// slid into its index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RotationCursor {
    last: Option<(String, usize)>,
}

impl RotationCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name of the last pane shown.
    pub fn last_shown(&self) -> Option<&str> {
        self.last.as_ref().map(|(name, _)| name.as_str())
    }

    /// Pick the index to show next among `names` (in store order).
    pub fn next_index<'a>(&self, mut names: impl ExactSizeIterator<Item = &'a str>) -> Option<usize> {
        let len = names.len();
        if len == 0 {
            return None;
        }
        let Some((last_name, last_idx)) = &self.last else {
            return Some(0);
        };
        match names.position(|n| n == last_name.as_str()) {
            Some(found) => Some((found + 1) % len),
            None if *last_idx < len => Some(*last_idx),
            None => Some(0),
        }
    }

    pub fn record(&mut self, name: &str, idx: usize) {
        match &mut self.last {
            Some((last_name, last_idx)) => {
                last_name.clear();
                last_name.push_str(name);
                *last_idx = idx;
            }
            None => self.last = Some((name.to_owned(), idx)),
        }
    }
}
