#![forbid(unsafe_code)]
#![doc = "Display backend boundary for kmspane."]
#![doc = ""]
#![doc = "This crate defines the contract between the pane runtime and whatever puts"]
#![doc = "pixels on a screen: the kernel mode-setting backend in `kmspane-drm`, or the"]
#![doc = "in-memory [`HeadlessBackend`] used for tests and display-less runs."]

use core::fmt;

use kmspane_render::{Canvas, CanvasLayout};

pub mod headless;

pub use headless::{FrameLog, HeadlessBackend, HeadlessError, ShownFrame};

/// Default bound on consecutive busy page flips before a backend gives up.
pub const DEFAULT_MAX_BUSY_RETRIES: u32 = 100_000;

/// A display mode: active resolution and vertical refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModeInfo {
    pub width: u16,
    pub height: u16,
    /// Vertical refresh in Hz.
    pub refresh: u32,
}

impl ModeInfo {
    pub const fn new(width: u16, height: u16, refresh: u32) -> Self {
        Self {
            width,
            height,
            refresh,
        }
    }
}

impl fmt::Display for ModeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} @ {}Hz", self.width, self.height, self.refresh)
    }
}

/// Snapshot of what a backend is driving, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusReport {
    pub crtc: u32,
    pub plane: u32,
    /// Id of the buffer currently scanned out.
    pub front: u32,
    /// Id of the buffer the next frame is written into.
    pub back: u32,
    pub mode: ModeInfo,
}

impl StatusReport {
    /// The four human-readable status lines, in display order.
    pub fn lines(&self) -> [String; 4] {
        [
            format!("CRTC:\t{}", self.crtc),
            format!("Plane:\t{}", self.plane),
            format!("Buffer:\t{} (front), {} (back)", self.front, self.back),
            format!("Mode:\t{}", self.mode),
        ]
    }

    /// Write the status lines to the diagnostic stream.
    pub fn emit(&self) {
        for line in self.lines() {
            tracing::info!(target: "kmspane::status", "{line}");
        }
    }
}

/// Scanout abstraction.
///
/// A backend owns a pair of scanout buffers. [`show`](Self::show) copies a
/// canvas into the one that is not being displayed and makes it visible.
/// Backends are moved into the rotation thread, hence `Send`.
pub trait DisplayBackend: Send {
    /// Platform-specific error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// The active display mode.
    fn mode(&self) -> ModeInfo;

    /// Geometry of the scanout buffers. Canvases built from this layout can
    /// be copied into scanout memory byte-for-byte.
    fn canvas_layout(&self) -> CanvasLayout;

    /// Current diagnostic snapshot.
    fn status(&self) -> StatusReport;

    /// Allocate a zeroed canvas matching [`canvas_layout`](Self::canvas_layout).
    fn new_canvas(&self) -> Canvas {
        Canvas::from_layout(self.canvas_layout())
    }

    /// Emit the status lines. Never fails.
    fn log_status(&self) {
        self.status().emit();
    }

    /// Copy `canvas` into the back buffer, flip it to the screen, and swap
    /// buffer roles.
    ///
    /// At most the back buffer's length is copied; a shorter canvas leaves
    /// the remainder of the back buffer as it was.
    fn show(&mut self, canvas: &Canvas) -> Result<(), Self::Error>;

    /// Release every display resource in reverse acquisition order.
    fn shutdown(self) -> Result<(), Self::Error>
    where
        Self: Sized;
}

/// Two slots with a front/back role that swaps on demand.
///
/// The roles always refer to different slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoubleBuffer<T> {
    slots: [T; 2],
    front: usize,
}

impl<T> DoubleBuffer<T> {
    pub fn new(front: T, back: T) -> Self {
        Self {
            slots: [front, back],
            front: 0,
        }
    }

    #[inline]
    pub fn front(&self) -> &T {
        &self.slots[self.front]
    }

    #[inline]
    pub fn back(&self) -> &T {
        &self.slots[1 - self.front]
    }

    #[inline]
    pub fn back_mut(&mut self) -> &mut T {
        &mut self.slots[1 - self.front]
    }

    /// Exchange the roles of the two slots.
    #[inline]
    pub fn swap(&mut self) {
        self.front = 1 - self.front;
    }

    /// Split into `(front, back)`.
    pub fn into_parts(self) -> (T, T) {
        let [a, b] = self.slots;
        if self.front == 0 { (a, b) } else { (b, a) }
    }
}

/// Copy as much of `canvas` as fits into `dst`. Returns the bytes copied.
pub fn copy_canvas_into(dst: &mut [u8], canvas: &Canvas) -> usize {
    let n = dst.len().min(canvas.as_bytes().len());
    dst[..n].copy_from_slice(&canvas.as_bytes()[..n]);
    n
}
