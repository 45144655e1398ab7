#![forbid(unsafe_code)]

//! In-memory display backend.
//!
//! [`HeadlessBackend`] behaves like a double-buffered scanout device without
//! touching hardware: `show` copies into the back buffer, "flips" by swapping
//! roles, and appends a copy of the now-front buffer to a shared
//! [`FrameLog`]. Tests keep a clone of the log to observe what the rotation
//! thread displayed.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use kmspane_render::{Canvas, CanvasLayout};

use crate::{DisplayBackend, DoubleBuffer, ModeInfo, StatusReport, copy_canvas_into};

/// Pseudo object ids reported by [`DisplayBackend::status`].
const HEADLESS_CRTC: u32 = 1;
const HEADLESS_PLANE: u32 = 2;
const FIRST_BUFFER_ID: u32 = 10;

/// One displayed frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShownFrame {
    /// Position in the sequence of all frames shown, starting at 0.
    pub seq: u64,
    /// Id of the buffer that was flipped to the screen.
    pub buffer: u32,
    pub canvas: Canvas,
}

#[derive(Debug, Default)]
struct FrameLogState {
    frames: VecDeque<ShownFrame>,
    total: u64,
}

#[derive(Debug)]
struct FrameLogInner {
    state: Mutex<FrameLogState>,
    grew: Condvar,
    capacity: Option<usize>,
}

/// Shared record of frames a [`HeadlessBackend`] has shown.
///
/// Cloning yields another handle to the same log.
#[derive(Debug, Clone)]
pub struct FrameLog {
    inner: Arc<FrameLogInner>,
}

impl Default for FrameLog {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameLog {
    /// Keep every frame.
    pub fn new() -> Self {
        Self::with_capacity(None)
    }

    /// Keep only the most recent `capacity` frames. The total count still
    /// includes evicted frames.
    pub fn bounded(capacity: usize) -> Self {
        Self::with_capacity(Some(capacity.max(1)))
    }

    fn with_capacity(capacity: Option<usize>) -> Self {
        Self {
            inner: Arc::new(FrameLogInner {
                state: Mutex::new(FrameLogState::default()),
                grew: Condvar::new(),
                capacity,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FrameLogState> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn push(&self, buffer: u32, canvas: Canvas) {
        let mut state = self.lock();
        let seq = state.total;
        state.frames.push_back(ShownFrame {
            seq,
            buffer,
            canvas,
        });
        state.total += 1;
        if let Some(cap) = self.inner.capacity {
            while state.frames.len() > cap {
                state.frames.pop_front();
            }
        }
        drop(state);
        self.inner.grew.notify_all();
    }

    /// Number of frames shown so far, evicted ones included.
    pub fn total(&self) -> u64 {
        self.lock().total
    }

    /// Retained frames, oldest first.
    pub fn frames(&self) -> Vec<ShownFrame> {
        self.lock().frames.iter().cloned().collect()
    }

    pub fn last(&self) -> Option<ShownFrame> {
        self.lock().frames.back().cloned()
    }

    /// Block until at least `count` frames have been shown or `timeout`
    /// elapses. Returns whether the count was reached.
    pub fn wait_for(&self, count: u64, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        while state.total < count {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            state = match self.inner.grew.wait_timeout(state, remaining) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        true
    }
}

/// Failures a headless backend can report.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HeadlessError {
    /// Injected through [`HeadlessBackend::fail_after`].
    #[error("headless flip failed on frame {frame}")]
    InjectedFlip { frame: u64 },
}

#[derive(Debug)]
struct Slot {
    id: u32,
    bytes: Vec<u8>,
}

/// Double-buffered backend that keeps frames in memory.
#[derive(Debug)]
pub struct HeadlessBackend {
    mode: ModeInfo,
    layout: CanvasLayout,
    buffers: DoubleBuffer<Slot>,
    log: FrameLog,
    shown: u64,
    fail_at: Option<u64>,
}

impl HeadlessBackend {
    /// Packed buffers sized for `mode`, recording into a fresh log.
    pub fn new(mode: ModeInfo) -> Self {
        Self::with_log(mode, FrameLog::new())
    }

    pub fn with_log(mode: ModeInfo, log: FrameLog) -> Self {
        Self::with_layout(mode, CanvasLayout::packed(mode.width, mode.height), log)
    }

    /// Buffers with an explicit (possibly pitched) layout.
    pub fn with_layout(mode: ModeInfo, layout: CanvasLayout, log: FrameLog) -> Self {
        let slot = |id| Slot {
            id,
            bytes: vec![0; layout.len],
        };
        Self {
            mode,
            layout,
            buffers: DoubleBuffer::new(slot(FIRST_BUFFER_ID), slot(FIRST_BUFFER_ID + 1)),
            log,
            shown: 0,
            fail_at: None,
        }
    }

    /// Make the `frame`-th call to `show` (0-based) fail.
    pub fn fail_after(mut self, frame: u64) -> Self {
        self.fail_at = Some(frame);
        self
    }

    /// Another handle to this backend's frame log.
    pub fn frame_log(&self) -> FrameLog {
        self.log.clone()
    }
}

impl DisplayBackend for HeadlessBackend {
    type Error = HeadlessError;

    fn mode(&self) -> ModeInfo {
        self.mode
    }

    fn canvas_layout(&self) -> CanvasLayout {
        self.layout
    }

    fn status(&self) -> StatusReport {
        StatusReport {
            crtc: HEADLESS_CRTC,
            plane: HEADLESS_PLANE,
            front: self.buffers.front().id,
            back: self.buffers.back().id,
            mode: self.mode,
        }
    }

    fn show(&mut self, canvas: &Canvas) -> Result<(), HeadlessError> {
        let frame = self.shown;
        if self.fail_at == Some(frame) {
            return Err(HeadlessError::InjectedFlip { frame });
        }

        copy_canvas_into(&mut self.buffers.back_mut().bytes, canvas);
        self.buffers.swap();
        self.shown += 1;

        let front = self.buffers.front();
        let mut shown = Canvas::from_layout(self.layout);
        shown.as_bytes_mut().copy_from_slice(&front.bytes);
        tracing::trace!(frame, buffer = front.id, "headless flip");
        self.log.push(front.id, shown);
        Ok(())
    }

    fn shutdown(self) -> Result<(), HeadlessError> {
        tracing::debug!(frames = self.shown, "headless backend released");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kmspane_render::Color;
    use kmspane_render::raster::fill;

    fn small() -> HeadlessBackend {
        HeadlessBackend::new(ModeInfo::new(4, 2, 60))
    }

    #[test]
    fn show_records_frame_and_swaps() {
        let mut backend = small();
        let log = backend.frame_log();
        let before = backend.status();

        let mut canvas = backend.new_canvas();
        fill(&mut canvas, Color::WHITE);
        backend.show(&canvas).unwrap();

        let after = backend.status();
        assert_eq!(after.front, before.back);
        assert_eq!(after.back, before.front);
        assert_ne!(after.front, after.back);

        let frame = log.last().unwrap();
        assert_eq!(frame.seq, 0);
        assert_eq!(frame.buffer, after.front);
        assert_eq!(frame.canvas, canvas);
    }

    #[test]
    fn short_canvas_leaves_tail() {
        let mut backend = small();
        let log = backend.frame_log();
        let mut full = backend.new_canvas();
        fill(&mut full, Color::WHITE);
        backend.show(&full).unwrap();
        backend.show(&full).unwrap();

        let mut short = Canvas::new_bgra(4, 1);
        fill(&mut short, Color::BLACK);
        backend.show(&short).unwrap();

        let shown = log.last().unwrap().canvas;
        assert!(shown.pixel_is(0, 0, Color::BLACK));
        assert!(shown.pixel_is(0, 1, Color::WHITE));
    }

    #[test]
    fn injected_failure_keeps_roles() {
        let mut backend = small().fail_after(1);
        let canvas = backend.new_canvas();
        backend.show(&canvas).unwrap();
        let before = backend.status();
        assert_eq!(
            backend.show(&canvas),
            Err(HeadlessError::InjectedFlip { frame: 1 })
        );
        assert_eq!(backend.status(), before);
    }

    #[test]
    fn bounded_log_counts_evicted_frames() {
        let log = FrameLog::bounded(2);
        let mut backend = HeadlessBackend::with_log(ModeInfo::new(1, 1, 60), log.clone());
        let canvas = backend.new_canvas();
        for _ in 0..5 {
            backend.show(&canvas).unwrap();
        }
        assert_eq!(log.total(), 5);
        let seqs: Vec<u64> = log.frames().iter().map(|f| f.seq).collect();
        assert_eq!(seqs, vec![3, 4]);
    }

    #[test]
    fn wait_for_times_out_without_frames() {
        let log = FrameLog::new();
        assert!(!log.wait_for(1, Duration::from_millis(10)));
        assert!(log.wait_for(0, Duration::ZERO));
    }

    #[test]
    fn pitched_layout_is_preserved() {
        let layout = CanvasLayout::pitched(2, 2, 16, 0);
        let backend = HeadlessBackend::with_layout(ModeInfo::new(2, 2, 60), layout, FrameLog::new());
        let canvas = backend.new_canvas();
        assert_eq!(canvas.stride(), 16);
        assert!(!canvas.is_packed());
    }
}
