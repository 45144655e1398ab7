#![forbid(unsafe_code)]

//! The pane rotation loop and its dedicated thread.
//!
//! Each tick shows one pane, then waits out the interval on the
//! cancellation pipe. The thread owns the display backend for its whole
//! life and hands it back through [`RotationThread::join`], so teardown
//! happens on the thread that started the session.
//!
//! A display error ends the loop and cancels the shared source, which wakes
//! every other participant (including the termination wait) so the process
//! can shut down cleanly.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use kmspane_backend::DisplayBackend;

use crate::cancellation::{CancellationSource, CancellationToken};
use crate::lifecycle::LifecycleError;
use crate::pane_store::{PaneStore, RotationCursor};

pub const ROTATION_THREAD_NAME: &str = "kmspane-rotation";

/// Time each pane stays on screen unless configured otherwise.
pub const DEFAULT_ROTATION_INTERVAL: Duration = Duration::from_secs(1);

/// Counters for a finished rotation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RotationStats {
    /// Ticks started, including ones that found no pane to show.
    pub ticks: u64,
    /// Frames successfully shown.
    pub shown: u64,
}

/// What the rotation loop returns: the backend, always, plus how it ended.
pub struct RotationOutcome<B: DisplayBackend> {
    pub backend: B,
    pub stats: RotationStats,
    pub result: Result<(), B::Error>,
}

impl<B: DisplayBackend> std::fmt::Debug for RotationOutcome<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RotationOutcome")
            .field("stats", &self.stats)
            .field("result", &self.result.as_ref().map_err(|e| e.to_string()))
            .finish_non_exhaustive()
    }
}

/// Run the rotation on the current thread until `token` is cancelled or
/// the backend fails.
pub fn run_rotation<B: DisplayBackend>(
    mut backend: B,
    store: &PaneStore,
    token: &CancellationToken,
    interval: Duration,
) -> RotationOutcome<B> {
    let _span = tracing::info_span!("rotation", interval_ms = interval.as_millis() as u64).entered();

    let mut cursor = RotationCursor::new();
    let mut stats = RotationStats::default();

    while !token.is_cancelled() {
        stats.ticks += 1;
        match store.show_next(&mut cursor, &mut backend) {
            Ok(Some(name)) => {
                stats.shown += 1;
                tracing::trace!(tick = stats.ticks, pane = %name, "shown");
            }
            Ok(None) => tracing::trace!(tick = stats.ticks, "no panes to show"),
            Err(err) => {
                tracing::error!(tick = stats.ticks, error = %err, "display failed; stopping rotation");
                return RotationOutcome {
                    backend,
                    stats,
                    result: Err(err),
                };
            }
        }
        if token.wait_timeout(interval) {
            break;
        }
    }

    tracing::debug!(ticks = stats.ticks, shown = stats.shown, "rotation stopped");
    RotationOutcome {
        backend,
        stats,
        result: Ok(()),
    }
}

/// Handle to the rotation thread.
#[derive(Debug)]
pub struct RotationThread<B: DisplayBackend + 'static> {
    handle: JoinHandle<RotationOutcome<B>>,
}

impl<B: DisplayBackend + 'static> RotationThread<B> {
    /// Move `backend` onto a new rotation thread.
    ///
    /// The thread watches `source`'s token and cancels `source` itself if
    /// the backend fails.
    pub fn spawn(
        backend: B,
        store: Arc<PaneStore>,
        source: CancellationSource,
        interval: Duration,
    ) -> io::Result<Self> {
        let handle = thread::Builder::new()
            .name(ROTATION_THREAD_NAME.into())
            .spawn(move || {
                let token = source.token();
                let outcome = run_rotation(backend, &store, &token, interval);
                if outcome.result.is_err() {
                    source.cancel();
                }
                outcome
            })?;
        Ok(Self { handle })
    }

    /// Wait for the thread and take the backend back.
    pub fn join(self) -> Result<RotationOutcome<B>, LifecycleError> {
        self.handle.join().map_err(|_| LifecycleError::ThreadPanicked {
            thread: ROTATION_THREAD_NAME,
        })
    }
}
