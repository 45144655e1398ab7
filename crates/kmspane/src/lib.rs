#![forbid(unsafe_code)]

//! kmspane public facade.
//!
//! Re-exports the pieces most callers need from the member crates and
//! hosts the `kmspane` command-line front end.

pub mod cli;
pub mod error;
pub mod logging;

pub use cli::run_from_env;
pub use error::{AppError, Result};

// --- Render re-exports ------------------------------------------------------

pub use kmspane_render::{
    Bezier2, Canvas, CanvasLayout, Circle, Color, Line, Rect, RectCopy, Shape, Triangle,
};

// --- Backend re-exports -----------------------------------------------------

pub use kmspane_backend::{DisplayBackend, FrameLog, HeadlessBackend, ModeInfo, StatusReport};
pub use kmspane_drm::{DrmBackend, DrmError, DrmOptions};

// --- Runtime re-exports -----------------------------------------------------

pub use kmspane_runtime::{
    CancellationSource, CancellationToken, CommandReader, CommandTable, Lifecycle,
    LifecycleReport, PaneError, PaneStore, RuntimeConfig, TerminationSignal,
};
