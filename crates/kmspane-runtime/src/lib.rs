#![forbid(unsafe_code)]

//! Pane store, rotation loop, command input, and process lifecycle.
//!
//! # Role in kmspane
//! `kmspane-runtime` owns everything between the pixels and the display:
//! the named panes, the thread that cycles through them, the line-command
//! reader that draws into them, and the start/stop choreography.
//!
//! # Threads
//! - **rotation**: owns the [`DisplayBackend`](kmspane_backend::DisplayBackend),
//!   shows one pane per interval.
//! - **commands** (optional): reads lines, mutates the [`PaneStore`].
//! - **caller**: blocks in the termination wait, usually
//!   [`TerminationSignal::wait`].
//!
//! All three share one [`CancellationSource`]. Cancelling it, from a signal
//! or from a failed page flip, wakes every blocked participant.

pub mod cancellation;
pub mod command;
pub mod config;
pub mod lifecycle;
pub mod pane_store;
pub mod rotation;
pub mod signals;

pub use cancellation::{CancellationSource, CancellationToken};
pub use command::{CommandError, CommandReader, CommandTable};
pub use config::{ConfigError, HeadlessConfig, RuntimeConfig};
pub use lifecycle::{Lifecycle, LifecycleError, LifecycleReport};
pub use pane_store::{DEFAULT_MAX_PANES, PaneError, PaneStore, ROOT_PANE, RotationCursor};
pub use rotation::{DEFAULT_ROTATION_INTERVAL, RotationStats, RotationThread, run_rotation};
pub use signals::TerminationSignal;
