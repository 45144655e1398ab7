#![forbid(unsafe_code)]

//! Process lifecycle: start the workers, wait for termination, tear down.
//!
//! ```text
//! log status → cancellation pipe → rotation thread (+ command reader)
//!   → wait_for_termination → cancel → join → clear panes → backend.shutdown()
//! ```
//!
//! The termination wait receives a token of the same cancellation pipe the
//! workers watch, so a fatal display error ends the wait as well.

use std::error::Error as StdError;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use kmspane_backend::DisplayBackend;

use crate::cancellation::{CancellationSource, CancellationToken};
use crate::command::{CommandReader, CommandThread};
use crate::pane_store::PaneStore;
use crate::rotation::{RotationStats, RotationThread};

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("failed to create cancellation pipe: {0}")]
    Pipe(#[source] io::Error),

    #[error("failed to spawn {thread} thread: {source}")]
    Spawn {
        thread: &'static str,
        source: io::Error,
    },

    #[error("{thread} thread panicked")]
    ThreadPanicked { thread: &'static str },

    #[error("command input failed: {0}")]
    Input(#[source] io::Error),

    #[error("waiting for termination failed: {0}")]
    Wait(#[source] io::Error),

    #[error("display failed: {0}")]
    Display(#[source] BoxError),

    #[error("display teardown failed: {0}")]
    Shutdown(#[source] BoxError),
}

/// Summary of a completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LifecycleReport {
    pub rotation: RotationStats,
    /// Commands processed by the reader, if one was attached.
    pub commands: u64,
}

/// Wires a backend, a pane store, and optional command input together.
pub struct Lifecycle<B: DisplayBackend + 'static> {
    backend: B,
    store: Arc<PaneStore>,
    interval: Duration,
    commands: Option<CommandReader>,
}

impl<B: DisplayBackend + 'static> Lifecycle<B> {
    pub fn new(backend: B, store: Arc<PaneStore>, interval: Duration) -> Self {
        Self {
            backend,
            store,
            interval,
            commands: None,
        }
    }

    /// Serve line commands from `reader` while running.
    pub fn with_commands(mut self, reader: CommandReader) -> Self {
        self.commands = Some(reader);
        self
    }

    /// Run until `wait_for_termination` returns.
    ///
    /// Teardown runs on every exit path once the rotation has started.
    /// Errors are reported afterwards, first match wins: termination wait,
    /// command input, display, teardown.
    pub fn run<W>(self, wait_for_termination: W) -> Result<LifecycleReport, LifecycleError>
    where
        W: FnOnce(&CancellationToken) -> io::Result<()>,
    {
        let Self {
            backend,
            store,
            interval,
            commands,
        } = self;

        backend.log_status();
        let source = CancellationSource::new().map_err(LifecycleError::Pipe)?;

        let rotation = RotationThread::spawn(backend, Arc::clone(&store), source.clone(), interval)
            .map_err(|source| LifecycleError::Spawn {
                thread: crate::rotation::ROTATION_THREAD_NAME,
                source,
            })?;

        let commands = match commands.map(|reader| reader.spawn(Arc::clone(&store), source.token())) {
            Some(Ok(handle)) => Some(handle),
            Some(Err(err)) => {
                source.cancel();
                if let Err(teardown_err) = teardown(rotation, &store) {
                    tracing::error!(error = %teardown_err, "teardown after failed command spawn");
                }
                return Err(LifecycleError::Spawn {
                    thread: crate::command::COMMAND_THREAD_NAME,
                    source: err,
                });
            }
            None => None,
        };

        let waited = wait_for_termination(&source.token());
        tracing::info!("termination requested; shutting down");
        source.cancel();

        let commands_joined = commands.map(CommandThread::join);
        let torn_down = teardown(rotation, &store);

        waited.map_err(LifecycleError::Wait)?;
        let commands_seen = commands_joined.transpose()?.unwrap_or(0);
        let stats = torn_down?;

        Ok(LifecycleReport {
            rotation: stats,
            commands: commands_seen,
        })
    }
}

/// Join the rotation, drop every pane, then release the display.
///
/// Panes are cleared even when the rotation thread panicked. A display
/// error outranks a shutdown error.
fn teardown<B: DisplayBackend + 'static>(
    rotation: RotationThread<B>,
    store: &PaneStore,
) -> Result<RotationStats, LifecycleError> {
    let joined = rotation.join();
    store.clear();
    let outcome = joined?;
    let shutdown = outcome.backend.shutdown();

    outcome
        .result
        .map_err(|err| LifecycleError::Display(Box::new(err)))?;
    shutdown.map_err(|err| LifecycleError::Shutdown(Box::new(err)))?;
    Ok(outcome.stats)
}
