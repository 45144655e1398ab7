#![forbid(unsafe_code)]

//! SIGINT / SIGTERM as a termination request.

use std::io;
use std::os::fd::AsFd;
use std::thread;

use signal_hook::consts::signal::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;

use crate::cancellation::{CancellationSource, CancellationToken, wait_readable};

/// Signals that request an orderly shutdown.
pub const TERMINATION_SIGNALS: [i32; 2] = [SIGINT, SIGTERM];

/// Registered handler for the termination signals.
///
/// Once registered, SIGINT and SIGTERM no longer kill the process; they are
/// queued until [`wait`](Self::wait) picks them up.
#[derive(Debug)]
pub struct TerminationSignal {
    signals: Signals,
}

impl TerminationSignal {
    pub fn register() -> io::Result<Self> {
        let signals = Signals::new(TERMINATION_SIGNALS).map_err(io::Error::other)?;
        Ok(Self { signals })
    }

    /// Block until a termination signal arrives or `stop` is cancelled.
    ///
    /// Returns the signal number, or `None` if `stop` ended the wait. After
    /// `stop` has ended a wait, the handler is closed and later waits return
    /// `None` immediately.
    pub fn wait(&mut self, stop: &CancellationToken) -> io::Result<Option<i32>> {
        let done = CancellationSource::new()?;
        let done_token = done.token();
        let handle = self.signals.handle();
        let signals = &mut self.signals;

        thread::scope(|scope| {
            scope.spawn(|| {
                // Closing the handle ends `forever()` below.
                match wait_readable(&[stop.as_fd(), done_token.as_fd()], None) {
                    Ok(ready) if ready[0] => handle.close(),
                    Ok(_) => {}
                    Err(err) => {
                        tracing::error!(error = %err, "termination watcher poll failed");
                        handle.close();
                    }
                }
            });

            let received = signals.forever().next();
            done.cancel();
            match received {
                Some(signal) => tracing::info!(signal, "termination signal received"),
                None => tracing::debug!("termination wait ended without a signal"),
            }
            Ok(received)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn cancelled_stop_ends_wait() {
        let mut term = TerminationSignal::register().unwrap();
        let stop = CancellationSource::new().unwrap();
        let token = stop.token();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            stop.cancel();
        });
        let start = Instant::now();
        assert_eq!(term.wait(&token).unwrap(), None);
        assert!(start.elapsed() < Duration::from_secs(5));
        canceller.join().unwrap();
    }
}
