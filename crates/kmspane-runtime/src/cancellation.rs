//! Pipe-backed cancellation tokens for the worker threads.
//!
//! [`CancellationSource::cancel`] writes one byte into a pipe that nobody
//! ever reads, so the read end stays readable forever after. Any thread
//! can therefore block in `poll(2)` on the read end, alongside other file
//! descriptors, and wake immediately on cancellation, including waits that
//! start after the fact.
//!
//! # Example
//!
//! ```
//! use kmspane_runtime::cancellation::CancellationSource;
//! use std::time::Duration;
//!
//! let source = CancellationSource::new().unwrap();
//! let token = source.token();
//!
//! let worker = std::thread::spawn(move || {
//!     let mut ticks = 0;
//!     while !token.wait_timeout(Duration::from_millis(5)) {
//!         ticks += 1;
//!     }
//!     ticks
//! });
//!
//! source.cancel();
//! worker.join().unwrap();
//! ```

#![forbid(unsafe_code)]

use std::io;
use std::os::fd::{AsFd, BorrowedFd, OwnedFd};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};

/// A cloneable view of a cancellation pipe.
#[derive(Clone, Debug)]
pub struct CancellationToken {
    inner: Arc<CancellationInner>,
}

/// The control side of a cancellation pipe.
///
/// Clones share the same pipe. Dropping a source does **not** cancel.
#[derive(Clone, Debug)]
pub struct CancellationSource {
    inner: Arc<CancellationInner>,
}

#[derive(Debug)]
struct CancellationInner {
    cancelled: AtomicBool,
    read: OwnedFd,
    write: OwnedFd,
}

impl CancellationSource {
    /// Create the pipe. Fails only if the process is out of descriptors.
    pub fn new() -> io::Result<Self> {
        let (read, write) = nix::unistd::pipe().map_err(io::Error::from)?;
        Ok(Self {
            inner: Arc::new(CancellationInner {
                cancelled: AtomicBool::new(false),
                read,
                write,
            }),
        })
    }

    pub fn token(&self) -> CancellationToken {
        CancellationToken {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Signal cancellation. Idempotent.
    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Err(err) = nix::unistd::write(&self.inner.write, &[0u8]) {
            // The flag is set, so `is_cancelled` still observes it; only
            // blocked pollers would miss the wakeup.
            tracing::error!(error = %err, "failed to write cancellation pipe");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }
}

impl CancellationToken {
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Block until cancelled or `timeout` elapses.
    ///
    /// Returns `true` if cancelled, `false` on timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        if self.is_cancelled() {
            return true;
        }
        match wait_readable(&[self.as_fd()], Some(timeout)) {
            Ok(ready) => ready[0] || self.is_cancelled(),
            Err(err) => {
                tracing::error!(error = %err, "poll on cancellation pipe failed");
                self.is_cancelled()
            }
        }
    }

    /// Block until cancelled.
    pub fn wait(&self) {
        while !self.is_cancelled() {
            if let Err(err) = wait_readable(&[self.as_fd()], None) {
                tracing::error!(error = %err, "poll on cancellation pipe failed");
                return;
            }
        }
    }
}

impl AsFd for CancellationToken {
    /// The read end of the pipe; readable once cancelled.
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.inner.read.as_fd()
    }
}

/// Poll `fds` for readability until at least one is ready or `timeout`
/// elapses (`None` waits indefinitely).
///
/// Interrupted polls are restarted with the remaining time. Returns one flag
/// per descriptor; all `false` means the timeout expired. Hang-up and error
/// conditions count as ready so the caller's next read reports them.
pub fn wait_readable(fds: &[BorrowedFd<'_>], timeout: Option<Duration>) -> io::Result<Vec<bool>> {
    let deadline = timeout.map(|t| Instant::now() + t);
    let ready_mask = PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR;

    loop {
        let mut pollfds: Vec<PollFd<'_>> = fds
            .iter()
            .map(|fd| PollFd::new(*fd, PollFlags::POLLIN))
            .collect();

        let poll_timeout = match deadline {
            None => PollTimeout::NONE,
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                let ms = remaining.as_millis().min(u128::from(u16::MAX)) as u16;
                // Round sub-millisecond remainders up so we never spin.
                let ms = if ms == 0 && !remaining.is_zero() { 1 } else { ms };
                PollTimeout::from(ms)
            }
        };

        match poll(&mut pollfds, poll_timeout) {
            Ok(0) => {
                if deadline.is_some_and(|d| Instant::now() >= d) {
                    return Ok(vec![false; fds.len()]);
                }
            }
            Ok(_) => {
                return Ok(pollfds
                    .iter()
                    .map(|p| p.revents().is_some_and(|r| r.intersects(ready_mask)))
                    .collect());
            }
            Err(Errno::EINTR) => {}
            Err(err) => return Err(err.into()),
        }
    }
}
