#![forbid(unsafe_code)]

//! Page-flip retry policy.

use std::io;

use nix::errno::Errno;

use crate::DrmError;

pub use kmspane_backend::DEFAULT_MAX_BUSY_RETRIES;

/// Whether `err` means "a flip is already pending, try again".
#[inline]
pub fn is_busy(err: &io::Error) -> bool {
    err.raw_os_error() == Some(Errno::EBUSY as i32)
}

/// Call `flip` until it succeeds.
///
/// Busy results are retried after yielding the thread, at most
/// `max_busy_retries` times. Returns how many busy results were seen. Any
/// other error is returned at once as [`DrmError::Flip`].
pub fn flip_with_retry<F>(mut flip: F, max_busy_retries: u32) -> Result<u32, DrmError>
where
    F: FnMut() -> io::Result<()>,
{
    let mut busy = 0u32;
    loop {
        match flip() {
            Ok(()) => return Ok(busy),
            Err(err) if is_busy(&err) => {
                if busy >= max_busy_retries {
                    return Err(DrmError::FlipStalled {
                        attempts: u64::from(busy) + 1,
                    });
                }
                busy += 1;
                std::thread::yield_now();
            }
            Err(err) => return Err(DrmError::Flip(err)),
        }
    }
}
