//! Property-based invariant tests for the hardware-free DRM policies.
//!
//! 1. Busy flips are retried exactly up to the bound, then stall.
//! 2. The flip closure is called once per attempt, never more.
//! 3. A pitch is accepted iff it holds one row of 32-bit pixels.

use std::io;

use kmspane_drm::{DrmError, flip_with_retry, validate_pitch};
use nix::errno::Errno;
use proptest::prelude::*;

fn busy() -> io::Error {
    io::Error::from_raw_os_error(Errno::EBUSY as i32)
}

// ═════════════════════════════════════════════════════════════════════════
// 1-2. Busy retry accounting
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn busy_retries_are_bounded(busy_results in 0u32..200, max in 0u32..200) {
        let mut calls = 0u32;
        let result = flip_with_retry(
            || {
                calls += 1;
                if calls <= busy_results { Err(busy()) } else { Ok(()) }
            },
            max,
        );

        if busy_results <= max {
            prop_assert_eq!(result.ok(), Some(busy_results));
            prop_assert_eq!(calls, busy_results + 1);
        } else {
            match result {
                Err(DrmError::FlipStalled { attempts }) => {
                    prop_assert_eq!(attempts, u64::from(max) + 1);
                }
                other => prop_assert!(false, "expected stall, got {:?}", other),
            }
            prop_assert_eq!(calls, max + 1);
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3. Pitch validation
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn pitch_holds_a_row(pitch in any::<u32>(), width in any::<u16>()) {
        let needed = (u32::from(width) * 4).max(4);
        match validate_pitch(pitch, width) {
            Ok(p) => {
                prop_assert_eq!(p, pitch);
                prop_assert!(pitch >= needed);
            }
            Err(DrmError::InvalidPitch { pitch: p, width: w }) => {
                prop_assert_eq!((p, w), (pitch, width));
                prop_assert!(pitch < needed);
            }
            Err(other) => prop_assert!(false, "unexpected error {:?}", other),
        }
    }
}
