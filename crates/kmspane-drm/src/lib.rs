#![forbid(unsafe_code)]
#![doc = "Kernel mode-setting display backend for kmspane."]
#![doc = ""]
#![doc = "Implements `kmspane_backend::DisplayBackend` on a DRM card using two dumb"]
#![doc = "buffers and legacy page flips. The device is used as-is: whatever mode the"]
#![doc = "first active CRTC is running becomes the canvas size."]
#![doc = ""]
#![doc = "Pure policy pieces (card discovery, pitch validation, flip retry) live in"]
#![doc = "their own modules so they can be tested without a GPU."]

pub mod backend;
pub mod card;
mod error;
pub mod flip;
pub mod scanout;

pub use backend::{DrmBackend, DrmOptions};
pub use card::{Card, find_card_in};
pub use error::DrmError;
pub use flip::{DEFAULT_MAX_BUSY_RETRIES, flip_with_retry};
pub use scanout::validate_pitch;
