#![forbid(unsafe_code)]

use std::io;
use std::path::PathBuf;

/// Failures acquiring, driving, or releasing the display.
///
/// Every variant is fatal to the display session; only busy page flips are
/// retried, and those never surface here unless the retry bound runs out.
#[derive(Debug, thiserror::Error)]
pub enum DrmError {
    #[error("failed to read device directory {}: {source}", path.display())]
    DeviceDir { path: PathBuf, source: io::Error },

    #[error("no card device found in {}", dir.display())]
    NoCard { dir: PathBuf },

    #[error("failed to open device {}: {source}", path.display())]
    Open { path: PathBuf, source: io::Error },

    #[error("failed to query dumb buffer capability: {0}")]
    CapabilityQuery(#[source] io::Error),

    #[error("device doesn't support dumb buffers")]
    DumbBuffersUnsupported,

    #[error("could not enable universal planes: {0}")]
    UniversalPlanes(#[source] io::Error),

    #[error("failed to query {what}: {source}")]
    Query {
        what: &'static str,
        source: io::Error,
    },

    #[error("no connected connector with a mode")]
    NoConnector,

    #[error("no CRTC with a valid mode")]
    NoCrtc,

    #[error("no primary plane on CRTC {crtc}")]
    NoPrimaryPlane { crtc: u32 },

    #[error("plane {plane} has no type property")]
    MissingPlaneType { plane: u32 },

    #[error("failed to create dumb buffer {index}: {source}")]
    CreateBuffer { index: usize, source: io::Error },

    #[error("failed to register framebuffer {index}: {source}")]
    AddFramebuffer { index: usize, source: io::Error },

    #[error("failed to map buffer {index}: {source}")]
    Map { index: usize, source: io::Error },

    #[error("buffer pitch {pitch} too small for {width} pixels per row")]
    InvalidPitch { pitch: u32, width: u16 },

    #[error("page flip failed: {0}")]
    Flip(#[source] io::Error),

    #[error("page flip still busy after {attempts} attempts")]
    FlipStalled { attempts: u64 },

    #[error("failed to release {what}: {source}")]
    Release {
        what: &'static str,
        source: io::Error,
    },

    #[error("display session already released")]
    Released,
}
