#![forbid(unsafe_code)]

//! Raw RGBA dumps of packed canvases.
//!
//! The dump is the pixel bytes with B and R swapped, no header, row after
//! row. Only packed canvases can be dumped; a pitched canvas would leak
//! row padding into the output.

use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::canvas::{BYTES_PER_PIXEL, Canvas};

#[derive(Debug)]
pub enum DumpError {
    /// The canvas stride is not `width * 4`.
    NotPacked { width: u16, stride: u32 },
    Io(io::Error),
}

impl fmt::Display for DumpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotPacked { width, stride } => write!(
                f,
                "canvas is not packed (width {width}, stride {stride} bytes)"
            ),
            Self::Io(err) => write!(f, "dump I/O error: {err}"),
        }
    }
}

impl std::error::Error for DumpError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::NotPacked { .. } => None,
        }
    }
}

impl From<io::Error> for DumpError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

/// Stream `canvas` to `out` as RGBA.
pub fn write_rgba<W: Write>(canvas: &Canvas, out: &mut W) -> Result<(), DumpError> {
    if !canvas.is_packed() {
        return Err(DumpError::NotPacked {
            width: canvas.width(),
            stride: canvas.stride(),
        });
    }
    let used = canvas.height() as usize * canvas.stride() as usize;
    let mut row = Vec::with_capacity(canvas.stride() as usize);
    for src in canvas.as_bytes()[..used].chunks(canvas.stride().max(1) as usize) {
        row.clear();
        for px in src.chunks_exact(BYTES_PER_PIXEL as usize) {
            row.extend_from_slice(&[px[2], px[1], px[0], px[3]]);
        }
        out.write_all(&row)?;
    }
    Ok(())
}

/// Create (or truncate) `path` and write the RGBA dump into it.
pub fn dump_rgba_file(canvas: &Canvas, path: &Path) -> Result<(), DumpError> {
    #[cfg(feature = "tracing")]
    tracing::debug!(path = %path.display(), width = canvas.width(), height = canvas.height(), "dumping canvas");

    let mut out = BufWriter::new(File::create(path)?);
    write_rgba(canvas, &mut out)?;
    out.flush()?;
    Ok(())
}
