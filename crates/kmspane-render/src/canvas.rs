#![forbid(unsafe_code)]

//! Owned BGRA pixel buffers.
//!
//! A [`Canvas`] is a `height × stride` byte buffer. Each pixel occupies
//! [`BYTES_PER_PIXEL`] bytes laid out B, G, R, A, which matches the
//! little-endian XRGB8888 scanout format used by dumb buffers, so a canvas
//! can be copied into hardware memory byte-for-byte.
//!
//! Canvases are created either packed (`stride == width * 4`) through
//! [`Canvas::new_bgra`], or mirrored from a display backend's scanout
//! geometry through [`Canvas::from_layout`], in which case the stride is the
//! hardware pitch and may include row padding.

use std::collections::TryReserveError;

use crate::color::Color;

/// Bytes per BGRA pixel.
pub const BYTES_PER_PIXEL: u32 = 4;

/// Geometry of a canvas buffer: dimensions, row pitch and total length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanvasLayout {
    pub width: u16,
    pub height: u16,
    /// Bytes per row.
    pub stride: u32,
    /// Total buffer length in bytes. Never less than `height * stride`.
    pub len: usize,
}

impl CanvasLayout {
    /// Layout of a packed BGRA canvas.
    pub const fn packed(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            stride: width as u32 * BYTES_PER_PIXEL,
            len: Canvas::buffer_size(width, height, BYTES_PER_PIXEL) as usize,
        }
    }

    /// Layout for a pitched buffer of `len` bytes.
    ///
    /// Degenerate values are raised, see [`normalized`](Self::normalized).
    pub fn pitched(width: u16, height: u16, stride: u32, len: usize) -> Self {
        Self {
            width,
            height,
            stride,
            len,
        }
        .normalized()
    }

    /// Raise `stride` to at least `width * 4` and `len` to at least
    /// `height * stride`.
    pub fn normalized(self) -> Self {
        let stride = self.stride.max(self.width as u32 * BYTES_PER_PIXEL);
        let min_len = self.height as usize * stride as usize;
        Self {
            stride,
            len: self.len.max(min_len),
            ..self
        }
    }

    /// Whether rows carry no padding.
    #[inline]
    pub const fn is_packed(&self) -> bool {
        self.stride == self.width as u32 * BYTES_PER_PIXEL
    }
}

/// An owned, software-addressable pixel buffer.
#[derive(Clone, PartialEq, Eq)]
pub struct Canvas {
    width: u16,
    height: u16,
    stride: u32,
    buffer: Vec<u8>,
}

impl Canvas {
    /// Byte size of a `width × height` buffer at `bytes_per_pixel`.
    #[inline]
    pub const fn buffer_size(width: u16, height: u16, bytes_per_pixel: u32) -> u64 {
        width as u64 * height as u64 * bytes_per_pixel as u64
    }

    /// Create a packed BGRA canvas, zero-initialised (transparent black).
    pub fn new_bgra(width: u16, height: u16) -> Self {
        Self::from_layout(CanvasLayout::packed(width, height))
    }

    /// Create a zeroed canvas with the given layout, normalised first.
    pub fn from_layout(layout: CanvasLayout) -> Self {
        let layout = layout.normalized();
        Self {
            width: layout.width,
            height: layout.height,
            stride: layout.stride,
            buffer: vec![0; layout.len],
        }
    }

    /// Like [`from_layout`](Self::from_layout), but reports allocation
    /// failure instead of aborting.
    pub fn try_from_layout(layout: CanvasLayout) -> Result<Self, TryReserveError> {
        let layout = layout.normalized();
        let mut buffer = Vec::new();
        buffer.try_reserve_exact(layout.len)?;
        buffer.resize(layout.len, 0);
        Ok(Self {
            width: layout.width,
            height: layout.height,
            stride: layout.stride,
            buffer,
        })
    }

    #[inline]
    pub const fn width(&self) -> u16 {
        self.width
    }

    #[inline]
    pub const fn height(&self) -> u16 {
        self.height
    }

    /// Bytes per row.
    #[inline]
    pub const fn stride(&self) -> u32 {
        self.stride
    }

    pub fn layout(&self) -> CanvasLayout {
        CanvasLayout {
            width: self.width,
            height: self.height,
            stride: self.stride,
            len: self.buffer.len(),
        }
    }

    /// Whether rows carry no padding (required by the RGBA dump).
    #[inline]
    pub const fn is_packed(&self) -> bool {
        self.stride == self.width as u32 * BYTES_PER_PIXEL
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.buffer
    }

    /// Byte offset of pixel `(x, y)`. No bounds check.
    #[inline]
    pub(crate) const fn offset(&self, x: u16, y: u16) -> usize {
        y as usize * self.stride as usize + x as usize * BYTES_PER_PIXEL as usize
    }

    /// Read back pixel `(x, y)` as stored (B, G, R, A), or `None` if off-canvas.
    pub fn pixel(&self, x: u16, y: u16) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let at = self.offset(x, y);
        let mut px = [0u8; 4];
        px.copy_from_slice(&self.buffer[at..at + 4]);
        Some(px)
    }

    /// Whether pixel `(x, y)` holds exactly `color` at full opacity.
    pub fn pixel_is(&self, x: u16, y: u16, color: Color) -> bool {
        self.pixel(x, y) == Some(color.to_bgra())
    }

    /// Count pixels that hold exactly `color` at full opacity.
    pub fn count_color(&self, color: Color) -> usize {
        let want = color.to_bgra();
        (0..self.height)
            .flat_map(|y| (0..self.width).map(move |x| (x, y)))
            .filter(|&(x, y)| {
                let at = self.offset(x, y);
                self.buffer[at..at + 4] == want
            })
            .count()
    }
}

impl std::fmt::Debug for Canvas {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Canvas")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("stride", &self.stride)
            .field("len", &self.buffer.len())
            .finish()
    }
}
