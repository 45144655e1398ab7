#![forbid(unsafe_code)]

//! Dumb-buffer backed scanout buffers.

use drm::buffer::{Buffer as _, DrmFourcc};
use drm::control::Device as ControlDevice;
use drm::control::dumbbuffer::DumbBuffer;
use drm::control::framebuffer;

use kmspane_render::{BYTES_PER_PIXEL, Canvas, CanvasLayout};

use crate::DrmError;
use crate::card::Card;

const DEPTH: u32 = 24;
const BPP: u32 = 32;

/// Reject pitches that cannot hold a row of `width` 32-bit pixels.
pub fn validate_pitch(pitch: u32, width: u16) -> Result<u32, DrmError> {
    let row = u32::from(width) * BYTES_PER_PIXEL;
    if pitch < BYTES_PER_PIXEL || pitch < row {
        return Err(DrmError::InvalidPitch { pitch, width });
    }
    Ok(pitch)
}

/// One registered, mappable dumb buffer.
#[derive(Debug)]
pub struct ScanoutBuffer {
    /// Creation order, 0 or 1.
    pub index: usize,
    pub fb: framebuffer::Handle,
    pub pitch: u32,
    /// Mapped length in bytes.
    pub size: usize,
    dumb: DumbBuffer,
}

impl ScanoutBuffer {
    /// Create, register and map an XRGB8888 buffer of `width × height`.
    ///
    /// On failure, whatever this call created is released again.
    pub fn create(card: &Card, index: usize, width: u16, height: u16) -> Result<Self, DrmError> {
        let dumb = card
            .create_dumb_buffer((u32::from(width), u32::from(height)), DrmFourcc::Xrgb8888, BPP)
            .map_err(|source| DrmError::CreateBuffer { index, source })?;

        let pitch = match validate_pitch(dumb.pitch(), width) {
            Ok(pitch) => pitch,
            Err(err) => {
                discard(card, None, dumb);
                return Err(err);
            }
        };

        let fb = match card.add_framebuffer(&dumb, DEPTH, BPP) {
            Ok(fb) => fb,
            Err(source) => {
                discard(card, None, dumb);
                return Err(DrmError::AddFramebuffer { index, source });
            }
        };

        let mut buf = Self {
            index,
            fb,
            pitch,
            size: 0,
            dumb,
        };
        match buf.map_len(card) {
            Ok(size) => {
                buf.size = size;
                Ok(buf)
            }
            Err(err) => {
                discard(card, Some(buf.fb), buf.dumb);
                Err(err)
            }
        }
    }

    /// Map once, zero the contents, and report the mapped length.
    fn map_len(&mut self, card: &Card) -> Result<usize, DrmError> {
        let index = self.index;
        let mut map = card
            .map_dumb_buffer(&mut self.dumb)
            .map_err(|source| DrmError::Map { index, source })?;
        let bytes: &mut [u8] = map.as_mut();
        bytes.fill(0);
        Ok(bytes.len())
    }

    /// Copy `canvas` into the buffer. Returns the bytes copied.
    pub fn write(&mut self, card: &Card, canvas: &Canvas) -> Result<usize, DrmError> {
        let index = self.index;
        let mut map = card
            .map_dumb_buffer(&mut self.dumb)
            .map_err(|source| DrmError::Map { index, source })?;
        Ok(kmspane_backend::copy_canvas_into(map.as_mut(), canvas))
    }

    pub fn layout(&self, width: u16, height: u16) -> CanvasLayout {
        CanvasLayout::pitched(width, height, self.pitch, self.size)
    }

    /// Unregister the framebuffer, then destroy the dumb buffer.
    pub fn destroy(self, card: &Card) -> Result<(), DrmError> {
        let fb = card.destroy_framebuffer(self.fb);
        let dumb = card.destroy_dumb_buffer(self.dumb);
        fb.map_err(|source| DrmError::Release {
            what: "framebuffer",
            source,
        })?;
        dumb.map_err(|source| DrmError::Release {
            what: "dumb buffer",
            source,
        })
    }
}

/// Best-effort cleanup after a failed creation step.
fn discard(card: &Card, fb: Option<framebuffer::Handle>, dumb: DumbBuffer) {
    if let Some(fb) = fb
        && let Err(err) = card.destroy_framebuffer(fb)
    {
        tracing::warn!(error = %err, "failed to release framebuffer after init error");
    }
    if let Err(err) = card.destroy_dumb_buffer(dumb) {
        tracing::warn!(error = %err, "failed to release dumb buffer after init error");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pitch_must_hold_a_row() {
        assert_eq!(validate_pitch(7680, 1920).unwrap(), 7680);
        assert_eq!(validate_pitch(8192, 1920).unwrap(), 8192);
        assert!(matches!(
            validate_pitch(7676, 1920),
            Err(DrmError::InvalidPitch {
                pitch: 7676,
                width: 1920
            })
        ));
    }

    #[test]
    fn pitch_below_one_pixel_is_invalid_even_for_empty_mode() {
        assert!(validate_pitch(0, 0).is_err());
        assert!(validate_pitch(3, 0).is_err());
        assert!(validate_pitch(4, 0).is_ok());
        assert!(validate_pitch(4, 1).is_ok());
    }
}
