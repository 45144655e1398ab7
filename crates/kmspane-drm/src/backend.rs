#![forbid(unsafe_code)]

//! The kernel mode-setting display session.
//!
//! [`DrmBackend::open`] acquires, in order: the card, its capabilities, the
//! mode resources, a connected connector, a CRTC with a valid mode, the
//! primary plane on that CRTC, and two scanout buffers. The session scans
//! out whatever the CRTC is already configured for; it never performs a
//! mode set, so the first flip replaces the console's framebuffer.

use std::path::PathBuf;

use drm::control::{Device as ControlDevice, PageFlipFlags, connector, crtc, plane};
use drm::{ClientCapability, Device as _, DriverCapability};

use kmspane_backend::{DisplayBackend, DoubleBuffer, ModeInfo, StatusReport};
use kmspane_render::{Canvas, CanvasLayout};

use crate::DrmError;
use crate::card::Card;
use crate::flip::{DEFAULT_MAX_BUSY_RETRIES, flip_with_retry};
use crate::scanout::ScanoutBuffer;

/// `DRM_PLANE_TYPE_PRIMARY`.
const PLANE_TYPE_PRIMARY: u64 = 1;

/// Where to look for the device and how hard to push flips.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrmOptions {
    pub device_dir: PathBuf,
    pub max_busy_retries: u32,
}

impl Default for DrmOptions {
    fn default() -> Self {
        Self {
            device_dir: PathBuf::from("/dev/dri"),
            max_busy_retries: DEFAULT_MAX_BUSY_RETRIES,
        }
    }
}

/// A live display session.
///
/// Owns the card and both scanout buffers. Dropping the session releases
/// the buffers in reverse creation order and then closes the card.
#[derive(Debug)]
pub struct DrmBackend {
    buffers: Option<DoubleBuffer<ScanoutBuffer>>,
    card: Card,
    crtc: crtc::Handle,
    plane: plane::Handle,
    mode: ModeInfo,
    layout: CanvasLayout,
    max_busy_retries: u32,
}

impl DrmBackend {
    pub fn open(options: &DrmOptions) -> Result<Self, DrmError> {
        let _span = tracing::info_span!("drm.open", dir = %options.device_dir.display()).entered();

        let card = Card::discover(&options.device_dir)?;
        tracing::debug!(path = %card.path().display(), "opened card");
        require_dumb_buffers(&card)?;
        card.set_client_capability(ClientCapability::UniversalPlanes, true)
            .map_err(DrmError::UniversalPlanes)?;

        let resources = card.resource_handles().map_err(|source| DrmError::Query {
            what: "mode resources",
            source,
        })?;
        let connector = find_connector(&card, resources.connectors())?;
        let (crtc, mode) = find_crtc(&card, resources.crtcs())?;
        let plane = find_primary_plane(&card, crtc)?;

        let (width, height) = mode.size();
        let mode = ModeInfo::new(width, height, mode.vrefresh());

        let first = ScanoutBuffer::create(&card, 0, width, height)?;
        let second = match ScanoutBuffer::create(&card, 1, width, height) {
            Ok(buf) => buf,
            Err(err) => {
                if let Err(release) = first.destroy(&card) {
                    tracing::warn!(error = %release, "failed to release buffer 0 after init error");
                }
                return Err(err);
            }
        };
        let layout = first.layout(width, height);

        tracing::info!(
            %mode,
            connector = u32::from(connector),
            pitch = first.pitch,
            size = first.size,
            "display session ready"
        );
        Ok(Self {
            buffers: Some(DoubleBuffer::new(first, second)),
            card,
            crtc,
            plane,
            mode,
            layout,
            max_busy_retries: options.max_busy_retries,
        })
    }

    /// Destroy both buffers, newest first. Keeps going past failures and
    /// reports the first one.
    fn release(&mut self) -> Result<(), DrmError> {
        let Some(buffers) = self.buffers.take() else {
            return Ok(());
        };
        let (a, b) = buffers.into_parts();
        let (older, newer) = if a.index < b.index { (a, b) } else { (b, a) };

        let mut first_err = None;
        for buf in [newer, older] {
            let index = buf.index;
            if let Err(err) = buf.destroy(&self.card) {
                tracing::warn!(index, error = %err, "buffer release failed");
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

impl DisplayBackend for DrmBackend {
    type Error = DrmError;

    fn mode(&self) -> ModeInfo {
        self.mode
    }

    fn canvas_layout(&self) -> CanvasLayout {
        self.layout
    }

    fn status(&self) -> StatusReport {
        let (front, back) = self
            .buffers
            .as_ref()
            .map_or((0, 0), |b| (u32::from(b.front().fb), u32::from(b.back().fb)));
        StatusReport {
            crtc: u32::from(self.crtc),
            plane: u32::from(self.plane),
            front,
            back,
            mode: self.mode,
        }
    }

    fn show(&mut self, canvas: &Canvas) -> Result<(), DrmError> {
        let buffers = self.buffers.as_mut().ok_or(DrmError::Released)?;
        let back = buffers.back_mut();
        back.write(&self.card, canvas)?;

        let fb = back.fb;
        let card = &self.card;
        let crtc = self.crtc;
        let busy = flip_with_retry(
            || card.page_flip(crtc, fb, PageFlipFlags::empty(), None),
            self.max_busy_retries,
        )?;
        if busy > 0 {
            tracing::trace!(busy, "page flip was busy");
        }

        buffers.swap();
        Ok(())
    }

    fn shutdown(mut self) -> Result<(), DrmError> {
        tracing::debug!("releasing display session");
        self.release()
    }
}

impl Drop for DrmBackend {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            tracing::error!(error = %err, "display release failed during drop");
        }
    }
}

fn require_dumb_buffers(card: &Card) -> Result<(), DrmError> {
    let cap = card
        .get_driver_capability(DriverCapability::DumbBuffer)
        .map_err(DrmError::CapabilityQuery)?;
    if cap == 0 {
        return Err(DrmError::DumbBuffersUnsupported);
    }
    Ok(())
}

/// First connected connector that advertises at least one mode.
fn find_connector(card: &Card, handles: &[connector::Handle]) -> Result<connector::Handle, DrmError> {
    for &handle in handles {
        let info = card.get_connector(handle, false).map_err(|source| DrmError::Query {
            what: "connector",
            source,
        })?;
        if info.state() == connector::State::Connected && !info.modes().is_empty() {
            return Ok(handle);
        }
        tracing::debug!(connector = u32::from(handle), state = ?info.state(), "skipping connector");
    }
    Err(DrmError::NoConnector)
}

/// First CRTC that currently has a valid mode.
fn find_crtc(card: &Card, handles: &[crtc::Handle]) -> Result<(crtc::Handle, drm::control::Mode), DrmError> {
    for &handle in handles {
        let info = card.get_crtc(handle).map_err(|source| DrmError::Query {
            what: "CRTC",
            source,
        })?;
        if let Some(mode) = info.mode() {
            return Ok((handle, mode));
        }
    }
    Err(DrmError::NoCrtc)
}

/// The primary plane currently bound to `crtc`.
fn find_primary_plane(card: &Card, crtc: crtc::Handle) -> Result<plane::Handle, DrmError> {
    let planes = card.plane_handles().map_err(|source| DrmError::Query {
        what: "plane resources",
        source,
    })?;
    for handle in planes {
        let info = card.get_plane(handle).map_err(|source| DrmError::Query {
            what: "plane",
            source,
        })?;
        if info.crtc() == Some(crtc) && is_primary(card, handle)? {
            return Ok(handle);
        }
    }
    Err(DrmError::NoPrimaryPlane {
        crtc: u32::from(crtc),
    })
}

fn is_primary(card: &Card, plane: plane::Handle) -> Result<bool, DrmError> {
    let props = card.get_properties(plane).map_err(|source| DrmError::Query {
        what: "plane properties",
        source,
    })?;
    let (ids, values) = props.as_props_and_values();
    for (&id, &value) in ids.iter().zip(values) {
        let info = card.get_property(id).map_err(|source| DrmError::Query {
            what: "property",
            source,
        })?;
        if info.name().to_bytes() == b"type" {
            return Ok(value == PLANE_TYPE_PRIMARY);
        }
    }
    Err(DrmError::MissingPlaneType {
        plane: u32::from(plane),
    })
}
