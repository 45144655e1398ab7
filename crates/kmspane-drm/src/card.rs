#![forbid(unsafe_code)]

//! Card discovery and the device handle.

use std::fs::{File, OpenOptions};
use std::os::fd::{AsFd, BorrowedFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use nix::fcntl::OFlag;

use crate::DrmError;

/// Prefix of primary DRM device nodes (`card0`, `card1`, ...).
pub const CARD_PREFIX: &str = "card";

/// Pick the card device in `dir`: the lexicographically first entry whose
/// file name starts with [`CARD_PREFIX`].
pub fn find_card_in(dir: &Path) -> Result<PathBuf, DrmError> {
    let entries = std::fs::read_dir(dir).map_err(|source| DrmError::DeviceDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut best: Option<std::ffi::OsString> = None;
    for entry in entries {
        let entry = entry.map_err(|source| DrmError::DeviceDir {
            path: dir.to_path_buf(),
            source,
        })?;
        let name = entry.file_name();
        if !name.as_encoded_bytes().starts_with(CARD_PREFIX.as_bytes()) {
            continue;
        }
        if best.as_ref().is_none_or(|b| name < *b) {
            best = Some(name);
        }
    }

    best.map(|name| dir.join(name))
        .ok_or_else(|| DrmError::NoCard {
            dir: dir.to_path_buf(),
        })
}

/// An open DRM device node.
///
/// Closing happens when the value is dropped.
#[derive(Debug)]
pub struct Card {
    file: File,
    path: PathBuf,
}

impl Card {
    /// Open `path` read-write and non-blocking.
    pub fn open(path: &Path) -> Result<Self, DrmError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(OFlag::O_NONBLOCK.bits())
            .open(path)
            .map_err(|source| DrmError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Discover and open the card in `dir`.
    pub fn discover(dir: &Path) -> Result<Self, DrmError> {
        Self::open(&find_card_in(dir)?)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AsFd for Card {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.file.as_fd()
    }
}

impl drm::Device for Card {}
impl drm::control::Device for Card {}
