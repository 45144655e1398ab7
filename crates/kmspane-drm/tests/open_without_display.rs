//! Acquisition failures that can be provoked without a GPU.

use std::fs;

use kmspane_drm::{DrmBackend, DrmError, DrmOptions};

#[test]
fn default_options() {
    let opts = DrmOptions::default();
    assert_eq!(opts.device_dir, std::path::PathBuf::from("/dev/dri"));
    assert_eq!(opts.max_busy_retries, 100_000);
}

#[test]
fn empty_device_dir_has_no_card() {
    let dir = tempfile::tempdir().unwrap();
    let opts = DrmOptions {
        device_dir: dir.path().to_path_buf(),
        ..DrmOptions::default()
    };
    let err = DrmBackend::open(&opts).unwrap_err();
    assert!(matches!(err, DrmError::NoCard { .. }), "{err}");
}

#[test]
fn regular_file_is_not_a_drm_device() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("card0"), b"").unwrap();
    let opts = DrmOptions {
        device_dir: dir.path().to_path_buf(),
        ..DrmOptions::default()
    };
    // The capability ioctl fails on a plain file (ENOTTY).
    let err = DrmBackend::open(&opts).unwrap_err();
    assert!(matches!(err, DrmError::CapabilityQuery(_)), "{err}");
}

#[test]
fn missing_device_dir() {
    let dir = tempfile::tempdir().unwrap();
    let opts = DrmOptions {
        device_dir: dir.path().join("nope"),
        ..DrmOptions::default()
    };
    let err = DrmBackend::open(&opts).unwrap_err();
    assert!(matches!(err, DrmError::DeviceDir { .. }), "{err}");
    assert!(err.to_string().contains("nope"));
}
