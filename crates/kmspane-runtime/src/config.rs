#![forbid(unsafe_code)]

//! Runtime configuration loaded from TOML.
//!
//! ```toml
//! # kmspane.toml
//! device_dir = "/dev/dri"
//! rotation_interval_ms = 1000
//! root_fill = "#222288"
//! max_panes = 1024
//! max_busy_retries = 100000
//! commands = true
//!
//! # Run without a display:
//! [headless]
//! width = 640
//! height = 480
//! ```
//!
//! Every field is optional; [`RuntimeConfig::default()`] matches the values
//! above, minus the `[headless]` table.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer};

pub use kmspane_backend::DEFAULT_MAX_BUSY_RETRIES;
use kmspane_render::Color;

use crate::pane_store::DEFAULT_MAX_PANES;
use crate::rotation::DEFAULT_ROTATION_INTERVAL;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Directory searched for the first `card*` device.
    pub device_dir: PathBuf,
    /// How long each pane stays on screen.
    pub rotation_interval_ms: u64,
    /// Background of the root pane.
    #[serde(deserialize_with = "color_from_text")]
    pub root_fill: Color,
    pub max_panes: usize,
    pub max_busy_retries: u32,
    /// Read drawing commands from stdin.
    pub commands: bool,
    /// Render into memory instead of a display.
    pub headless: Option<HeadlessConfig>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            device_dir: PathBuf::from("/dev/dri"),
            rotation_interval_ms: DEFAULT_ROTATION_INTERVAL.as_millis() as u64,
            root_fill: Color::ROOT_BACKGROUND,
            max_panes: DEFAULT_MAX_PANES,
            max_busy_retries: DEFAULT_MAX_BUSY_RETRIES,
            commands: true,
            headless: None,
        }
    }
}

/// Geometry of the in-memory display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HeadlessConfig {
    pub width: u16,
    pub height: u16,
    #[serde(default = "default_refresh")]
    pub refresh: u32,
    /// Frames kept in memory.
    #[serde(default = "default_frame_log")]
    pub frame_log: usize,
}

impl HeadlessConfig {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            refresh: default_refresh(),
            frame_log: default_frame_log(),
        }
    }
}

fn default_refresh() -> u32 {
    60
}

fn default_frame_log() -> usize {
    16
}

fn color_from_text<'de, D: Deserializer<'de>>(de: D) -> Result<Color, D::Error> {
    let text = String::deserialize(de)?;
    text.parse().map_err(serde::de::Error::custom)
}

impl RuntimeConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.check()?;
        Ok(config)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn rotation_interval(&self) -> Duration {
        Duration::from_millis(self.rotation_interval_ms)
    }

    /// List every out-of-range value. Empty means valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.rotation_interval_ms == 0 {
            errors.push("rotation_interval_ms must be > 0".to_owned());
        }
        if self.max_panes == 0 {
            errors.push("max_panes must be >= 1 (the root pane)".to_owned());
        }
        if let Some(headless) = &self.headless {
            if headless.width == 0 || headless.height == 0 {
                errors.push(format!(
                    "headless size must be non-zero, got {}x{}",
                    headless.width, headless.height
                ));
            }
            if headless.frame_log == 0 {
                errors.push("headless.frame_log must be >= 1".to_owned());
            }
        }
        errors
    }

    /// [`validate`](Self::validate) as a `Result`.
    pub fn check(&self) -> Result<(), ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid config: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_default() {
        assert_eq!(RuntimeConfig::from_toml_str("").unwrap(), RuntimeConfig::default());
    }

    #[test]
    fn defaults_match_constants() {
        let c = RuntimeConfig::default();
        assert_eq!(c.rotation_interval(), Duration::from_secs(1));
        assert_eq!(c.root_fill, Color::rgb(0x22, 0x22, 0x88));
        assert_eq!(c.max_panes, 1024);
        assert_eq!(c.max_busy_retries, 100_000);
        assert_eq!(c.max_busy_retries, kmspane_backend::DEFAULT_MAX_BUSY_RETRIES);
        assert!(c.commands);
        assert!(c.headless.is_none());
        assert!(c.validate().is_empty());
    }

    #[test]
    fn parses_all_fields() {
        let c = RuntimeConfig::from_toml_str(
            r##"
            device_dir = "/tmp/dri"
            rotation_interval_ms = 250
            root_fill = "#102030"
            max_panes = 4
            max_busy_retries = 7
            commands = false

            [headless]
            width = 320
            height = 200
            "##,
        )
        .unwrap();
        assert_eq!(c.device_dir, PathBuf::from("/tmp/dri"));
        assert_eq!(c.rotation_interval(), Duration::from_millis(250));
        assert_eq!(c.root_fill, Color::rgb(0x10, 0x20, 0x30));
        assert_eq!(c.max_panes, 4);
        assert_eq!(c.max_busy_retries, 7);
        assert!(!c.commands);
        assert_eq!(c.headless, Some(HeadlessConfig::new(320, 200)));
    }

    #[test]
    fn bad_color_is_parse_error() {
        let err = RuntimeConfig::from_toml_str(r##"root_fill = "blue""##).unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
        assert!(err.to_string().contains("#"));
    }

    #[test]
    fn unknown_field_is_rejected() {
        assert!(matches!(
            RuntimeConfig::from_toml_str("rotation = 5"),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn zero_interval_is_invalid() {
        let err = RuntimeConfig::from_toml_str("rotation_interval_ms = 0").unwrap_err();
        match err {
            ConfigError::Invalid(errors) => assert_eq!(errors.len(), 1),
            other => panic!("unexpected: {other}"),
        }
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kmspane.toml");
        std::fs::write(&path, "max_panes = 3\n").unwrap();
        assert_eq!(RuntimeConfig::from_toml_file(&path).unwrap().max_panes, 3);

        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            RuntimeConfig::from_toml_file(&missing),
            Err(ConfigError::Io { .. })
        ));
    }
}
