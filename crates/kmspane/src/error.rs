use std::io;

use thiserror::Error;

use kmspane_drm::DrmError;
use kmspane_render::DumpError;
use kmspane_runtime::{ConfigError, LifecycleError, PaneError};

pub type Result<T> = std::result::Result<T, AppError>;

/// Bad flags or configuration.
pub const EXIT_USAGE: i32 = 2;
/// The display could not be acquired.
pub const EXIT_DISPLAY: i32 = 3;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("display setup failed: {0}")]
    Display(#[from] DrmError),

    #[error("{0}")]
    Lifecycle(#[from] LifecycleError),

    #[error("failed to create root pane: {0}")]
    Pane(#[from] PaneError),

    #[error("failed to register signal handlers: {0}")]
    Signals(#[source] io::Error),

    #[error("failed to write dump: {0}")]
    Dump(#[from] DumpError),

    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("failed to install logger: {message}")]
    Logging { message: String },
}

impl AppError {
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::InvalidArgument { .. } => EXIT_USAGE,
            Self::Display(_) => EXIT_DISPLAY,
            _ => 1,
        }
    }

    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_errors_exit_with_two() {
        assert_eq!(AppError::invalid("bad size").exit_code(), EXIT_USAGE);
        let config = ConfigError::Invalid(vec!["max_panes must be >= 1 (the root pane)".into()]);
        assert_eq!(AppError::from(config).exit_code(), EXIT_USAGE);
    }

    #[test]
    fn display_errors_exit_with_three() {
        let err = AppError::from(DrmError::NoConnector);
        assert_eq!(err.exit_code(), EXIT_DISPLAY);
        assert!(err.to_string().starts_with("display setup failed: "));
    }

    #[test]
    fn runtime_errors_exit_with_one() {
        let err = AppError::from(PaneError::Duplicate("root".into()));
        assert_eq!(err.exit_code(), 1);
        assert_eq!(err.to_string(), "failed to create root pane: duplicate pane: root");
    }
}
