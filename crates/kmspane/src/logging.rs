//! Diagnostic output on stderr.
//!
//! Filter directives come from `--log-filter` when given, else `RUST_LOG`,
//! else `info`. Stdout is left alone: it carries command replies.

use std::io::IsTerminal;

use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

use crate::error::{AppError, Result};

/// Build the event filter from an explicit directive string or the
/// environment.
pub fn filter(directives: Option<&str>) -> Result<EnvFilter> {
    match directives {
        Some(directives) => EnvFilter::try_new(directives)
            .map_err(|err| AppError::invalid(format!("--log-filter {directives:?}: {err}"))),
        None => Ok(EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string()))),
    }
}

/// Install the global subscriber.
///
/// Fails if one is already installed.
pub fn init(directives: Option<&str>, json: bool) -> Result<()> {
    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter(directives)?)
        .with_writer(std::io::stderr)
        .with_ansi(!json && std::io::stderr().is_terminal());

    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|err| AppError::Logging {
        message: err.to_string(),
    })
}
