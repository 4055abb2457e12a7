//! Tracing setup for the `aki` binary.
//!
//! `RUST_LOG` overrides the default filter. The terminal form owns the screen,
//! so it logs to a file; every other subcommand logs to stderr.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{AppError, EXIT_RUNTIME};

pub const DEFAULT_FILTER: &str = "aki_form=info";

/// Log file used while the terminal form is running.
pub const TUI_LOG_FILE: &str = "aki.log";

/// Where log records go.
#[derive(Debug, Clone, Copy)]
pub enum LogTarget<'a> {
    Stderr,
    File(&'a Path),
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into())
}

/// Install the global subscriber.
pub fn init(target: LogTarget<'_>) -> Result<(), AppError> {
    let result = match target {
        LogTarget::Stderr => tracing_subscriber::registry()
            .with(env_filter())
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init(),
        LogTarget::File(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| {
                    AppError::new(
                        EXIT_RUNTIME,
                        format!("Failed to open log file '{}': {e}", path.display()),
                    )
                })?;
            tracing_subscriber::registry()
                .with(env_filter())
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
                .try_init()
        }
    };
    result.map_err(|e| AppError::new(EXIT_RUNTIME, format!("Failed to initialize logging: {e}")))
}
