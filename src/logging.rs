// src/logging.rs
//! tracing subscriber setup.

use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::LoggingConfig;

/// Where log lines go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    /// Append to `LoggingConfig::file`.
    File,
}

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence, then `level_override`, then the configured
/// level.
pub fn init(
    config: &LoggingConfig,
    level_override: Option<&str>,
    target: LogTarget,
) -> anyhow::Result<()> {
    let level = level_override.unwrap_or(&config.level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match target {
        LogTarget::Stderr => tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .try_init()?,
        LogTarget::File => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&config.file)
                .map_err(|e| {
                    anyhow::anyhow!("Failed to open log file {}: {}", config.file.display(), e)
                })?;
            tracing_subscriber::registry()
                .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                .with(filter)
                .try_init()?
        }
    }

    Ok(())
}
