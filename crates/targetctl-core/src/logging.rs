//! Logging configuration using tracing

use std::path::{Path, PathBuf};

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::{Error, Result};

/// Environment variable overriding the log filter
pub const LOG_ENV_VAR: &str = "TARGETCTL_LOG";

/// Filter used when neither the environment nor settings provide one
pub const DEFAULT_FILTER: &str = "targetctl=info,warn";

const LOG_FILE_NAME: &str = "targetctl.log";

/// Initialize the logging subsystem with defaults
///
/// Logs are written to `~/.local/share/targetctl/logs/`.
/// Log level is controlled by the `TARGETCTL_LOG` environment variable.
///
/// # Examples
/// ```bash
/// TARGETCTL_LOG=debug my-tool
/// TARGETCTL_LOG=targetctl_forward=trace my-tool
/// ```
pub fn init() -> Result<()> {
    init_with(DEFAULT_FILTER, None)
}

/// Initialize logging with a fallback filter and an optional log directory
///
/// `TARGETCTL_LOG` still takes precedence over `default_filter`.
pub fn init_with(default_filter: &str, directory: Option<&Path>) -> Result<()> {
    let log_dir = match directory {
        Some(dir) => dir.to_path_buf(),
        None => get_log_directory()?,
    };
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, LOG_FILE_NAME);

    tracing_subscriber::registry()
        .with(resolve_filter(default_filter))
        .with(
            fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .with_timer(fmt::time::ChronoLocal::new(
                    "%Y-%m-%d %H:%M:%S%.3f".to_string(),
                )),
        )
        .try_init()
        .map_err(|e| Error::config(format!("Logging already initialized: {}", e)))?;

    tracing::info!("═══════════════════════════════════════════════════════");
    tracing::info!("targetctl starting");
    tracing::info!("Log directory: {}", log_dir.display());
    tracing::info!("═══════════════════════════════════════════════════════");

    Ok(())
}

/// Build the filter from `TARGETCTL_LOG`, falling back to `default_filter`
fn resolve_filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| {
        EnvFilter::try_new(default_filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    })
}

/// Get the log directory path
fn get_log_directory() -> Result<PathBuf> {
    let base = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    Ok(base.join("targetctl").join("logs"))
}

/// Get the log file path for the current day
pub fn get_current_log_file() -> Result<PathBuf> {
    let dir = get_log_directory()?;
    Ok(dir.join(LOG_FILE_NAME))
}
