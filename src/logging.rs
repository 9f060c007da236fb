//! Logging setup: stderr plus an append-only log file under `<exe_dir>/logs/`.

use std::fs::{File, OpenOptions};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::paths;

const TIME_FORMAT: &str = "%H:%M:%S%.3f";

fn open_log_file() -> Result<File> {
    paths::ensure_directories().context("Failed to create logs directory")?;
    let log_path = paths::get_log_file();
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))
}

/// Installs the global subscriber.
///
/// `RUST_LOG` takes precedence; otherwise the level is `info`, or `debug`
/// when `verbose` is set. If the log file cannot be opened, logging goes to
/// stderr only.
pub fn init(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()))
        .with_target(false);

    let (file_layer, file_error) = match open_log_file() {
        Ok(file) => (
            Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()))
                    .with_ansi(false)
                    .with_target(false),
            ),
            None,
        ),
        Err(e) => (None, Some(e)),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to set tracing subscriber")?;

    if let Some(e) = file_error {
        tracing::warn!("{:#}. Logging to stderr only.", e);
    }

    install_panic_hook();
    Ok(())
}

/// Routes panics through the logger so they also reach the log file.
fn install_panic_hook() {
    std::panic::set_hook(Box::new(|panic_info| {
        let msg = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        let location = panic_info
            .location()
            .map(|loc| format!(" at {}:{}:{}", loc.file(), loc.line(), loc.column()))
            .unwrap_or_default();
        tracing::error!("[PANIC]{} {}", location, msg);
    }));
}
