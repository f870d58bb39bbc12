//! File logging.
//!
//! The terminal belongs to the remote shell while a session runs, so log
//! lines never go to stdout or stderr. Without a configured file nothing is
//! installed and the `tracing` macros are no-ops.

use std::fs::OpenOptions;
use std::sync::Mutex;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use sshterm_core::LoggingSettings;

/// Install the global subscriber. Returns whether logging is active.
pub fn init(settings: &LoggingSettings) -> anyhow::Result<bool> {
    let Some(path) = &settings.file else {
        return Ok(false);
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating log directory {}", parent.display()))?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter(&settings.level))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("installing log subscriber: {e}"))?;

    Ok(true)
}

/// `RUST_LOG` if set, else the configured level, else `info`.
fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}
