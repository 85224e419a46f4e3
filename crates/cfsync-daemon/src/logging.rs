//! Tracing subscriber setup

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use tracing_subscriber::EnvFilter;

/// Level directive for `verbose` occurrences of `-v`, falling back to `configured`
pub fn level_for(verbose: u8, configured: &str) -> String {
    match verbose {
        0 => configured.to_string(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

/// Installs the global subscriber
///
/// `RUST_LOG` takes precedence over `level`. With `file` set, output is
/// appended to that file without ANSI colours.
///
/// # Errors
/// Returns an error if `level` is not a valid filter, the log file cannot be
/// opened, or a subscriber is already installed
pub fn init(level: &str, file: Option<&Path>) -> Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level).with_context(|| format!("Invalid log level '{level}'"))?,
    };

    let installed = match file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(true)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .try_init(),
    };

    installed.map_err(|e| anyhow!("Failed to initialise logging: {e}"))
}
