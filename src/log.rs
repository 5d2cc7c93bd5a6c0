//! Logging goes to stdout and is appended to a log file at the same time.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

use crate::error::{Error, Result};

/// Installs the global subscriber. Fails if one is already installed.
pub fn init(log_path: &Path, verbose: bool) -> Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(log_path)?;
    let level = if verbose { LevelFilter::DEBUG } else { LevelFilter::INFO };

    tracing_subscriber::registry()
        .with(level)
        .with(fmt::layer().with_writer(std::io::stdout))
        .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        .try_init()
        .map_err(|e| Error::Logging(e.to_string()))
}

/// Numeric metric in one fixed shape so the log file is easy to grep.
pub fn scalar(step: u64, name: &str, value: f64) {
    tracing::info!(target: "scalar", step, name, value);
}
