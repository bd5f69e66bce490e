//! Log subscriber bootstrap.
//!
//! Logs never go to stdout: the console owns it. They land on stderr, or in
//! `PIPELINE_LOG_FILE` when set.

use std::fs::OpenOptions;
use std::io;
use std::sync::Mutex;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::config::{EnvConfig, DEFAULT_LOG_FILTER};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to open log file {path}: {source}")]
    OpenLogFile {
        path: String,
        #[source]
        source: io::Error,
    },
    /// A global subscriber was installed already.
    #[error("logging is already initialized")]
    AlreadyInitialized,
}

/// Builds the filter for `directive`, falling back to `info` when it does
/// not parse.
pub fn env_filter(directive: &str) -> EnvFilter {
    EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

pub fn init_logging(config: &EnvConfig) -> Result<(), LoggingError> {
    let filter = env_filter(config.log_directive());

    let installed = match config.log_file.as_deref() {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| LoggingError::OpenLogFile {
                    path: path.to_string(),
                    source,
                })?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .try_init(),
    };

    installed.map_err(|_| LoggingError::AlreadyInitialized)
}
