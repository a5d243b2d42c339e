//! Logging and scratch-directory configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable overriding the default scratch directory.
pub const WORK_DIR_ENV: &str = "HISTWEAVE_WORK_DIR";

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "histweave_engine=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path. Logs go to stderr when unset.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Config at `debug` when verbose, `info` otherwise.
    pub fn for_verbosity(verbose: bool) -> Self {
        Self {
            level: if verbose { "debug" } else { "info" }.to_string(),
            ..Self::default()
        }
    }
}

/// Default scratch directory for raw per-repository logs.
///
/// Honors `HISTWEAVE_WORK_DIR` (relative values resolve against the current
/// directory), otherwise `<temp>/histweave`.
pub fn default_work_dir() -> PathBuf {
    match std::env::var_os(WORK_DIR_ENV) {
        Some(dir) => {
            let dir = PathBuf::from(dir);
            if dir.is_absolute() {
                dir
            } else {
                std::env::current_dir()
                    .map(|cwd| cwd.join(&dir))
                    .unwrap_or(dir)
            }
        }
        None => std::env::temp_dir().join("histweave"),
    }
}
