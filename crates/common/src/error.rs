//! Error types shared across histweave crates.

use std::path::PathBuf;

/// Top-level error type for histweave operations.
#[derive(Debug, thiserror::Error)]
pub enum HistweaveError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid date: {value}")]
    InvalidDate { value: String },

    #[error("Error processing {label}: {message}")]
    Extraction { label: String, message: String },

    #[error("Output error: {message}")]
    Sink { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using HistweaveError.
pub type HistweaveResult<T> = Result<T, HistweaveError>;

impl HistweaveError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn invalid_date(value: impl Into<String>) -> Self {
        Self::InvalidDate {
            value: value.into(),
        }
    }

    pub fn extraction(label: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Extraction {
            label: label.into(),
            message: msg.into(),
        }
    }

    pub fn sink(msg: impl Into<String>) -> Self {
        Self::Sink {
            message: msg.into(),
        }
    }

    /// Label of the repository this error belongs to, if any.
    pub fn repo_label(&self) -> Option<&str> {
        match self {
            Self::Extraction { label, .. } => Some(label),
            _ => None,
        }
    }

    /// Whether this error is a closed downstream pipe rather than a real failure.
    pub fn is_broken_pipe(&self) -> bool {
        match self {
            Self::Io(e) => e.kind() == std::io::ErrorKind::BrokenPipe,
            Self::Other(e) => e
                .downcast_ref::<std::io::Error>()
                .is_some_and(|io| io.kind() == std::io::ErrorKind::BrokenPipe),
            _ => false,
        }
    }
}
