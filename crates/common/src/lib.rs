//! Histweave Common Utilities
//!
//! Shared infrastructure for all histweave crates:
//! - Error types and result aliases
//! - Tracing/logging initialization
//! - Logging and scratch-directory configuration

pub mod config;
pub mod error;
pub mod logging;

pub use config::*;
pub use error::*;
