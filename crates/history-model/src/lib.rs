//! Histweave Data Model
//!
//! Defines the data contracts shared by the aggregation pipeline:
//! - **Events:** `timestamp|author|kind|path` change records, raw and normalized
//! - **Repositories:** configured source repositories and their statistics
//! - **Options:** run-wide parameters and output sink selection
//! - **Config:** the JSON configuration file and its resolution into the above
//!
//! Every normalized event path is prefixed with `/<label>` so that several
//! repositories can share one virtual tree without colliding.

pub mod config;
pub mod date;
pub mod event;
pub mod options;
pub mod repo;

pub use config::*;
pub use event::*;
pub use options::*;
pub use repo::*;
