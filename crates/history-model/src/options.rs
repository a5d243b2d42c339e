//! Run-wide options.

use std::path::PathBuf;

/// Where the merged stream is delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkConfig {
    /// Stream into the renderer instead of emitting the log as text.
    pub gource: bool,

    /// Output file: the encoded video when rendering, the log text otherwise.
    pub output: Option<PathBuf>,

    /// Extra renderer arguments.
    pub gource_arguments: Vec<String>,

    /// Extra encoder arguments.
    pub ffmpeg_arguments: Vec<String>,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            gource: true,
            output: None,
            gource_arguments: Vec::new(),
            ffmpeg_arguments: Vec::new(),
        }
    }
}

impl SinkConfig {
    /// Plain text to stdout.
    pub fn stdout() -> Self {
        Self {
            gource: false,
            ..Self::default()
        }
    }

    /// Plain text to a file.
    pub fn text_file(path: impl Into<PathBuf>) -> Self {
        Self {
            gource: false,
            output: Some(path.into()),
            ..Self::default()
        }
    }
}

/// Immutable parameters for one aggregation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Drop history before this instant (epoch ms) at extraction.
    pub since_ms: Option<i64>,

    /// Collapse history before this instant (epoch ms) into "Initial" events.
    pub consolidate_before_ms: Option<i64>,

    /// Prepend a root-directory marker per repository.
    pub fake_initial_commit: bool,

    /// Print per-repository commit counts after delivery.
    pub show_stats: bool,

    /// Scratch directory for raw per-repository logs.
    pub work_dir: PathBuf,

    /// Output selection.
    pub sink: SinkConfig,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            since_ms: None,
            consolidate_before_ms: None,
            fake_initial_commit: false,
            show_stats: false,
            work_dir: histweave_common::default_work_dir(),
            sink: SinkConfig::default(),
        }
    }
}
