//! histweave — merge the history of many repositories into one timeline.
//!
//! Usage:
//!   histweave [CONFIG_FILE] [OPTIONS]
//!
//! Reads `histweave.json` from the current directory when no config file is
//! given, then streams the merged log into gource (and ffmpeg with
//! `--output`), or prints it with `--no-gource`.

use std::path::PathBuf;

use clap::Parser;

mod commands;

#[derive(Parser, Debug)]
#[command(
    name = "histweave",
    about = "Visualize the history of many repositories as one gource timeline",
    version,
    author
)]
pub struct Cli {
    /// Configuration file containing repository list and options [default: histweave.json]
    pub config: Option<PathBuf>,

    /// Only include logs after <DATE>
    #[arg(short, long, value_name = "DATE")]
    pub since: Option<String>,

    /// Consolidate all commits before <DATE> into a single "Initial" commit
    #[arg(short = 'i', long, value_name = "DATE")]
    pub consolidate_before: Option<String>,

    /// Create a fake initial commit for each repository; helpful when hiding
    /// root directory connections in gource
    #[arg(long)]
    pub fake_initial_commit: bool,

    /// Do not launch gource; just output the logs
    #[arg(long)]
    pub no_gource: bool,

    /// Save the video (or the logs with --no-gource) to <FILE>
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Show a table of commit counts for each repository, and the total
    #[arg(long)]
    pub show_stats: bool,

    /// Scratch directory for per-repository logs
    #[arg(long, value_name = "DIR")]
    pub work_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    histweave_common::logging::init_logging(
        &histweave_common::config::LoggingConfig::for_verbosity(cli.verbose),
    )?;

    commands::run::run(cli).await
}
