//! Resolve configuration, run the pipeline, report.

use std::path::{Path, PathBuf};

use histweave_engine::Coordinator;
use histweave_model::config::{OptionOverrides, RunConfig, DEFAULT_CONFIG_FILE};

use crate::commands::stats;
use crate::Cli;

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;

    let Some(config_path) = resolve_config_path(cli.config.as_deref(), &cwd)? else {
        tracing::warn!(
            "No configuration file specified, and {DEFAULT_CONFIG_FILE} not found in current directory."
        );
        return Ok(());
    };

    let overrides = OptionOverrides {
        since: cli.since,
        consolidate_before: cli.consolidate_before,
        fake_initial_commit: cli.fake_initial_commit,
        show_stats: cli.show_stats,
        no_gource: cli.no_gource,
        output: cli.output,
        work_dir: cli.work_dir,
    };

    let config = RunConfig::load(&config_path, &overrides, &cwd)?;
    tracing::debug!(
        config = %config_path.display(),
        repos = config.repos.len(),
        options = ?config.options,
        "Configuration loaded"
    );

    let summary = Coordinator::default()
        .run(&config.repos, &config.options)
        .await?;

    // Stats are printed whatever the delivery outcome.
    if config.options.show_stats {
        stats::print_table(&summary.stats);
    }

    match summary.delivery {
        Ok(pipe) => {
            tracing::debug!(
                lines = pipe.lines_written,
                downstream_closed = pipe.downstream_closed,
                "Run complete"
            );
            Ok(())
        }
        Err(e) if e.is_broken_pipe() => {
            tracing::debug!("Output consumer closed early");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// The config file to load, or `None` when the default one is absent.
///
/// An explicitly named file that does not exist is an error.
fn resolve_config_path(explicit: Option<&Path>, cwd: &Path) -> anyhow::Result<Option<PathBuf>> {
    match explicit {
        Some(path) => {
            let path = cwd.join(path);
            if !path.exists() {
                anyhow::bail!("Configuration file {} not found.", path.display());
            }
            Ok(Some(path))
        }
        None => {
            let path = cwd.join(DEFAULT_CONFIG_FILE);
            Ok(path.exists().then_some(path))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_default_config_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(resolve_config_path(None, dir.path()).unwrap(), None);
    }

    #[test]
    fn test_default_config_is_found() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(DEFAULT_CONFIG_FILE), "{\"repos\":[]}").unwrap();
        assert_eq!(
            resolve_config_path(None, dir.path()).unwrap(),
            Some(dir.path().join(DEFAULT_CONFIG_FILE))
        );
    }

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_config_path(Some(Path::new("nope.json")), dir.path()).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
