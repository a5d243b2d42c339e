//! Run coordination: fan repositories out, fan results in, deliver.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::Instrument;

use histweave_common::error::{HistweaveError, HistweaveResult};
use histweave_model::event::Event;
use histweave_model::options::RunOptions;
use histweave_model::repo::{RepoSpec, RepoStats};
use histweave_output::pipe::{OutputPipe, PipeSummary};

use crate::extract::{extract_repo, GitSource, HistorySource};
use crate::merge::merge_streams;
use crate::normalize::{normalize_file, NormalizedLog};

/// Per-repository results, in repository configuration order.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Normalized event sequence per repository.
    pub streams: Vec<Vec<Event>>,

    /// Commit count per repository.
    pub stats: Vec<RepoStats>,

    /// Malformed raw lines skipped across all repositories.
    pub skipped_lines: usize,
}

impl RunReport {
    /// Globally ordered stream for delivery.
    pub fn merge(
        self,
        repos: &[RepoSpec],
        fake_initial_commit: bool,
    ) -> (Vec<Event>, Vec<RepoStats>) {
        let events = merge_streams(self.streams, repos, fake_initial_commit);
        (events, self.stats)
    }
}

/// Outcome of a run whose repositories were all collected.
///
/// The stats survive a sink failure; `delivery` carries that failure.
#[derive(Debug)]
pub struct RunSummary {
    pub stats: Vec<RepoStats>,
    pub delivery: HistweaveResult<PipeSummary>,
}

/// Drives extraction and normalization for every repository concurrently.
pub struct Coordinator {
    source: Arc<dyn HistorySource>,
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new(Arc::new(GitSource::new()))
    }
}

impl Coordinator {
    pub fn new(source: Arc<dyn HistorySource>) -> Self {
        Self { source }
    }

    /// Extract and normalize every repository, one task each.
    ///
    /// The first failing repository aborts the others and fails the run
    /// with that repository's label.
    pub async fn collect(
        &self,
        repos: &[RepoSpec],
        options: &RunOptions,
    ) -> HistweaveResult<RunReport> {
        tokio::fs::create_dir_all(&options.work_dir)
            .await
            .map_err(|e| {
                HistweaveError::config(format!(
                    "Failed to create work directory {}: {e}",
                    options.work_dir.display()
                ))
            })?;

        tracing::info!(
            repos = repos.len(),
            source = self.source.name(),
            work_dir = %options.work_dir.display(),
            "Extracting repository history"
        );

        let mut tasks = JoinSet::new();
        let mut task_labels = HashMap::new();
        for (index, repo) in repos.iter().cloned().enumerate() {
            let source = Arc::clone(&self.source);
            let since_ms = options.since_ms;
            let consolidate_before_ms = options.consolidate_before_ms;
            let log_path = repo.raw_log_path(&options.work_dir);
            let span = tracing::info_span!("repo", label = %repo.label);

            let label = repo.label.clone();
            let handle = tasks.spawn(
                async move {
                    let result = process_repo(
                        source.as_ref(),
                        &repo,
                        since_ms,
                        consolidate_before_ms,
                        &log_path,
                    )
                    .await;
                    (index, repo, result)
                }
                .instrument(span),
            );
            task_labels.insert(handle.id(), label);
        }

        let mut slots: Vec<Option<(RepoStats, NormalizedLog)>> = vec![None; repos.len()];
        while let Some(joined) = tasks.join_next().await {
            let (index, repo, result) = match joined {
                Ok(done) => done,
                Err(e) => {
                    let label = task_labels.get(&e.id()).map_or("<unknown>", String::as_str);
                    tracing::error!(label = %label, error = %e, "Repository task failed");
                    return Err(HistweaveError::extraction(
                        label,
                        format!("task failed to complete: {e}"),
                    ));
                }
            };

            match result {
                Ok((commit_count, log)) => {
                    tracing::debug!(
                        label = %repo.label,
                        commits = commit_count,
                        events = log.events.len(),
                        "Repository processed"
                    );
                    slots[index] = Some((RepoStats { repo, commit_count }, log));
                }
                Err(e) => {
                    tracing::error!(
                        label = %repo.label,
                        error = %e,
                        "Repository processing failed"
                    );
                    // Dropping the JoinSet aborts the remaining tasks.
                    return Err(labelled(&repo.label, e));
                }
            }
        }

        let mut report = RunReport::default();
        for (stats, log) in slots.into_iter().flatten() {
            report.skipped_lines += log.skipped_lines;
            report.streams.push(log.events);
            report.stats.push(stats);
        }

        if report.skipped_lines > 0 {
            tracing::warn!(lines = report.skipped_lines, "Skipped malformed log lines");
        }

        Ok(report)
    }

    /// Collect, merge, and deliver to the configured sink.
    ///
    /// The sink is opened only after every repository succeeded. Only a
    /// collection failure is returned as `Err`.
    pub async fn run(
        &self,
        repos: &[RepoSpec],
        options: &RunOptions,
    ) -> HistweaveResult<RunSummary> {
        let report = self.collect(repos, options).await?;
        let (events, stats) = report.merge(repos, options.fake_initial_commit);

        tracing::info!(events = events.len(), "Delivering merged stream");
        let delivery = match OutputPipe::open(&options.sink).await {
            Ok(pipe) => deliver(&events, pipe).await,
            Err(e) => Err(e),
        };

        Ok(RunSummary { stats, delivery })
    }
}

/// Write every event, then close the pipe. Closing happens even for an
/// empty stream.
pub async fn deliver(events: &[Event], mut pipe: OutputPipe) -> HistweaveResult<PipeSummary> {
    for event in events {
        pipe.write_line(&event.to_line()).await?;
    }
    pipe.finish().await
}

async fn process_repo(
    source: &dyn HistorySource,
    repo: &RepoSpec,
    since_ms: Option<i64>,
    consolidate_before_ms: Option<i64>,
    log_path: &Path,
) -> HistweaveResult<(u64, NormalizedLog)> {
    let commits = extract_repo(source, repo, since_ms, log_path).await?;
    let log = normalize_file(log_path, &repo.label, consolidate_before_ms).await?;
    Ok((commits, log))
}

fn labelled(label: &str, e: HistweaveError) -> HistweaveError {
    match e {
        HistweaveError::Extraction { .. } => e,
        other => HistweaveError::extraction(label, other.to_string()),
    }
}
