//! Per-repository raw log extraction.

use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};

use tokio::process::Command;

use histweave_common::error::{HistweaveError, HistweaveResult};
use histweave_model::date::format_day;
use histweave_model::repo::RepoSpec;

/// Version-control and log-export collaborator.
///
/// `filter` is the argument list from [`build_filter_args`].
#[async_trait::async_trait]
pub trait HistorySource: Send + Sync {
    /// Update remote tracking refs.
    async fn fetch_remotes(&self, repo: &RepoSpec) -> HistweaveResult<()>;

    /// Number of commits matching `filter`.
    async fn count_commits(&self, repo: &RepoSpec, filter: &[String]) -> HistweaveResult<u64>;

    /// Write the raw `timestamp|author|kind|path` log, oldest first, to `log_path`.
    async fn export_log(
        &self,
        repo: &RepoSpec,
        filter: &[String],
        log_path: &Path,
    ) -> HistweaveResult<()>;

    /// Source name.
    fn name(&self) -> &str;
}

/// Commit filter arguments: since-date, message pattern, then ref.
pub fn build_filter_args(repo: &RepoSpec, since_ms: Option<i64>) -> Vec<String> {
    let mut args = Vec::new();

    if let Some(day) = since_ms.and_then(format_day) {
        args.push("--since".to_string());
        args.push(day);
    }

    if let Some(filter) = &repo.log_filter {
        args.push("--grep".to_string());
        args.push(filter.pattern.clone());
        if filter.invert {
            args.push("--invert-grep".to_string());
        }
    }

    if let Some(git_ref) = &repo.git_ref {
        args.push(git_ref.clone());
    }

    args
}

/// Produce the raw log for `repo` at `log_path` and return its commit count.
///
/// The export tool fails on empty input, so a zero count short-circuits to
/// an empty file.
pub async fn extract_repo(
    source: &dyn HistorySource,
    repo: &RepoSpec,
    since_ms: Option<i64>,
    log_path: &Path,
) -> HistweaveResult<u64> {
    if repo.git_ref.is_some() {
        source.fetch_remotes(repo).await?;
    }

    let filter = build_filter_args(repo, since_ms);
    tracing::debug!(path = %repo.repo_path.display(), args = ?filter, "Filter arguments");

    let commits = source.count_commits(repo, &filter).await?;
    if commits == 0 {
        tracing::debug!(path = %repo.repo_path.display(), "No commits found");
        tokio::fs::write(log_path, "").await?;
        return Ok(0);
    }

    source.export_log(repo, &filter, log_path).await?;
    Ok(commits)
}

/// `git` for history, `gource` for log conversion.
#[derive(Debug, Clone)]
pub struct GitSource {
    pub git_bin: PathBuf,
    pub gource_bin: PathBuf,
}

impl Default for GitSource {
    fn default() -> Self {
        Self::new()
    }
}

impl GitSource {
    pub fn new() -> Self {
        Self {
            git_bin: PathBuf::from("git"),
            gource_bin: PathBuf::from("gource"),
        }
    }

    fn git(&self, repo: &RepoSpec) -> Command {
        let mut cmd = Command::new(&self.git_bin);
        cmd.current_dir(&repo.repo_path)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        cmd
    }

    /// The `git log` arguments gource uses for its own git support.
    async fn log_command_args(&self, repo: &RepoSpec) -> HistweaveResult<Vec<String>> {
        let output = Command::new(&self.gource_bin)
            .args(["--log-command", "git"])
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(io_failure(repo, "run gource"))?;
        let stdout = checked_stdout(repo, "gource --log-command", output)?;
        parse_log_command(&stdout).ok_or_else(|| {
            HistweaveError::extraction(
                &repo.label,
                format!("Unexpected gource log command: {stdout:?}"),
            )
        })
    }
}

#[async_trait::async_trait]
impl HistorySource for GitSource {
    async fn fetch_remotes(&self, repo: &RepoSpec) -> HistweaveResult<()> {
        let output = self
            .git(repo)
            .args(["fetch", "--all"])
            .output()
            .await
            .map_err(io_failure(repo, "run git"))?;
        checked_stdout(repo, "git fetch", output)?;
        Ok(())
    }

    async fn count_commits(&self, repo: &RepoSpec, filter: &[String]) -> HistweaveResult<u64> {
        let output = self
            .git(repo)
            .args(["log", "--pretty=oneline"])
            .args(filter)
            .output()
            .await
            .map_err(io_failure(repo, "run git"))?;
        let stdout = checked_stdout(repo, "git log", output)?;
        Ok(stdout.lines().filter(|l| !l.trim().is_empty()).count() as u64)
    }

    async fn export_log(
        &self,
        repo: &RepoSpec,
        filter: &[String],
        log_path: &Path,
    ) -> HistweaveResult<()> {
        let log_args = self.log_command_args(repo).await?;

        let mut git = self
            .git(repo)
            .args(&log_args)
            .args(filter)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(io_failure(repo, "start git"))?;

        let history: Stdio = git
            .stdout
            .take()
            .ok_or_else(|| HistweaveError::extraction(&repo.label, "Failed to capture stdout"))?
            .try_into()?;

        let gource = Command::new(&self.gource_bin)
            .args(["--log-format", "git", "--output-custom-log"])
            .arg(log_path)
            .arg("-")
            .current_dir(&repo.repo_path)
            .stdin(history)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(io_failure(repo, "start gource"))?;

        tracing::debug!(
            git_pid = git.id(),
            gource_pid = gource.id(),
            log = %log_path.display(),
            "Exporting history"
        );

        let (git_out, gource_out) = tokio::join!(git.wait_with_output(), gource.wait_with_output());
        let gource_out = gource_out.map_err(io_failure(repo, "wait on gource"))?;
        let git_out = git_out.map_err(io_failure(repo, "wait on git"))?;

        checked_stdout(repo, "gource --output-custom-log", gource_out)?;
        checked_stdout(repo, "git log", git_out)?;
        Ok(())
    }

    fn name(&self) -> &str {
        "git"
    }
}

/// Split `gource --log-command git` output into arguments after the program.
fn parse_log_command(stdout: &str) -> Option<Vec<String>> {
    let mut words = stdout.split_whitespace();
    if words.next()? != "git" {
        return None;
    }
    Some(words.map(str::to_string).collect())
}

fn io_failure<'a>(
    repo: &'a RepoSpec,
    action: &'a str,
) -> impl Fn(std::io::Error) -> HistweaveError + 'a {
    move |e| HistweaveError::extraction(&repo.label, format!("Failed to {action}: {e}"))
}

fn checked_stdout(repo: &RepoSpec, what: &str, output: Output) -> HistweaveResult<String> {
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(HistweaveError::extraction(
            &repo.label,
            format!("{what} failed ({}): {}", output.status, stderr.trim()),
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
