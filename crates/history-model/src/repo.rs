//! Configured source repositories.

use std::path::{Component, Path, PathBuf};

/// Commit-message filter applied at extraction time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFilter {
    /// Pattern matched against commit messages.
    pub pattern: String,

    /// Exclude matching commits instead of keeping them.
    pub invert: bool,
}

/// One repository whose history feeds the merged stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSpec {
    /// Repository working directory.
    pub repo_path: PathBuf,

    /// Virtual namespace segment; every event path starts with `/<label>`.
    pub label: String,

    /// Branch or commit to extract instead of the checked-out HEAD.
    pub git_ref: Option<String>,

    /// Optional commit-message filter.
    pub log_filter: Option<LogFilter>,
}

impl RepoSpec {
    /// Repository labelled after the final component of its path.
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        let repo_path = normalize_path(&repo_path.into());
        let label = default_label(&repo_path);
        Self {
            repo_path,
            label,
            git_ref: None,
            log_filter: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_ref(mut self, git_ref: impl Into<String>) -> Self {
        self.git_ref = Some(git_ref.into());
        self
    }

    pub fn with_filter(mut self, pattern: impl Into<String>, invert: bool) -> Self {
        self.log_filter = Some(LogFilter {
            pattern: pattern.into(),
            invert,
        });
        self
    }

    /// Scratch log location for this repository inside `work_dir`.
    pub fn raw_log_path(&self, work_dir: &Path) -> PathBuf {
        work_dir.join(format!("{}.log", self.label))
    }
}

/// Commit count extracted for one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoStats {
    pub repo: RepoSpec,
    pub commit_count: u64,
}

impl RepoStats {
    pub fn total(stats: &[RepoStats]) -> u64 {
        stats.iter().map(|s| s.commit_count).sum()
    }
}

/// Final path component, or the whole path when it has none.
pub fn default_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Lexically resolve `.` and `..` components without touching the filesystem.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(out.components().next_back(), Some(Component::Normal(_)))
                    && out.pop();
                if !popped && !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}
