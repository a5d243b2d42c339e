//! The JSON configuration file and its resolution into run inputs.
//!
//! ```json
//! {
//!   "repos": [{ "repoPath": "../api", "label": "api", "ref": "origin/main",
//!               "filterLogs": { "pattern": "^Merge", "invert": true } }],
//!   "options": { "since": "2023-01-01", "fakeInitialCommit": true }
//! }
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use histweave_common::error::{HistweaveError, HistweaveResult};

use crate::date::parse_date_argument;
use crate::event::FIELD_DELIMITER;
use crate::options::{RunOptions, SinkConfig};
use crate::repo::{default_label, normalize_path, LogFilter, RepoSpec};

/// Config file looked up in the current directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "histweave.json";

/// On-disk configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConfigFile {
    pub repos: Vec<RepoEntry>,

    #[serde(default)]
    pub options: FileOptions,
}

/// A repository as written in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RepoEntry {
    /// Relative to the config file's directory.
    pub repo_path: String,
    pub label: Option<String>,
    #[serde(rename = "ref")]
    pub git_ref: Option<String>,
    pub filter_logs: Option<FilterEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FilterEntry {
    pub pattern: String,
    #[serde(default)]
    pub invert: bool,
}

/// The `options` block. Every field is optional; command-line values win.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FileOptions {
    pub since: Option<String>,
    pub consolidate_before: Option<String>,
    pub fake_initial_commit: Option<bool>,
    pub show_stats: Option<bool>,
    pub work_dir: Option<PathBuf>,
    pub gource: Option<bool>,
    pub output: Option<PathBuf>,
    pub gource_arguments: Option<Vec<String>>,
    pub ffmpeg_arguments: Option<Vec<String>>,
}

/// Command-line values layered over the file options.
#[derive(Debug, Clone, Default)]
pub struct OptionOverrides {
    pub since: Option<String>,
    pub consolidate_before: Option<String>,
    pub fake_initial_commit: bool,
    pub show_stats: bool,
    pub no_gource: bool,
    pub output: Option<PathBuf>,
    pub work_dir: Option<PathBuf>,
}

/// Everything the coordinator needs for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub repos: Vec<RepoSpec>,
    pub options: RunOptions,
}

impl ConfigFile {
    /// Read and parse a config file.
    pub fn load(path: &Path) -> HistweaveResult<Self> {
        if !path.exists() {
            return Err(HistweaveError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
            .map_err(|e| HistweaveError::config(format!("{}: {e}", path.display())))
    }

    pub fn from_json(content: &str) -> HistweaveResult<Self> {
        serde_json::from_str(content).map_err(|e| HistweaveError::config(e.to_string()))
    }

    /// Repositories with paths resolved against `config_dir` and labels validated.
    pub fn resolve_repos(&self, config_dir: &Path) -> HistweaveResult<Vec<RepoSpec>> {
        let repos = self
            .repos
            .iter()
            .map(|entry| {
                let repo_path = normalize_path(&config_dir.join(&entry.repo_path));
                let label = entry
                    .label
                    .clone()
                    .unwrap_or_else(|| default_label(&repo_path));
                RepoSpec {
                    repo_path,
                    label,
                    git_ref: entry.git_ref.clone(),
                    log_filter: entry.filter_logs.as_ref().map(|f| LogFilter {
                        pattern: f.pattern.clone(),
                        invert: f.invert,
                    }),
                }
            })
            .collect::<Vec<_>>();

        validate_labels(&repos)?;
        Ok(repos)
    }

    /// Run options with `overrides` applied; relative paths resolve against `cwd`.
    pub fn resolve_options(
        &self,
        overrides: &OptionOverrides,
        cwd: &Path,
    ) -> HistweaveResult<RunOptions> {
        let file = &self.options;

        let since_ms = overrides
            .since
            .as_deref()
            .or(file.since.as_deref())
            .map(parse_date_argument)
            .transpose()?;
        let consolidate_before_ms = overrides
            .consolidate_before
            .as_deref()
            .or(file.consolidate_before.as_deref())
            .map(parse_date_argument)
            .transpose()?;

        let work_dir = overrides
            .work_dir
            .as_ref()
            .or(file.work_dir.as_ref())
            .map(|dir| normalize_path(&cwd.join(dir)))
            .unwrap_or_else(histweave_common::default_work_dir);

        let output = overrides
            .output
            .as_ref()
            .or(file.output.as_ref())
            .map(|out| normalize_path(&cwd.join(out)));

        Ok(RunOptions {
            since_ms,
            consolidate_before_ms,
            fake_initial_commit: overrides.fake_initial_commit
                || file.fake_initial_commit.unwrap_or(false),
            show_stats: overrides.show_stats || file.show_stats.unwrap_or(false),
            work_dir,
            sink: SinkConfig {
                gource: !overrides.no_gource && file.gource.unwrap_or(true),
                output,
                gource_arguments: file.gource_arguments.clone().unwrap_or_default(),
                ffmpeg_arguments: file.ffmpeg_arguments.clone().unwrap_or_default(),
            },
        })
    }
}

impl RunConfig {
    /// Load `config_path` and merge `overrides` over its options.
    pub fn load(
        config_path: &Path,
        overrides: &OptionOverrides,
        cwd: &Path,
    ) -> HistweaveResult<Self> {
        let config_path = normalize_path(&cwd.join(config_path));
        let file = ConfigFile::load(&config_path)?;
        let config_dir = config_path.parent().unwrap_or(cwd);

        Ok(Self {
            repos: file.resolve_repos(config_dir)?,
            options: file.resolve_options(overrides, cwd)?,
        })
    }
}

/// Characters a label may not contain. A label is one path segment of a
/// single log line.
const FORBIDDEN_LABEL_CHARS: [char; 5] = [FIELD_DELIMITER, '/', '\\', '\n', '\r'];

/// Labels must be non-empty, a single path segment, and unique.
pub fn validate_labels(repos: &[RepoSpec]) -> HistweaveResult<()> {
    let mut seen = HashSet::new();
    for repo in repos {
        if repo.label.is_empty() {
            return Err(HistweaveError::config(format!(
                "repository {} has an empty label",
                repo.repo_path.display()
            )));
        }
        if let Some(c) = repo.label.chars().find(|c| FORBIDDEN_LABEL_CHARS.contains(c)) {
            return Err(HistweaveError::config(format!(
                "label {:?} must not contain {c:?}",
                repo.label
            )));
        }
        if !seen.insert(repo.label.as_str()) {
            return Err(HistweaveError::config(format!(
                "duplicate label {:?}; set an explicit \"label\" for {}",
                repo.label,
                repo.repo_path.display()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_CONFIG: &str = r#"{
        "repos": [
            { "repoPath": "../api", "ref": "origin/main",
              "filterLogs": { "pattern": "^Merge", "invert": true } },
            { "repoPath": "web/", "label": "frontend" }
        ],
        "options": {
            "since": "2023-01-01",
            "fakeInitialCommit": true,
            "gource": false,
            "output": "out/log.txt",
            "gourceArguments": ["--seconds-per-day", "0.1"]
        }
    }"#;

    #[test]
    fn test_resolve_repos_relative_to_config_dir() {
        let file = ConfigFile::from_json(FULL_CONFIG).unwrap();
        let repos = file.resolve_repos(Path::new("/home/me/configs")).unwrap();

        assert_eq!(repos.len(), 2);
        assert_eq!(repos[0].repo_path, PathBuf::from("/home/me/api"));
        assert_eq!(repos[0].label, "api");
        assert_eq!(repos[0].git_ref.as_deref(), Some("origin/main"));
        assert_eq!(
            repos[0].log_filter,
            Some(LogFilter {
                pattern: "^Merge".to_string(),
                invert: true
            })
        );
        assert_eq!(repos[1].repo_path, PathBuf::from("/home/me/configs/web"));
        assert_eq!(repos[1].label, "frontend");
    }

    #[test]
    fn test_options_from_file() {
        let file = ConfigFile::from_json(FULL_CONFIG).unwrap();
        let options = file
            .resolve_options(&OptionOverrides::default(), Path::new("/cwd"))
            .unwrap();

        assert!(options.since_ms.is_some());
        assert_eq!(options.consolidate_before_ms, None);
        assert!(options.fake_initial_commit);
        assert!(!options.show_stats);
        assert!(!options.sink.gource);
        assert_eq!(options.sink.output, Some(PathBuf::from("/cwd/out/log.txt")));
        assert_eq!(options.sink.gource_arguments, vec!["--seconds-per-day", "0.1"]);
    }

    #[test]
    fn test_command_line_wins() {
        let file = ConfigFile::from_json(FULL_CONFIG).unwrap();
        let overrides = OptionOverrides {
            since: Some("2020-01-01T00:00:00Z".to_string()),
            output: Some(PathBuf::from("other.txt")),
            work_dir: Some(PathBuf::from("scratch")),
            show_stats: true,
            ..Default::default()
        };
        let options = file.resolve_options(&overrides, Path::new("/cwd")).unwrap();

        assert_eq!(options.since_ms, Some(1_577_836_800_000));
        assert_eq!(options.sink.output, Some(PathBuf::from("/cwd/other.txt")));
        assert_eq!(options.work_dir, PathBuf::from("/cwd/scratch"));
        assert!(options.show_stats);
        // absent flag keeps the file value
        assert!(options.fake_initial_commit);
    }

    #[test]
    fn test_no_gource_overrides_file() {
        let file =
            ConfigFile::from_json(r#"{ "repos": [], "options": { "gource": true } }"#).unwrap();
        let overrides = OptionOverrides {
            no_gource: true,
            ..Default::default()
        };
        let options = file.resolve_options(&overrides, Path::new("/")).unwrap();
        assert!(!options.sink.gource);
    }

    #[test]
    fn test_gource_defaults_on() {
        let file = ConfigFile::from_json(r#"{ "repos": [] }"#).unwrap();
        let options = file
            .resolve_options(&OptionOverrides::default(), Path::new("/"))
            .unwrap();
        assert!(options.sink.gource);
        assert_eq!(options.sink.output, None);
    }

    #[test]
    fn test_invalid_date_in_file() {
        let raw = r#"{ "repos": [], "options": { "since": "whenever" } }"#;
        let file = ConfigFile::from_json(raw).unwrap();
        let err = file
            .resolve_options(&OptionOverrides::default(), Path::new("/"))
            .unwrap_err();
        assert!(matches!(err, HistweaveError::InvalidDate { .. }));
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let err = ConfigFile::from_json(r#"{ "repos": [{ "repoPath": "a", "lable": "x" }] }"#)
            .unwrap_err();
        assert!(matches!(err, HistweaveError::Config { .. }));
    }

    #[test]
    fn test_duplicate_labels_rejected() {
        let file = ConfigFile::from_json(
            r#"{ "repos": [{ "repoPath": "a/app" }, { "repoPath": "b/app" }] }"#,
        )
        .unwrap();
        let err = file.resolve_repos(Path::new("/src")).unwrap_err();
        assert!(err.to_string().contains("duplicate label \"app\""));
    }

    #[test]
    fn test_delimiter_in_label_rejected() {
        let repos = vec![RepoSpec::new("/a").with_label("a|b")];
        assert!(validate_labels(&repos).is_err());
    }

    #[test]
    fn test_slash_in_label_rejected() {
        let repos = vec![
            RepoSpec::new("/a").with_label("a"),
            RepoSpec::new("/b").with_label("a/b"),
        ];
        let err = validate_labels(&repos).unwrap_err();
        assert!(err.to_string().contains("a/b"));
    }

    #[test]
    fn test_backslash_in_label_rejected() {
        let repos = vec![RepoSpec::new("/a").with_label("a\\b")];
        assert!(matches!(
            validate_labels(&repos),
            Err(HistweaveError::Config { .. })
        ));
    }

    #[test]
    fn test_line_break_in_label_rejected() {
        for label in ["a\nb", "a\rb", "trailing\n"] {
            let repos = vec![RepoSpec::new("/a").with_label(label)];
            assert!(validate_labels(&repos).is_err(), "{label:?} accepted");
        }
    }

    #[test]
    fn test_label_from_config_file_validated() {
        let file = ConfigFile::from_json(
            r#"{ "repos": [{ "repoPath": "a", "label": "team/api" }] }"#,
        )
        .unwrap();
        assert!(file.resolve_repos(Path::new("/src")).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = ConfigFile::load(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, HistweaveError::FileNotFound { .. }));
    }

    #[test]
    fn test_run_config_load() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("histweave.json");
        std::fs::write(&config_path, r#"{ "repos": [{ "repoPath": "repo-one" }] }"#).unwrap();

        let config =
            RunConfig::load(Path::new("histweave.json"), &OptionOverrides::default(), dir.path())
                .unwrap();
        assert_eq!(config.repos[0].repo_path, dir.path().join("repo-one"));
        assert_eq!(config.repos[0].label, "repo-one");
    }
}
