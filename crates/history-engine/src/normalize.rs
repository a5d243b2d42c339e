//! Raw log normalization: label prefixing and history consolidation.

use std::collections::HashSet;
use std::path::Path;

use tokio::io::{AsyncBufReadExt, BufReader};

use histweave_common::error::HistweaveResult;
use histweave_model::event::{Event, TimestampSecs, INITIAL_AUTHOR};

/// How far before the cutoff consolidated events are placed (100 days).
pub const CONSOLIDATION_OFFSET_SECS: i64 = 8_640_000;

/// Collapses pre-cutoff history into one "Initial" event per path.
///
/// Scoped to a single repository.
#[derive(Debug, Clone)]
pub struct Consolidator {
    cutoff_ms: i64,
    seen: HashSet<String>,
}

impl Consolidator {
    pub fn new(cutoff_ms: i64) -> Self {
        Self {
            cutoff_ms,
            seen: HashSet::new(),
        }
    }

    /// Timestamp shared by every consolidated event. Never before the epoch.
    pub fn synthetic_timestamp(&self) -> TimestampSecs {
        self.cutoff_ms
            .div_euclid(1000)
            .saturating_sub(CONSOLIDATION_OFFSET_SECS)
            .max(0)
    }

    /// Whether `timestamp` falls before the cutoff.
    pub fn is_before_cutoff(&self, timestamp: TimestampSecs) -> bool {
        i128::from(timestamp) * 1000 < i128::from(self.cutoff_ms)
    }

    /// Pass the event through, rewrite it as an "Initial" event, or drop it.
    pub fn apply(&mut self, mut event: Event) -> Option<Event> {
        if !self.is_before_cutoff(event.timestamp) {
            return Some(event);
        }
        if !self.seen.insert(event.path.clone()) {
            return None;
        }
        event.timestamp = self.synthetic_timestamp();
        event.author = INITIAL_AUTHOR.to_string();
        Some(event)
    }

    /// Distinct paths consolidated so far.
    pub fn consolidated_paths(&self) -> usize {
        self.seen.len()
    }
}

/// Normalized events for one repository.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedLog {
    pub events: Vec<Event>,

    /// Malformed raw lines that were skipped.
    pub skipped_lines: usize,
}

/// Line-at-a-time normalizer for one repository's raw log.
#[derive(Debug)]
pub struct Normalizer {
    label: String,
    consolidator: Option<Consolidator>,
    log: NormalizedLog,
}

impl Normalizer {
    pub fn new(label: impl Into<String>, consolidate_before_ms: Option<i64>) -> Self {
        Self {
            label: label.into(),
            consolidator: consolidate_before_ms.map(Consolidator::new),
            log: NormalizedLog::default(),
        }
    }

    /// Feed one raw line; `line_no` is 1-based and only used for diagnostics.
    pub fn push_line(&mut self, line_no: usize, line: &str) {
        if line.is_empty() {
            return;
        }

        let event = match line.parse::<Event>() {
            Ok(event) => event.with_label_prefix(&self.label),
            Err(e) => {
                tracing::warn!(
                    label = %self.label,
                    line = line_no,
                    error = %e,
                    "Skipping malformed log line"
                );
                self.log.skipped_lines += 1;
                return;
            }
        };

        let event = match &mut self.consolidator {
            Some(consolidator) => consolidator.apply(event),
            None => Some(event),
        };
        if let Some(event) = event {
            self.log.events.push(event);
        }
    }

    pub fn finish(self) -> NormalizedLog {
        if let Some(consolidator) = &self.consolidator {
            tracing::debug!(
                label = %self.label,
                paths = consolidator.consolidated_paths(),
                "Consolidated pre-cutoff history"
            );
        }
        self.log
    }
}

/// Normalize an in-memory raw log.
pub fn normalize_str(raw: &str, label: &str, consolidate_before_ms: Option<i64>) -> NormalizedLog {
    let mut normalizer = Normalizer::new(label, consolidate_before_ms);
    for (index, line) in raw.lines().enumerate() {
        normalizer.push_line(index + 1, line);
    }
    normalizer.finish()
}

/// Normalize the raw log at `path`, reading one line at a time.
pub async fn normalize_file(
    path: &Path,
    label: &str,
    consolidate_before_ms: Option<i64>,
) -> HistweaveResult<NormalizedLog> {
    let file = tokio::fs::File::open(path).await?;
    let mut lines = BufReader::new(file).lines();
    let mut normalizer = Normalizer::new(label, consolidate_before_ms);

    let mut line_no = 0;
    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        normalizer.push_line(line_no, &line);
    }

    Ok(normalizer.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const CUTOFF_MS: i64 = 1_000_000_000_000;

    #[test]
    fn test_paths_are_prefixed() {
        let log = normalize_str("100|alice|A|/src/lib.rs\n", "core", None);
        assert_eq!(log.events[0].to_line(), "100|alice|A|/core/src/lib.rs");
    }

    #[test]
    fn test_blank_lines_are_ignored() {
        let log = normalize_str("\n100|alice|A|/a\n\n", "r", None);
        assert_eq!(log.events.len(), 1);
        assert_eq!(log.skipped_lines, 0);
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let log = normalize_str("100|alice|A\nnope|x|M|/b\n200|bob|M|/c\n", "r", None);
        assert_eq!(log.skipped_lines, 2);
        assert_eq!(log.events.len(), 1);
        assert_eq!(log.events[0].path, "/r/c");
    }

    #[test]
    fn test_consolidation_collapses_history_before_cutoff() {
        let raw = "\
999999000|alice|A|/a
999999100|bob|M|/a
999999200|bob|A|/b
1000000000|carol|M|/a
1000000100|carol|D|/b
";
        let log = normalize_str(raw, "repo", Some(CUTOFF_MS));
        let lines: Vec<String> = log.events.iter().map(Event::to_line).collect();
        assert_eq!(
            lines,
            vec![
                "991360000|Initial|A|/repo/a",
                "991360000|Initial|A|/repo/b",
                "1000000000|carol|M|/repo/a",
                "1000000100|carol|D|/repo/b",
            ]
        );
    }

    #[test]
    fn test_cutoff_with_sub_second_precision() {
        let mut consolidator = Consolidator::new(1_500);
        assert!(consolidator.is_before_cutoff(1));
        assert!(!consolidator.is_before_cutoff(2));
        assert_eq!(consolidator.synthetic_timestamp(), 0);

        let event = Event::new(1, "dev", histweave_model::ChangeKind::Modified, "/r/x");
        assert_eq!(consolidator.apply(event).unwrap().author, INITIAL_AUTHOR);
    }

    #[test]
    fn test_early_cutoff_clamps_to_epoch() {
        let log = normalize_str("100|dev|A|/f\n", "r", Some(1_000_000_000));
        assert_eq!(log.events.len(), 1);
        assert_eq!(log.events[0].to_line(), "0|Initial|A|/r/f");

        let reparsed: Event = log.events[0].to_line().parse().unwrap();
        assert_eq!(reparsed.timestamp, 0);
    }

    #[test]
    fn test_synthetic_timestamp_at_offset_boundary() {
        let cutoff_ms = CONSOLIDATION_OFFSET_SECS * 1000;
        assert_eq!(Consolidator::new(cutoff_ms).synthetic_timestamp(), 0);
        assert_eq!(Consolidator::new(cutoff_ms + 1_000).synthetic_timestamp(), 1);
        assert_eq!(Consolidator::new(i64::MIN).synthetic_timestamp(), 0);
    }

    #[tokio::test]
    async fn test_normalize_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("web.log");
        std::fs::write(&path, "5|dev|A|/index.html\n6|dev|M|/index.html\n").unwrap();

        let log = normalize_file(&path, "web", None).await.unwrap();
        assert_eq!(log.events.len(), 2);
        assert_eq!(log.events[1].to_line(), "6|dev|M|/web/index.html");
    }

    #[tokio::test]
    async fn test_normalize_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(normalize_file(&dir.path().join("absent.log"), "x", None)
            .await
            .is_err());
    }

    fn raw_event() -> impl Strategy<Value = (i64, String, String)> {
        (
            999_990_000i64..1_000_010_000,
            "[a-z]{1,6}",
            prop::sample::select(vec!["/a", "/b", "/c/d", "/c/e"]).prop_map(str::to_string),
        )
    }

    proptest! {
        #[test]
        fn prop_at_most_one_initial_event_per_path(
            events in prop::collection::vec(raw_event(), 0..64)
        ) {
            let raw: String = events
                .iter()
                .map(|(ts, author, path)| format!("{ts}|{author}|M|{path}\n"))
                .collect();
            let log = normalize_str(&raw, "lbl", Some(CUTOFF_MS));

            let mut initial_paths = HashSet::new();
            for event in &log.events {
                prop_assert!(event.path.starts_with("/lbl/"));
                if event.author == INITIAL_AUTHOR {
                    prop_assert!(initial_paths.insert(event.path.clone()));
                    prop_assert_eq!(event.timestamp, 991_360_000);
                } else {
                    prop_assert!(event.timestamp * 1000 >= CUTOFF_MS);
                }
            }

            let pre_cutoff: HashSet<&str> = events
                .iter()
                .filter(|(ts, _, _)| ts * 1000 < CUTOFF_MS)
                .map(|(_, _, path)| path.as_str())
                .collect();
            prop_assert_eq!(initial_paths.len(), pre_cutoff.len());
        }
    }
}
