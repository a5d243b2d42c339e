//! Change events in the renderer's custom log format.
//!
//! One event per line, four fields joined by `|`:
//!
//! ```text
//! 1700000000|alice|A|/api/src/main.rs
//! ```
//!
//! Raw per-repository logs carry repository-relative paths; normalized
//! streams carry paths prefixed with `/<label>`.

use std::fmt;
use std::str::FromStr;

/// Seconds since the Unix epoch.
pub type TimestampSecs = i64;

/// Field delimiter of the log format.
pub const FIELD_DELIMITER: char = '|';

/// Author used for synthesized events.
pub const INITIAL_AUTHOR: &str = "Initial";

/// Kind of change applied to a path.
///
/// The pipeline treats the code as opaque: anything other than the three
/// well-known letters is carried through verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
    Other(String),
}

impl ChangeKind {
    pub fn from_code(code: &str) -> Self {
        match code {
            "A" => Self::Added,
            "M" => Self::Modified,
            "D" => Self::Deleted,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            Self::Added => "A",
            Self::Modified => "M",
            Self::Deleted => "D",
            Self::Other(code) => code,
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A single change record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Commit time in epoch seconds.
    pub timestamp: TimestampSecs,

    /// Commit author display name.
    pub author: String,

    /// What happened to the path.
    pub kind: ChangeKind,

    /// File path; `/<label>/...` once normalized.
    pub path: String,
}

/// Reasons a log line cannot be read as an event.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EventParseError {
    #[error("expected 4 '|'-delimited fields, found {found}")]
    FieldCount { found: usize },

    #[error("invalid timestamp {value:?}")]
    Timestamp { value: String },
}

impl Event {
    pub fn new(
        timestamp: TimestampSecs,
        author: impl Into<String>,
        kind: ChangeKind,
        path: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            author: author.into(),
            kind,
            path: path.into(),
        }
    }

    /// Root-directory creation marker for a repository: `ts|Initial|A|/<label>/.`
    pub fn root_marker(timestamp: TimestampSecs, label: &str) -> Self {
        Self::new(
            timestamp,
            INITIAL_AUTHOR,
            ChangeKind::Added,
            format!("/{label}/."),
        )
    }

    /// Move the path under `/<label>`.
    pub fn with_label_prefix(mut self, label: &str) -> Self {
        self.path = format!("/{label}{}", self.path);
        self
    }

    /// Serialized log line, without the trailing newline.
    ///
    /// This string is also the global sort key of the merged stream.
    pub fn to_line(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{d}{}{d}{}{d}{}",
            self.timestamp,
            self.author,
            self.kind,
            self.path,
            d = FIELD_DELIMITER
        )
    }
}

impl FromStr for Event {
    type Err = EventParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = line.split(FIELD_DELIMITER).collect();
        let [timestamp, author, kind, path] = fields[..] else {
            return Err(EventParseError::FieldCount {
                found: fields.len(),
            });
        };

        let timestamp = timestamp
            .trim()
            .parse::<TimestampSecs>()
            .ok()
            .filter(|ts| *ts >= 0)
            .ok_or_else(|| EventParseError::Timestamp {
                value: timestamp.to_string(),
            })?;

        Ok(Self::new(timestamp, author, ChangeKind::from_code(kind), path))
    }
}

/// Serialize events as newline-terminated log lines.
pub fn serialize_events(events: &[Event]) -> String {
    events
        .iter()
        .map(|e| format!("{e}\n"))
        .collect::<Vec<_>>()
        .concat()
}

/// Parse a log, skipping blank lines. Fails on the first malformed line.
pub fn parse_events(log: &str) -> Result<Vec<Event>, EventParseError> {
    log.lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::parse)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_raw_line() {
        let event: Event = "1700000000|alice|A|/src/main.rs".parse().unwrap();
        assert_eq!(event.timestamp, 1_700_000_000);
        assert_eq!(event.author, "alice");
        assert_eq!(event.kind, ChangeKind::Added);
        assert_eq!(event.path, "/src/main.rs");
    }

    #[test]
    fn test_unknown_change_kind_passes_through() {
        let event: Event = "10|bob|R|/a".parse().unwrap();
        assert_eq!(event.kind, ChangeKind::Other("R".to_string()));
        assert_eq!(event.to_line(), "10|bob|R|/a");
    }

    #[test]
    fn test_wrong_field_count_is_rejected() {
        assert_eq!(
            "10|bob|M".parse::<Event>(),
            Err(EventParseError::FieldCount { found: 3 })
        );
        assert_eq!(
            "10|bob|M|/a|extra".parse::<Event>(),
            Err(EventParseError::FieldCount { found: 5 })
        );
    }

    #[test]
    fn test_bad_timestamp_is_rejected() {
        assert!(matches!(
            "yesterday|bob|M|/a".parse::<Event>(),
            Err(EventParseError::Timestamp { .. })
        ));
        assert!(matches!(
            "-5|bob|M|/a".parse::<Event>(),
            Err(EventParseError::Timestamp { .. })
        ));
    }

    #[test]
    fn test_root_marker_format() {
        assert_eq!(Event::root_marker(50, "api").to_line(), "50|Initial|A|/api/.");
    }

    #[test]
    fn test_label_prefix() {
        let event = Event::new(1, "a", ChangeKind::Modified, "/x/y.rs").with_label_prefix("web");
        assert_eq!(event.path, "/web/x/y.rs");
    }

    #[test]
    fn test_parse_events_skips_blank_lines() {
        let log = "1|a|A|/x\n\n2|b|M|/y\n";
        let events = parse_events(log).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(serialize_events(&events), "1|a|A|/x\n2|b|M|/y\n");
    }
}
