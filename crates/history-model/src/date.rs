//! Date arguments for `since` and `consolidateBefore`.
//!
//! Accepted forms:
//! - RFC 3339 (`2024-01-01T00:00:00Z`)
//! - `YYYY-MM-DD`, `YYYY-MM-DD HH:MM[:SS]`, `YYYY-MM-DDTHH:MM:SS` in local time
//! - `now`, `today`, `yesterday`
//! - `N <unit>[s] ago` for second, minute, hour, day, week, month, year

use chrono::{DateTime, Local, Months, NaiveDate, NaiveDateTime, TimeDelta, TimeZone};

use histweave_common::error::{HistweaveError, HistweaveResult};

const NAIVE_DATETIME_FORMATS: [&str; 3] =
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Parse a date argument into epoch milliseconds, relative to the current time.
pub fn parse_date_argument(value: &str) -> HistweaveResult<i64> {
    parse_date_at(value, Local::now())
}

/// Parse a date argument into epoch milliseconds, relative to `now`.
pub fn parse_date_at(value: &str, now: DateTime<Local>) -> HistweaveResult<i64> {
    let trimmed = value.trim();
    let lower = trimmed.to_ascii_lowercase();

    let keyword = match lower.as_str() {
        "now" => Some(now),
        "today" => start_of_day(now.date_naive()),
        "yesterday" => now.date_naive().pred_opt().and_then(start_of_day),
        _ => None,
    };

    keyword
        .or_else(|| {
            DateTime::parse_from_rfc3339(trimmed)
                .ok()
                .map(|d| d.with_timezone(&Local))
        })
        .or_else(|| parse_local(trimmed))
        .or_else(|| parse_relative(&lower, now))
        .map(|d| d.timestamp_millis())
        .ok_or_else(|| HistweaveError::invalid_date(value))
}

/// Local calendar day of an epoch-millisecond instant, as `YYYY-MM-DD`.
pub fn format_day(epoch_ms: i64) -> Option<String> {
    Local
        .timestamp_millis_opt(epoch_ms)
        .earliest()
        .map(|d| d.format("%Y-%m-%d").to_string())
}

fn start_of_day(date: NaiveDate) -> Option<DateTime<Local>> {
    date.and_hms_opt(0, 0, 0)?
        .and_local_timezone(Local)
        .earliest()
}

fn parse_local(value: &str) -> Option<DateTime<Local>> {
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return start_of_day(date);
    }
    NAIVE_DATETIME_FORMATS.iter().find_map(|format| {
        NaiveDateTime::parse_from_str(value, format)
            .ok()
            .and_then(|dt| dt.and_local_timezone(Local).earliest())
    })
}

fn parse_relative(value: &str, now: DateTime<Local>) -> Option<DateTime<Local>> {
    let mut parts = value.split_whitespace();
    let amount: u32 = parts.next()?.parse().ok()?;
    let unit = parts.next()?;
    if parts.next()? != "ago" || parts.next().is_some() {
        return None;
    }

    let seconds_per_unit: i64 = match unit.strip_suffix('s').unwrap_or(unit) {
        "second" | "sec" => 1,
        "minute" | "min" => 60,
        "hour" => 3_600,
        "day" => 86_400,
        "week" => 604_800,
        "month" => return now.checked_sub_months(Months::new(amount)),
        "year" => return now.checked_sub_months(Months::new(amount.checked_mul(12)?)),
        _ => return None,
    };

    let delta = TimeDelta::try_seconds(i64::from(amount).checked_mul(seconds_per_unit)?)?;
    now.checked_sub_signed(delta)
}
