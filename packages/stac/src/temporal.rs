//! RFC 3339 timestamp and `start/end` range validation.
//!
//! Query `time` values and every `time_series` entry are either a single
//! RFC 3339 timestamp (`2024-01-01T00:00:00Z`) or two of them joined by a
//! single `/` (`2024-01-01T00:00:00Z/2024-01-31T00:00:00Z`).

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Separator between the start and end of a time range.
pub const RANGE_SEPARATOR: char = '/';

/// Parsed start/end of a temporal query value.
///
/// A single timestamp yields a range where `start == end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Inclusive start of the range.
    pub start: DateTime<FixedOffset>,
    /// Inclusive end of the range.
    pub end: DateTime<FixedOffset>,
}

impl TimeRange {
    /// Whether the range describes a single instant.
    #[must_use]
    pub fn is_instant(&self) -> bool {
        self.start == self.end
    }
}

/// Returns `true` if `value` is absent, a single RFC 3339 timestamp, or two
/// RFC 3339 timestamps joined by exactly one `/`.
///
/// Never panics on malformed input; parse failures are reported as `false`.
#[must_use]
pub fn is_valid_temporal(value: Option<&str>) -> bool {
    value.is_none_or(|s| parse_temporal(s).is_some())
}

/// Parses a single timestamp or a `start/end` range.
///
/// Returns `None` when there is more than one separator or either side is
/// not a valid RFC 3339 timestamp.
#[must_use]
pub fn parse_temporal(value: &str) -> Option<TimeRange> {
    let mut parts = value.split(RANGE_SEPARATOR);
    let first = parts.next()?;

    match (parts.next(), parts.next()) {
        (None, _) => {
            let instant = parse_rfc3339(first)?;
            Some(TimeRange {
                start: instant,
                end: instant,
            })
        }
        (Some(second), None) => Some(TimeRange {
            start: parse_rfc3339(first)?,
            end: parse_rfc3339(second)?,
        }),
        (Some(_), Some(_)) => None,
    }
}

fn parse_rfc3339(s: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(s).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_value_is_valid() {
        assert!(is_valid_temporal(None));
    }

    #[test]
    fn accepts_single_timestamp() {
        assert!(is_valid_temporal(Some("2024-01-01T00:00:00Z")));
        assert!(is_valid_temporal(Some("2024-01-01T12:30:00.250+02:00")));
    }

    #[test]
    fn accepts_range() {
        assert!(is_valid_temporal(Some(
            "2024-01-01T00:00:00Z/2024-02-01T00:00:00Z"
        )));
    }

    #[test]
    fn rejects_garbage() {
        assert!(!is_valid_temporal(Some("not-a-date")));
        assert!(!is_valid_temporal(Some("")));
        assert!(!is_valid_temporal(Some("2024-01-01")));
    }

    #[test]
    fn rejects_more_than_one_separator() {
        assert!(!is_valid_temporal(Some("a/b/c")));
        assert!(!is_valid_temporal(Some(
            "2024-01-01T00:00:00Z/2024-01-02T00:00:00Z/2024-01-03T00:00:00Z"
        )));
    }

    #[test]
    fn rejects_range_with_one_bad_side() {
        assert!(!is_valid_temporal(Some("2024-01-01T00:00:00Z/tomorrow")));
        assert!(!is_valid_temporal(Some("/2024-01-01T00:00:00Z")));
    }

    #[test]
    fn single_timestamp_parses_as_instant() {
        let range = parse_temporal("2024-01-01T00:00:00Z").unwrap();
        assert!(range.is_instant());
    }

    #[test]
    fn range_keeps_start_and_end() {
        let range = parse_temporal("2024-01-01T00:00:00Z/2024-01-31T00:00:00Z").unwrap();
        assert!(!range.is_instant());
        assert_eq!(range.start.to_rfc3339(), "2024-01-01T00:00:00+00:00");
        assert_eq!(range.end.to_rfc3339(), "2024-01-31T00:00:00+00:00");
    }
}
