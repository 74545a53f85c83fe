//! Filter directives and their textual forms.
//!
//! Directives are validated when they are built, so a bad pattern or
//! duration is reported before any record is looked at.
//!
//! # Durations
//!
//! `<digits>[s|m|h|d]`; a bare number means seconds: `3600`, `1800s`, `30m`,
//! `2h`, `1d`.
//!
//! # Field matches
//!
//! `FIELD=REGEX`, e.g. `reason=timed out` or `source_ip=^192\.0\.2\.`.
//! Matching is case-insensitive and unanchored.

use chrono::{Duration, NaiveDateTime};
use regex::{Regex, RegexBuilder};

use crate::error::{QueueError, Result};
use crate::model::record::{MessageRecord, RecordField};

/// Which side of the age threshold to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgeDirection {
    /// Keep messages queued at most the threshold ago (`--maxage`).
    YoungerThan,
    /// Keep messages queued at least the threshold ago (`--minage`).
    OlderThan,
}

/// Keep or drop messages under active delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    OnlyActive,
    ExcludeActive,
}

impl StatusFilter {
    /// Build from the two command-line flags, rejecting the combination.
    pub fn from_flags(only_active: bool, exclude_active: bool) -> Result<Option<Self>> {
        match (only_active, exclude_active) {
            (true, true) => Err(QueueError::ConflictingStatusFilters),
            (true, false) => Ok(Some(Self::OnlyActive)),
            (false, true) => Ok(Some(Self::ExcludeActive)),
            (false, false) => Ok(None),
        }
    }
}

/// One narrowing step applied to a record set.
#[derive(Debug, Clone)]
pub enum FilterDirective {
    /// Keep records whose `field` contains a case-insensitive match of `pattern`.
    Attribute { field: RecordField, pattern: Regex },
    /// Keep records on one side of an age threshold (inclusive).
    Age {
        direction: AgeDirection,
        threshold: Duration,
    },
    /// Keep only active, or only non-active, records.
    Status(StatusFilter),
}

impl FilterDirective {
    /// Attribute filter; fails with `InvalidPattern` if `pattern` does not compile.
    pub fn attribute(field: RecordField, pattern: &str) -> Result<Self> {
        let pattern = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|source| QueueError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })?;
        Ok(Self::Attribute { field, pattern })
    }

    /// Attribute filter from `FIELD=REGEX`.
    pub fn parse_match(expr: &str) -> Result<Self> {
        let (field, pattern) = expr
            .split_once('=')
            .ok_or_else(|| QueueError::UnknownField(expr.to_string()))?;
        Self::attribute(field.parse()?, pattern)
    }

    /// Age filter; fails with `InvalidDuration` on malformed `duration`.
    pub fn age(direction: AgeDirection, duration: &str) -> Result<Self> {
        let threshold = Duration::try_seconds(parse_duration(duration)?).ok_or_else(|| {
            QueueError::InvalidDuration {
                text: duration.to_string(),
                reason: "too large".to_string(),
            }
        })?;
        Ok(Self::Age {
            direction,
            threshold,
        })
    }

    /// Whether `record` survives this directive at time `now`.
    pub fn matches(&self, record: &MessageRecord, now: NaiveDateTime) -> bool {
        match self {
            Self::Attribute { field, pattern } => record
                .field_text(*field)
                .is_some_and(|text| pattern.is_match(&text)),
            Self::Age {
                direction,
                threshold,
            } => {
                let Some(queued_at) = record.queued_at else {
                    return false;
                };
                // Full precision: a fraction of a second past the threshold counts.
                let elapsed = now - queued_at;
                match direction {
                    AgeDirection::YoungerThan => elapsed <= *threshold,
                    AgeDirection::OlderThan => elapsed >= *threshold,
                }
            }
            Self::Status(StatusFilter::OnlyActive) => record.is_active(),
            Self::Status(StatusFilter::ExcludeActive) => !record.is_active(),
        }
    }
}

/// Parse a duration such as `90`, `90s`, `15m`, `2h` or `7d` into seconds.
pub fn parse_duration(text: &str) -> Result<i64> {
    let invalid = |reason: &str| QueueError::InvalidDuration {
        text: text.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = text.trim();
    let Some(last) = trimmed.chars().last() else {
        return Err(invalid("empty"));
    };

    let (magnitude, multiplier) = if last.is_ascii_digit() {
        (trimmed, 1)
    } else {
        let multiplier = match last {
            's' => 1,
            'm' => 60,
            'h' => 60 * 60,
            'd' => 60 * 60 * 24,
            _ => return Err(invalid("unit must be one of s, m, h, d")),
        };
        (&trimmed[..trimmed.len() - last.len_utf8()], multiplier)
    };

    if magnitude.is_empty() || !magnitude.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid("magnitude must be a whole number"));
    }

    magnitude
        .parse::<i64>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .ok_or_else(|| invalid("too large"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::record::QueueStatus;
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 8, 31)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("3600").unwrap(), 3600);
        assert_eq!(parse_duration("45s").unwrap(), 45);
        assert_eq!(parse_duration("30m").unwrap(), 1800);
        assert_eq!(parse_duration("1h").unwrap(), 3600);
        assert_eq!(parse_duration("2d").unwrap(), 172_800);
        assert_eq!(parse_duration(" 5m ").unwrap(), 300);
    }

    #[test]
    fn test_parse_duration_rejects_malformed() {
        for text in ["", "h", "1w", "-5m", "1.5h", "abc", "1 h", "99999999999999999999"] {
            assert!(
                matches!(
                    parse_duration(text),
                    Err(QueueError::InvalidDuration { .. })
                ),
                "{text:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_age_rejects_threshold_beyond_duration_range() {
        assert!(matches!(
            FilterDirective::age(AgeDirection::OlderThan, "9999999999999999"),
            Err(QueueError::InvalidDuration { .. })
        ));
    }

    #[test]
    fn test_invalid_pattern() {
        let err = FilterDirective::attribute(RecordField::Reason, "(unclosed").unwrap_err();
        assert!(matches!(err, QueueError::InvalidPattern { .. }));
    }

    #[test]
    fn test_parse_match() {
        let d = FilterDirective::parse_match("source_ip=^192\\.0\\.2\\.").unwrap();
        assert!(matches!(
            d,
            FilterDirective::Attribute {
                field: RecordField::SourceIp,
                ..
            }
        ));
        assert!(matches!(
            FilterDirective::parse_match("subject=hello"),
            Err(QueueError::UnknownField(_))
        ));
        assert!(matches!(
            FilterDirective::parse_match("no-equals-sign"),
            Err(QueueError::UnknownField(_))
        ));
    }

    #[test]
    fn test_status_flags() {
        assert_eq!(StatusFilter::from_flags(false, false).unwrap(), None);
        assert_eq!(
            StatusFilter::from_flags(true, false).unwrap(),
            Some(StatusFilter::OnlyActive)
        );
        assert_eq!(
            StatusFilter::from_flags(false, true).unwrap(),
            Some(StatusFilter::ExcludeActive)
        );
        assert!(matches!(
            StatusFilter::from_flags(true, true),
            Err(QueueError::ConflictingStatusFilters)
        ));
    }

    #[test]
    fn test_attribute_match_is_case_insensitive() {
        let d = FilterDirective::attribute(RecordField::Reason, "TIMED out").unwrap();
        let rec = MessageRecord {
            reason: Some("Connection timed out".into()),
            ..MessageRecord::new("A")
        };
        assert!(d.matches(&rec, now()));
        assert!(!d.matches(&MessageRecord::new("B"), now()));
    }

    #[test]
    fn test_age_boundary_is_inclusive_both_ways() {
        let rec = MessageRecord {
            queued_at: Some(now() - Duration::hours(1)),
            ..MessageRecord::new("A")
        };
        let younger = FilterDirective::age(AgeDirection::YoungerThan, "1h").unwrap();
        let older = FilterDirective::age(AgeDirection::OlderThan, "3600").unwrap();
        assert!(younger.matches(&rec, now()));
        assert!(older.matches(&rec, now()));
    }

    #[test]
    fn test_age_boundary_counts_fractional_seconds() {
        let rec = MessageRecord {
            queued_at: Some(now() - Duration::hours(1)),
            ..MessageRecord::new("A")
        };
        let later = now() + Duration::milliseconds(900);
        let younger = FilterDirective::age(AgeDirection::YoungerThan, "1h").unwrap();
        let older = FilterDirective::age(AgeDirection::OlderThan, "1h").unwrap();
        assert!(!younger.matches(&rec, later));
        assert!(older.matches(&rec, later));

        let earlier = now() - Duration::milliseconds(900);
        assert!(younger.matches(&rec, earlier));
        assert!(!older.matches(&rec, earlier));
    }

    #[test]
    fn test_age_without_date_never_matches() {
        let rec = MessageRecord::new("A");
        for direction in [AgeDirection::YoungerThan, AgeDirection::OlderThan] {
            let d = FilterDirective::age(direction, "0").unwrap();
            assert!(!d.matches(&rec, now()));
        }
    }

    #[test]
    fn test_status_without_status_is_not_active() {
        let log_only = MessageRecord::new("A");
        let active = MessageRecord {
            status: Some(QueueStatus::Active),
            ..MessageRecord::new("B")
        };
        let only = FilterDirective::Status(StatusFilter::OnlyActive);
        let exclude = FilterDirective::Status(StatusFilter::ExcludeActive);
        assert!(!only.matches(&log_only, now()));
        assert!(exclude.matches(&log_only, now()));
        assert!(only.matches(&active, now()));
        assert!(!exclude.matches(&active, now()));
    }
}
