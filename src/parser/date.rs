//! Year-less date resolution.
//!
//! Neither `mailq` nor syslog print a year. A partial date is completed with
//! the current year; when that lands in the future (a December message seen
//! in January) the previous year is used instead.

use chrono::{Datelike, Month, NaiveDate, NaiveDateTime, NaiveTime, Weekday};

use crate::error::{QueueError, Result};

/// How far back to look for a year in which the date exists and is not in
/// the future. Feb 29 may need up to eight years (e.g. 2104 → 2096).
const MAX_YEARS_BACK: i32 = 8;

/// Textual layout of a partial date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateGrammar {
    /// `Fri Aug 30 16:47:05`, as printed by the queue listing.
    QueueListing,
    /// `Sep 5 10:30:36`, the classic syslog prefix.
    Syslog,
}

impl DateGrammar {
    fn token_count(self) -> usize {
        match self {
            Self::QueueListing => 4,
            Self::Syslog => 3,
        }
    }
}

/// Month, day and time of day, still missing the year.
#[derive(Debug, Clone, Copy)]
struct PartialDate {
    month: u32,
    day: u32,
    time: NaiveTime,
}

impl PartialDate {
    fn parse(text: &str, grammar: DateGrammar) -> Result<Self> {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        if tokens.len() != grammar.token_count() {
            return Err(QueueError::date(
                text,
                format!(
                    "expected {} fields, found {}",
                    grammar.token_count(),
                    tokens.len()
                ),
            ));
        }

        let rest = match grammar {
            DateGrammar::QueueListing => {
                tokens[0]
                    .parse::<Weekday>()
                    .map_err(|_| QueueError::date(text, "unknown weekday"))?;
                &tokens[1..]
            }
            DateGrammar::Syslog => &tokens[..],
        };

        let month = rest[0]
            .parse::<Month>()
            .map_err(|_| QueueError::date(text, "unknown month"))?
            .number_from_month();

        let day: u32 = rest[1]
            .parse()
            .map_err(|_| QueueError::date(text, "day of month is not a number"))?;
        if !(1..=31).contains(&day) {
            return Err(QueueError::date(text, "day of month out of range"));
        }

        let time = NaiveTime::parse_from_str(rest[2], "%H:%M:%S")
            .map_err(|e| QueueError::date(text, format!("bad time of day: {e}")))?;

        Ok(Self { month, day, time })
    }

    fn with_year(self, year: i32) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(year, self.month, self.day).map(|d| d.and_time(self.time))
    }
}

/// Resolve a year-less date to the most recent instant not after `now`.
///
/// The result shares `now`'s time zone; no conversion is done.
pub fn resolve_partial_date(
    text: &str,
    grammar: DateGrammar,
    now: NaiveDateTime,
) -> Result<NaiveDateTime> {
    let partial = PartialDate::parse(text, grammar)?;

    (0..=MAX_YEARS_BACK)
        .map(|back| now.year() - back)
        .filter_map(|year| partial.with_year(year))
        .find(|candidate| *candidate <= now)
        .ok_or_else(|| QueueError::date(text, "no such day in recent years"))
}
