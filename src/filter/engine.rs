//! Apply filter directives to a record set.
//!
//! Every step copies the surviving records into a new set; the input set is
//! never modified, so the order of directives only affects interim sizes.

use chrono::NaiveDateTime;
use tracing::debug;

use crate::model::record::RecordSet;

use super::directive::FilterDirective;

/// Return the records of `records` that satisfy `directive`.
pub fn apply_filter(
    records: &RecordSet,
    directive: &FilterDirective,
    now: NaiveDateTime,
) -> RecordSet {
    records
        .iter()
        .filter(|(_, record)| directive.matches(record, now))
        .map(|(id, record)| (id.clone(), record.clone()))
        .collect()
}

/// Apply `directives` in order, each narrowing the previous result.
pub fn apply_filters(
    records: &RecordSet,
    directives: &[FilterDirective],
    now: NaiveDateTime,
) -> RecordSet {
    let mut current = records.clone();
    for directive in directives {
        let before = current.len();
        current = apply_filter(&current, directive, now);
        debug!(?directive, before, after = current.len(), "Applied filter");
    }
    current
}
