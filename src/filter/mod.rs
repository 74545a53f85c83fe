//! Filter engine: attribute, age and status predicates over a record set.

pub mod directive;
pub mod engine;

use crate::error::Result;
use crate::model::record::RecordField;

use self::directive::{AgeDirection, FilterDirective, StatusFilter};

pub use self::engine::{apply_filter, apply_filters};

/// Filter options as given on the command line.
#[derive(Debug, Clone, Default)]
pub struct FilterOptions {
    /// Regex on the deferral reason.
    pub reason: Option<String>,
    /// Regex on the envelope sender.
    pub sender: Option<String>,
    /// Regex on the recipient.
    pub recipient: Option<String>,
    /// Extra `FIELD=REGEX` matches.
    pub matches: Vec<String>,
    /// Keep messages at least this old.
    pub min_age: Option<String>,
    /// Keep messages at most this old.
    pub max_age: Option<String>,
    pub only_active: bool,
    pub exclude_active: bool,
}

/// Validate `options` and turn them into an ordered directive list.
///
/// Fails on the first conflicting flag, bad pattern or bad duration, before
/// any input has been read.
pub fn build_directives(options: &FilterOptions) -> Result<Vec<FilterDirective>> {
    let status = StatusFilter::from_flags(options.only_active, options.exclude_active)?;

    let mut directives = Vec::new();
    for (field, pattern) in [
        (RecordField::Reason, &options.reason),
        (RecordField::Sender, &options.sender),
        (RecordField::Recipient, &options.recipient),
    ] {
        if let Some(pattern) = pattern {
            directives.push(FilterDirective::attribute(field, pattern)?);
        }
    }
    for expr in &options.matches {
        directives.push(FilterDirective::parse_match(expr)?);
    }
    if let Some(age) = &options.min_age {
        directives.push(FilterDirective::age(AgeDirection::OlderThan, age)?);
    }
    if let Some(age) = &options.max_age {
        directives.push(FilterDirective::age(AgeDirection::YoungerThan, age)?);
    }
    if let Some(status) = status {
        directives.push(FilterDirective::Status(status));
    }

    Ok(directives)
}
