//! Queue listing parser.
//!
//! Parses the output of `mailq` / `postqueue -p`:
//!
//! ```text
//! -Queue ID-  --Size-- ----Arrival Time---- -Sender/Recipient-------
//! A1B2C3*       1024 Fri Aug 30 16:47:05  sender@example.com
//!                                          recipient@example.com
//!
//! D4E5F6        2048 Thu Aug 29 09:12:44  other@example.org
//! (connect to mx.example.net[192.0.2.10]:25: Connection timed out)
//!                                          someone@example.net
//!
//! -- 3 Kbytes in 2 Requests.
//! ```
//!
//! A line starting with an id character opens a record; indented lines
//! continue the most recent one. Any line that fits none of the known kinds
//! aborts the parse: the listing is small and is consumed fully or not at all.

use chrono::NaiveDateTime;
use tracing::debug;

use crate::error::{QueueError, Result};
use crate::model::record::{MessageRecord, QueueStatus, RecordSet};

use super::date::{resolve_partial_date, DateGrammar};

/// Trailing id character marking a message under delivery.
const ACTIVE_MARKER: char = '*';

/// Start of the column header line.
const HEADER_MARKER: &str = "-Queue ID-";

/// Whole output of `mailq` when nothing is queued.
const EMPTY_QUEUE: &str = "Mail queue is empty";

/// Minimum tokens on a message line: id, size, four date fields, sender.
const MIN_MESSAGE_TOKENS: usize = 7;

/// Parse a complete queue listing into records keyed by queue id.
pub fn parse_queue_listing(text: &str, now: NaiveDateTime) -> Result<RecordSet> {
    let mut parser = QueueListingParser::new(now);
    for (index, line) in text.lines().enumerate() {
        parser.feed_line(index + 1, line)?;
    }
    let records = parser.finish();
    debug!(count = records.len(), "Parsed queue listing");
    Ok(records)
}

/// What a single listing line contributes.
#[derive(Debug, PartialEq, Eq)]
enum LineKind<'a> {
    /// Header, separator, summary or blank.
    Noise,
    /// Opens a new message.
    Message(&'a str),
    /// `(reason text)` continuation.
    Reason(&'a str),
    /// Recipient address continuation.
    Recipient(&'a str),
    Unknown,
}

fn classify(line: &str) -> LineKind<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty()
        || line.starts_with(HEADER_MARKER)
        || line.starts_with("--")
        || trimmed == EMPTY_QUEUE
    {
        return LineKind::Noise;
    }

    if line.starts_with(|c: char| c.is_ascii_alphanumeric()) {
        LineKind::Message(line)
    } else if trimmed.starts_with('(') {
        LineKind::Reason(trimmed)
    } else if line.contains('@') {
        LineKind::Recipient(trimmed)
    } else {
        LineKind::Unknown
    }
}

/// Line-by-line parse state.
///
/// `current` is the id of the record that continuation lines belong to; it
/// changes only when a new message line is seen.
pub struct QueueListingParser {
    now: NaiveDateTime,
    records: RecordSet,
    current: Option<String>,
}

impl QueueListingParser {
    /// Create a parser that resolves arrival dates relative to `now`.
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now,
            records: RecordSet::new(),
            current: None,
        }
    }

    /// Consume one line. `line_number` is 1-based and only used in errors.
    pub fn feed_line(&mut self, line_number: usize, line: &str) -> Result<()> {
        match classify(line) {
            LineKind::Noise => Ok(()),
            LineKind::Message(text) => {
                let record = parse_message_line(line_number, text, self.now)?;
                self.current = Some(record.id.clone());
                self.records.insert(record.id.clone(), record);
                Ok(())
            }
            LineKind::Reason(text) => {
                let reason = strip_parens(text).replace('\n', " ");
                let record = self.current_record(line_number, line)?;
                match record.reason.as_mut() {
                    Some(existing) if !existing.is_empty() => {
                        existing.push(' ');
                        existing.push_str(&reason);
                    }
                    _ => record.reason = Some(reason),
                }
                Ok(())
            }
            LineKind::Recipient(text) => {
                let record = self.current_record(line_number, line)?;
                record.recipient = Some(text.to_string());
                Ok(())
            }
            LineKind::Unknown => Err(QueueError::UnparseableLine {
                line_number,
                line: line.to_string(),
            }),
        }
    }

    /// Finish parsing and hand out the records.
    pub fn finish(self) -> RecordSet {
        self.records
    }

    fn current_record(&mut self, line_number: usize, line: &str) -> Result<&mut MessageRecord> {
        self.current
            .as_ref()
            .and_then(|id| self.records.get_mut(id))
            .ok_or_else(|| QueueError::NoActiveRecord {
                line_number,
                line: line.to_string(),
            })
    }
}

/// Parse `ID[*] SIZE Wday Mon DD HH:MM:SS SENDER`.
fn parse_message_line(line_number: usize, line: &str, now: NaiveDateTime) -> Result<MessageRecord> {
    let unparseable = || QueueError::UnparseableLine {
        line_number,
        line: line.to_string(),
    };

    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < MIN_MESSAGE_TOKENS {
        return Err(unparseable());
    }

    let (id, status) = match tokens[0].strip_suffix(ACTIVE_MARKER) {
        Some(id) => (id, QueueStatus::Active),
        None => (tokens[0], QueueStatus::Deferred),
    };

    let size: u64 = tokens[1].parse().map_err(|_| unparseable())?;
    let queued_at = resolve_partial_date(&tokens[2..6].join(" "), DateGrammar::QueueListing, now)?;
    let sender = tokens[tokens.len() - 1];

    Ok(MessageRecord {
        size: Some(size),
        queued_at: Some(queued_at),
        sender: Some(sender.to_string()),
        reason: Some(String::new()),
        status: Some(status),
        ..MessageRecord::new(id)
    })
}

fn strip_parens(text: &str) -> &str {
    let inner = text.strip_prefix('(').unwrap_or(text);
    inner.strip_suffix(')').unwrap_or(inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 8, 31)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_single_active_message() {
        let text = "A1B2C3* 1024 Fri Aug 30 16:47:05 sender@example.com\n    (connection timed out)\n    recipient@example.com\n";
        let records = parse_queue_listing(text, now()).unwrap();
        assert_eq!(records.len(), 1);

        let rec = &records["A1B2C3"];
        assert_eq!(rec.id, "A1B2C3");
        assert_eq!(rec.status, Some(QueueStatus::Active));
        assert_eq!(rec.size, Some(1024));
        assert_eq!(rec.sender.as_deref(), Some("sender@example.com"));
        assert_eq!(rec.reason.as_deref(), Some("connection timed out"));
        assert_eq!(rec.recipient.as_deref(), Some("recipient@example.com"));
        assert_eq!(
            rec.queued_at,
            NaiveDate::from_ymd_opt(2024, 8, 30)
                .unwrap()
                .and_hms_opt(16, 47, 5)
        );
    }

    #[test]
    fn test_header_separator_and_summary_are_skipped() {
        let text = "\
-Queue ID-  --Size-- ----Arrival Time---- -Sender/Recipient-------
D4E5F6        2048 Thu Aug 29 09:12:44  other@example.org
                                         someone@example.net

-- 2 Kbytes in 1 Request.
";
        let records = parse_queue_listing(text, now()).unwrap();
        assert_eq!(records.len(), 1);
        let rec = &records["D4E5F6"];
        assert_eq!(rec.status, Some(QueueStatus::Deferred));
        assert_eq!(rec.reason.as_deref(), Some(""));
    }

    #[test]
    fn test_empty_queue() {
        assert!(parse_queue_listing("Mail queue is empty\n", now())
            .unwrap()
            .is_empty());
        assert!(parse_queue_listing("", now()).unwrap().is_empty());
    }

    #[test]
    fn test_last_recipient_wins() {
        let text = "\
ABC123 300 Fri Aug 30 16:47:05 a@example.com
    first@example.com
    second@example.com
";
        let records = parse_queue_listing(text, now()).unwrap();
        assert_eq!(
            records["ABC123"].recipient.as_deref(),
            Some("second@example.com")
        );
    }

    #[test]
    fn test_multiple_reason_lines_are_joined() {
        let text = "\
ABC123 300 Fri Aug 30 16:47:05 a@example.com
(host mx.example.net said: 451 try again later)
(in reply to RCPT TO command)
    rcpt@example.net
";
        let records = parse_queue_listing(text, now()).unwrap();
        assert_eq!(
            records["ABC123"].reason.as_deref(),
            Some("host mx.example.net said: 451 try again later in reply to RCPT TO command")
        );
    }

    #[test]
    fn test_continuations_attach_to_latest_message() {
        let text = "\
AAA111* 100 Fri Aug 30 16:47:05 a@example.com
    ra@example.com

BBB222 200 Fri Aug 30 16:48:05 b@example.com
(mailbox full)
    rb@example.com
";
        let records = parse_queue_listing(text, now()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records["AAA111"].reason.as_deref(), Some(""));
        assert_eq!(records["AAA111"].recipient.as_deref(), Some("ra@example.com"));
        assert_eq!(records["BBB222"].reason.as_deref(), Some("mailbox full"));
        assert_eq!(records["BBB222"].recipient.as_deref(), Some("rb@example.com"));
    }

    #[test]
    fn test_status_follows_marker() {
        let text = "\
AAA111* 100 Fri Aug 30 16:47:05 a@example.com
BBB222 100 Fri Aug 30 16:47:05 b@example.com
CCC333* 100 Fri Aug 30 16:47:05 c@example.com
";
        let records = parse_queue_listing(text, now()).unwrap();
        assert_eq!(records.len(), 3);
        assert!(records["AAA111"].is_active());
        assert!(!records["BBB222"].is_active());
        assert!(records["CCC333"].is_active());
    }

    #[test]
    fn test_repeated_id_overwrites() {
        let text = "\
AAA111 100 Fri Aug 30 16:47:05 a@example.com
(old reason)
AAA111* 900 Fri Aug 30 16:50:05 a@example.com
";
        let records = parse_queue_listing(text, now()).unwrap();
        assert_eq!(records.len(), 1);
        let rec = &records["AAA111"];
        assert_eq!(rec.size, Some(900));
        assert_eq!(rec.reason.as_deref(), Some(""));
        assert!(rec.is_active());
    }

    #[test]
    fn test_unknown_line_is_fatal() {
        let text = "\
AAA111 100 Fri Aug 30 16:47:05 a@example.com
    something unexpected
";
        let err = parse_queue_listing(text, now()).unwrap_err();
        match err {
            QueueError::UnparseableLine { line_number, line } => {
                assert_eq!(line_number, 2);
                assert_eq!(line, "    something unexpected");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_continuation_without_message() {
        let err = parse_queue_listing("    (too early)\n", now()).unwrap_err();
        assert!(matches!(
            err,
            QueueError::NoActiveRecord { line_number: 1, .. }
        ));

        let err = parse_queue_listing("    rcpt@example.com\n", now()).unwrap_err();
        assert!(matches!(err, QueueError::NoActiveRecord { .. }));
    }

    #[test]
    fn test_short_or_malformed_message_line() {
        let err = parse_queue_listing("AAA111 100 Fri Aug 30\n", now()).unwrap_err();
        assert!(matches!(err, QueueError::UnparseableLine { .. }));

        let err =
            parse_queue_listing("AAA111 big Fri Aug 30 16:47:05 a@example.com\n", now())
                .unwrap_err();
        assert!(matches!(err, QueueError::UnparseableLine { .. }));

        let err =
            parse_queue_listing("AAA111 100 Fri Aug 30 16:99:05 a@example.com\n", now())
                .unwrap_err();
        assert!(matches!(err, QueueError::DateFormat { .. }));
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(""), LineKind::Noise);
        assert_eq!(classify("   "), LineKind::Noise);
        assert_eq!(classify("-- 5 Kbytes in 2 Requests."), LineKind::Noise);
        assert_eq!(classify("  (reason)"), LineKind::Reason("(reason)"));
        assert_eq!(
            classify("        user@example.com"),
            LineKind::Recipient("user@example.com")
        );
        assert_eq!(classify("    ???"), LineKind::Unknown);
    }

    #[test]
    fn test_strip_parens() {
        assert_eq!(strip_parens("(abc)"), "abc");
        assert_eq!(strip_parens("(abc"), "abc");
        assert_eq!(strip_parens("(a (b))"), "a (b)");
    }
}
