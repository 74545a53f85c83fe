//! Streaming mail log parser.
//!
//! Reads the Postfix syslog one line at a time and correlates four events by
//! queue id:
//!
//! ```text
//! Sep  5 10:30:36 mx postfix/smtpd[2211]: A1B2C3: client=mail.example.com[192.0.2.10]
//! Sep  5 10:30:36 mx postfix/cleanup[2214]: A1B2C3: message-id=<abc@example.com>
//! Sep  5 10:30:37 mx postfix/qmgr[871]: A1B2C3: from=<sender@example.com>, size=1024, nrcpt=1 (queue active)
//! Sep  5 10:30:38 mx postfix/smtp[2216]: A1B2C3: to=<rcpt@example.net>, relay=..., status=sent (250 OK)
//! ```
//!
//! Only the connection event creates a record; the other three enrich it.
//! Unrelated lines are ignored and malformed ones are skipped with a warning,
//! so a multi-gigabyte log is never aborted by one bad line.

use std::io::BufRead;

use chrono::NaiveDateTime;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::{QueueError, Result};
use crate::model::record::{MessageRecord, RecordSet};

use super::date::{resolve_partial_date, DateGrammar};

/// Default number of lines between progress reports.
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 100_000;

/// Default syslog program name of the mail system.
pub const DEFAULT_SYSLOG_NAME: &str = "postfix";

/// Token positions in a syslog line.
const FACILITY: usize = 4;
const QUEUE_ID: usize = 5;
const SUBFIELD: usize = 6;
const MIN_TOKENS: usize = SUBFIELD + 1;

/// Why a single log line was skipped.
#[derive(Error, Debug)]
enum LogLineError {
    #[error("expected at least 7 fields, found {0}")]
    TooFewTokens(usize),

    #[error("missing {0}")]
    MissingField(&'static str),

    #[error(transparent)]
    Date(#[from] QueueError),
}

/// A correlated event extracted from one log line.
#[derive(Debug, PartialEq, Eq)]
enum LogEvent<'a> {
    /// `smtpd ... client=host[ip]`
    Connection {
        queue_id: &'a str,
        source_ip: &'a str,
        date_text: String,
    },
    /// `cleanup ... message-id=<id>`
    MessageId { queue_id: &'a str, message_id: &'a str },
    /// `qmgr ... from=<sender>,`
    Sender { queue_id: &'a str, sender: &'a str },
    /// `smtp[pid] ... status=sent`
    Delivery { queue_id: &'a str, status: &'a str },
}

/// Counters for one scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Lines read.
    pub lines: u64,
    /// Bytes read.
    pub bytes: u64,
    /// Malformed lines skipped with a warning.
    pub skipped: u64,
}

/// Progress snapshot passed to the progress callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanProgress {
    pub lines: u64,
    pub bytes: u64,
    pub records: usize,
}

/// Result of scanning a mail log.
#[derive(Debug, Default)]
pub struct LogScan {
    pub records: RecordSet,
    pub stats: ScanStats,
}

/// Streaming mail log parser.
pub struct MailLogParser {
    now: NaiveDateTime,
    progress_interval: u64,
    smtpd: String,
    cleanup: String,
    qmgr: String,
    smtp: String,
}

impl MailLogParser {
    /// Create a parser for logs written under the default `postfix` name.
    pub fn new(now: NaiveDateTime) -> Self {
        Self::with_syslog_name(now, DEFAULT_SYSLOG_NAME)
    }

    /// Create a parser for a mail system logging as `syslog_name`
    /// (e.g. `postfix-out` on a multi-instance host).
    pub fn with_syslog_name(now: NaiveDateTime, syslog_name: &str) -> Self {
        Self {
            now,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            smtpd: format!("{syslog_name}/smtpd"),
            cleanup: format!("{syslog_name}/cleanup"),
            qmgr: format!("{syslog_name}/qmgr"),
            smtp: format!("{syslog_name}/smtp["),
        }
    }

    /// Report progress every `lines` lines (0 disables periodic reports).
    pub fn progress_interval(mut self, lines: u64) -> Self {
        self.progress_interval = lines;
        self
    }

    /// Scan the whole log.
    ///
    /// Lines are decoded lossily, so invalid UTF-8 never stops the scan.
    /// Only read errors from `reader` are fatal.
    pub fn parse<R: BufRead>(
        &self,
        mut reader: R,
        progress: Option<&dyn Fn(ScanProgress)>,
    ) -> Result<LogScan> {
        let mut scan = LogScan::default();
        let mut line_buf: Vec<u8> = Vec::with_capacity(1024);

        loop {
            line_buf.clear();
            let read = reader.read_until(b'\n', &mut line_buf)?;
            if read == 0 {
                break;
            }
            scan.stats.lines += 1;
            scan.stats.bytes += read as u64;

            let line = String::from_utf8_lossy(&line_buf);
            if let Err(e) = self.apply_line(&line, &mut scan.records) {
                scan.stats.skipped += 1;
                warn!(
                    line_number = scan.stats.lines,
                    error = %e,
                    line = %line.trim_end(),
                    "Could not parse log line"
                );
            }

            if self.progress_interval > 0 && scan.stats.lines % self.progress_interval == 0 {
                info!(
                    lines = scan.stats.lines,
                    messages = scan.records.len(),
                    "Processed mail log lines"
                );
                if let Some(cb) = progress {
                    cb(snapshot(&scan));
                }
            }
        }

        if let Some(cb) = progress {
            cb(snapshot(&scan));
        }
        info!(
            lines = scan.stats.lines,
            messages = scan.records.len(),
            skipped = scan.stats.skipped,
            "Finished scanning mail log"
        );

        Ok(scan)
    }

    fn apply_line(
        &self,
        line: &str,
        records: &mut RecordSet,
    ) -> std::result::Result<(), LogLineError> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(event) = self.classify(&tokens)? else {
            return Ok(());
        };

        match event {
            LogEvent::Connection {
                queue_id,
                source_ip,
                date_text,
            } => {
                if !records.contains_key(queue_id) {
                    let queued_at = resolve_partial_date(&date_text, DateGrammar::Syslog, self.now)?;
                    let record = MessageRecord {
                        source_ip: Some(source_ip.to_string()),
                        queued_at: Some(queued_at),
                        ..MessageRecord::new(queue_id)
                    };
                    records.insert(queue_id.to_string(), record);
                }
            }
            LogEvent::MessageId {
                queue_id,
                message_id,
            } => {
                if let Some(record) = records.get_mut(queue_id) {
                    record.message_id = Some(message_id.to_string());
                }
            }
            LogEvent::Sender { queue_id, sender } => {
                if let Some(record) = records.get_mut(queue_id) {
                    record.sender = Some(sender.to_string());
                }
            }
            LogEvent::Delivery { queue_id, status } => {
                if let Some(record) = records.get_mut(queue_id) {
                    record.delivery_status = Some(status.to_string());
                }
            }
        }
        Ok(())
    }

    fn classify<'a>(
        &self,
        tokens: &[&'a str],
    ) -> std::result::Result<Option<LogEvent<'a>>, LogLineError> {
        if tokens.len() < MIN_TOKENS {
            return Err(LogLineError::TooFewTokens(tokens.len()));
        }

        let facility = tokens[FACILITY];
        let subfield = tokens[SUBFIELD];
        let queue_id = tokens[QUEUE_ID].trim_end_matches(':');

        let event = if facility.starts_with(&self.smtpd) && subfield.starts_with("client=") {
            let source_ip = subfield
                .rsplit('[')
                .next()
                .unwrap_or(subfield)
                .trim_end_matches(']');
            LogEvent::Connection {
                queue_id,
                source_ip,
                date_text: tokens[..3].join(" "),
            }
        } else if facility.starts_with(&self.cleanup) && subfield.starts_with("message-id=") {
            let value = subfield
                .split_once('=')
                .map(|(_, v)| v)
                .ok_or(LogLineError::MissingField("message-id value"))?;
            LogEvent::MessageId {
                queue_id,
                message_id: strip_angle_brackets(value),
            }
        } else if facility.starts_with(&self.qmgr) && subfield.starts_with("from=") {
            let (_, after) = subfield
                .split_once('<')
                .ok_or(LogLineError::MissingField("'<' in from="))?;
            let sender = after.split('>').next().unwrap_or(after);
            LogEvent::Sender { queue_id, sender }
        } else if facility.starts_with(&self.smtp) {
            match tokens.iter().copied().find(|t| t.starts_with("status=")) {
                Some(token) => LogEvent::Delivery {
                    queue_id,
                    status: token.split('=').nth(1).unwrap_or_default(),
                },
                None => return Ok(None),
            }
        } else {
            return Ok(None);
        };

        debug!(?event, "Matched log event");
        Ok(Some(event))
    }
}

fn snapshot(scan: &LogScan) -> ScanProgress {
    ScanProgress {
        lines: scan.stats.lines,
        bytes: scan.stats.bytes,
        records: scan.records.len(),
    }
}

/// Not every client wraps its Message-ID in `< >`.
fn strip_angle_brackets(value: &str) -> &str {
    value
        .strip_prefix('<')
        .and_then(|v| v.strip_suffix('>'))
        .unwrap_or(value)
}
