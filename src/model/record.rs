//! Queue message records.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::error::QueueError;

/// All records of one run, keyed by queue id.
///
/// A `BTreeMap` keeps serialized output ordered by queue id.
pub type RecordSet = BTreeMap<String, MessageRecord>;

/// Queue state of a message as shown by the queue listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    /// The id carried the `*` marker: delivery is in progress.
    Active,
    /// Waiting for the next delivery attempt.
    Deferred,
}

impl QueueStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Deferred => "deferred",
        }
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One queued message, assembled from the queue listing and/or the mail log.
///
/// Every attribute except `id` is optional: a field that neither source
/// provided stays `None` and never matches an attribute filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageRecord {
    /// Queue id with the active marker stripped.
    pub id: String,

    /// Message size in bytes (queue listing).
    pub size: Option<u64>,

    /// Arrival time, resolved from a year-less date in local wall-clock time.
    pub queued_at: Option<NaiveDateTime>,

    /// Envelope sender.
    pub sender: Option<String>,

    /// Last recipient line seen for this message.
    pub recipient: Option<String>,

    /// Deferral reason. `Some("")` on queue records without a reason line.
    pub reason: Option<String>,

    /// Active or deferred. Log-only records have none.
    pub status: Option<QueueStatus>,

    /// Client address of the submitting connection (mail log).
    pub source_ip: Option<String>,

    /// `Message-ID` header value without angle brackets (mail log).
    pub message_id: Option<String>,

    /// Outcome of the last delivery attempt, e.g. `sent` or `deferred` (mail log).
    pub delivery_status: Option<String>,
}

impl MessageRecord {
    /// Create an empty record for `id`.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Whether the queue listing marked this message as active.
    pub fn is_active(&self) -> bool {
        self.status == Some(QueueStatus::Active)
    }

    /// Text of `field` as seen by attribute filters, or `None` when unset.
    pub fn field_text(&self, field: RecordField) -> Option<Cow<'_, str>> {
        match field {
            RecordField::Id => Some(Cow::Borrowed(self.id.as_str())),
            RecordField::Size => self.size.map(|s| Cow::Owned(s.to_string())),
            RecordField::Sender => self.sender.as_deref().map(Cow::Borrowed),
            RecordField::Recipient => self.recipient.as_deref().map(Cow::Borrowed),
            RecordField::Reason => self.reason.as_deref().map(Cow::Borrowed),
            RecordField::Status => self.status.map(|s| Cow::Borrowed(s.as_str())),
            RecordField::SourceIp => self.source_ip.as_deref().map(Cow::Borrowed),
            RecordField::MessageId => self.message_id.as_deref().map(Cow::Borrowed),
            RecordField::DeliveryStatus => self.delivery_status.as_deref().map(Cow::Borrowed),
        }
    }

    /// Combine with `base`: fields set here win, unset ones come from `base`.
    pub fn overlay(&self, base: &MessageRecord) -> MessageRecord {
        MessageRecord {
            id: self.id.clone(),
            size: self.size.or(base.size),
            queued_at: self.queued_at.or(base.queued_at),
            sender: self.sender.clone().or_else(|| base.sender.clone()),
            recipient: self.recipient.clone().or_else(|| base.recipient.clone()),
            reason: self.reason.clone().or_else(|| base.reason.clone()),
            status: self.status.or(base.status),
            source_ip: self.source_ip.clone().or_else(|| base.source_ip.clone()),
            message_id: self.message_id.clone().or_else(|| base.message_id.clone()),
            delivery_status: self
                .delivery_status
                .clone()
                .or_else(|| base.delivery_status.clone()),
        }
    }
}

/// Record attributes addressable by attribute filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordField {
    Id,
    Size,
    Sender,
    Recipient,
    Reason,
    Status,
    SourceIp,
    MessageId,
    DeliveryStatus,
}

impl RecordField {
    pub const ALL: [RecordField; 9] = [
        Self::Id,
        Self::Size,
        Self::Sender,
        Self::Recipient,
        Self::Reason,
        Self::Status,
        Self::SourceIp,
        Self::MessageId,
        Self::DeliveryStatus,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Size => "size",
            Self::Sender => "sender",
            Self::Recipient => "recipient",
            Self::Reason => "reason",
            Self::Status => "status",
            Self::SourceIp => "source_ip",
            Self::MessageId => "message_id",
            Self::DeliveryStatus => "delivery_status",
        }
    }
}

impl fmt::Display for RecordField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RecordField {
    type Err = QueueError;

    /// Accepts the snake_case name, with `-` allowed in place of `_`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|f| f.name() == normalized)
            .ok_or_else(|| QueueError::UnknownField(s.to_string()))
    }
}
