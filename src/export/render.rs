//! Convert records to their printable form and serialize them.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::{QueueError, Result};
use crate::model::record::{QueueStatus, RecordSet};

use super::OutputFormat;

/// Local-time layout used for `queued_at` in all output.
pub const DISPLAY_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A record ready for serialization.
///
/// The queue id is the map key and is not repeated inside the record.
/// Unset fields are omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queued_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<QueueStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_status: Option<String>,
}

/// Records keyed by queue id, ready to serialize.
pub type RenderedSet = BTreeMap<String, RenderedRecord>;

/// Consume the final record set, formatting every `queued_at` once.
pub fn render_records(records: RecordSet) -> RenderedSet {
    records
        .into_iter()
        .map(|(id, record)| {
            let rendered = RenderedRecord {
                size: record.size,
                queued_at: record
                    .queued_at
                    .map(|t| t.format(DISPLAY_DATE_FORMAT).to_string()),
                sender: record.sender,
                recipient: record.recipient,
                reason: record.reason,
                status: record.status,
                source_ip: record.source_ip,
                message_id: record.message_id,
                delivery_status: record.delivery_status,
            };
            (id, rendered)
        })
        .collect()
}

/// Serialize `rendered` in `format`. `Count` prints only the number of records.
pub fn render(rendered: &RenderedSet, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Count => Ok(rendered.len().to_string()),
        OutputFormat::Json => {
            serde_json::to_string_pretty(rendered).map_err(|e| QueueError::Serialize(e.to_string()))
        }
        OutputFormat::Yaml => {
            serde_yaml::to_string(rendered).map_err(|e| QueueError::Serialize(e.to_string()))
        }
    }
}
