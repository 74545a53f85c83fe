//! Output: JSON, YAML, or a bare record count.

pub mod render;

use serde::{Deserialize, Serialize};

pub use self::render::{render, render_records, RenderedRecord, RenderedSet};

/// Output serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Pretty-printed JSON object keyed by queue id.
    #[default]
    Json,
    /// YAML mapping keyed by queue id.
    Yaml,
    /// Number of matching records only.
    Count,
}
