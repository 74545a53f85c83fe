//! Centralized error types for mailqscan.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mailqscan library.
#[derive(Error, Debug)]
pub enum QueueError {
    /// I/O error with the associated file path.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The specified file does not exist.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// The configuration file could not be read or parsed.
    #[error("Invalid config file '{path}': {reason}")]
    Config { path: PathBuf, reason: String },

    /// The queue-listing command could not be started.
    #[error("Could not run '{command}': {source}")]
    Command {
        command: String,
        source: std::io::Error,
    },

    /// A year-less date did not match the expected grammar.
    #[error("Unrecognized date '{text}': {reason}")]
    DateFormat { text: String, reason: String },

    /// A queue-listing line matched none of the known line kinds.
    #[error("Unknown line {line_number} in queue listing: {line:?}")]
    UnparseableLine { line_number: usize, line: String },

    /// A continuation line appeared before any message line.
    #[error("Line {line_number} continues a message, but no message has started: {line:?}")]
    NoActiveRecord { line_number: usize, line: String },

    /// A filter pattern is not a valid regular expression.
    #[error("Invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        source: regex::Error,
    },

    /// An age filter duration could not be parsed.
    #[error("Invalid duration '{text}': {reason}. Examples: 3600, 1800s, 30m, 2h, 1d")]
    InvalidDuration { text: String, reason: String },

    /// A filter named a field that records do not have.
    #[error("Unknown record field '{0}'")]
    UnknownField(String),

    /// Both `only-active` and `exclude-active` were requested.
    #[error("--exclude-active and --only-active are mutually exclusive")]
    ConflictingStatusFilters,

    /// The record set could not be serialized.
    #[error("Serialization error: {0}")]
    Serialize(String),
}

/// Convenience alias for `Result<T, QueueError>`.
pub type Result<T> = std::result::Result<T, QueueError>;

impl QueueError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a `DateFormat` variant.
    pub fn date(text: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DateFormat {
            text: text.into(),
            reason: reason.into(),
        }
    }
}

/// Allow `?` on `std::io::Error` when no path context is available
/// (reading a stream such as stdin).
impl From<std::io::Error> for QueueError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<stream>"),
            source,
        }
    }
}
