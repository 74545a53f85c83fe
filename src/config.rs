//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$MAILQSCAN_CONFIG` (environment variable)
//! 2. `~/.config/mailqscan/config.toml` (Linux/macOS)
//!    `%APPDATA%\mailqscan\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{QueueError, Result};
use crate::export::OutputFormat;
use crate::parser::maillog::{DEFAULT_PROGRESS_INTERVAL, DEFAULT_SYSLOG_NAME};
use crate::source::log::DEFAULT_READ_BUFFER_SIZE;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Where the queue listing and mail log come from.
    pub sources: SourcesConfig,
    /// Output defaults.
    pub output: OutputConfig,
    /// Performance tuning.
    pub performance: PerformanceConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override the directory for the diagnostic log file.
    pub cache_dir: Option<PathBuf>,
}

/// Input sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// Command printing the queue listing.
    pub queue_command: String,
    /// Arguments for `queue_command`.
    pub queue_args: Vec<String>,
    /// Mail log consulted with `--log`.
    pub mail_log: PathBuf,
    /// Syslog program name of the mail system (`postfix`, `postfix-out`, ...).
    pub syslog_name: String,
}

/// Output defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Format used when no output flag is given.
    pub default_format: OutputFormat,
}

/// Performance tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Mail log read buffer size in bytes (default: 1048576 = 1 MB).
    pub read_buffer_size: usize,
    /// Lines between progress reports while scanning the mail log.
    pub progress_interval: u64,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            cache_dir: None,
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            queue_command: "mailq".to_string(),
            queue_args: Vec::new(),
            mail_log: PathBuf::from("/var/log/mail.log"),
            syslog_name: DEFAULT_SYSLOG_NAME.to_string(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            default_format: OutputFormat::Json,
        }
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

// ── Load ────────────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Falls back to the defaults if no file is found or it cannot be used; in
/// the latter case the problem is returned for the caller to report.
pub fn load_config() -> (Config, Option<QueueError>) {
    match config_file_path() {
        Some(path) if path.exists() => match read_config(&path) {
            Ok(cfg) => (cfg, None),
            Err(e) => (Config::default(), Some(e)),
        },
        _ => (Config::default(), None),
    }
}

/// Read and parse one config file.
pub fn read_config(path: &Path) -> Result<Config> {
    let contents = std::fs::read_to_string(path).map_err(|e| QueueError::Config {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    toml::from_str(&contents).map_err(|e| QueueError::Config {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MAILQSCAN_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    dirs::config_dir().map(|d| d.join("mailqscan").join("config.toml"))
}

/// Return the directory for the diagnostic log file.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailqscan")
}
