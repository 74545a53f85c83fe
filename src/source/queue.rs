//! Capture the queue listing, from the queue command or a saved file.

use std::io::Read;
use std::path::Path;
use std::process::Command;

use tracing::{debug, warn};

use crate::error::{QueueError, Result};

/// `EX_UNAVAILABLE`: `postqueue: fatal: Queue report unavailable - mail system is down`.
/// The listing printed so far is still usable.
const EXIT_QUEUE_UNAVAILABLE: i32 = 69;

/// Run `command args...` and return its standard output.
///
/// Exit statuses other than success and "queue unavailable" are logged as a
/// warning together with the command's stderr; they do not fail the capture.
pub fn capture_queue_listing(command: &str, args: &[String]) -> Result<String> {
    debug!(command, ?args, "Running queue listing command");
    let output = Command::new(command)
        .args(args)
        .output()
        .map_err(|source| QueueError::Command {
            command: command.to_string(),
            source,
        })?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    match output.status.code() {
        Some(0) => {}
        Some(EXIT_QUEUE_UNAVAILABLE) => {
            debug!(stderr = %stderr.trim(), "Queue report unavailable");
        }
        code => {
            warn!(
                command,
                code = ?code,
                stderr = %stderr.trim(),
                "Queue listing command failed"
            );
        }
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Read a saved queue listing. `-` reads standard input.
pub fn read_queue_listing(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        return Ok(text);
    }

    std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            QueueError::FileNotFound(path.to_path_buf())
        } else {
            QueueError::io(path, e)
        }
    })
}
