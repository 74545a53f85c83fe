//! Open the mail log for streaming.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::{QueueError, Result};

/// Size of the log read buffer (1 MB for fast sequential reads).
pub const DEFAULT_READ_BUFFER_SIZE: usize = 1024 * 1024;

/// An opened mail log and its size in bytes.
pub struct MailLog {
    pub reader: BufReader<File>,
    pub size: u64,
}

/// Open `path` for line-by-line reading with a `buffer_size` byte buffer.
pub fn open_mail_log(path: &Path, buffer_size: usize) -> Result<MailLog> {
    let file = File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            QueueError::FileNotFound(path.to_path_buf())
        } else {
            QueueError::io(path, e)
        }
    })?;
    let size = file.metadata().map_err(|e| QueueError::io(path, e))?.len();

    Ok(MailLog {
        reader: BufReader::with_capacity(buffer_size.max(4096), file),
        size,
    })
}
