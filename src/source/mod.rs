//! Input sources: the queue listing command and the mail log file.

pub mod log;
pub mod queue;
