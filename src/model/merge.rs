//! Combine the queue-listing and mail-log record sets.

use tracing::debug;

use super::record::RecordSet;

/// Merge up to two record sets keyed by queue id.
///
/// Log records form the base. Queue-listing records overlay them: on a
/// shared id every field the queue record has wins, and the fields it lacks
/// are filled from the log record. Neither input is modified.
pub fn merge_records(queue: Option<&RecordSet>, log: Option<&RecordSet>) -> RecordSet {
    let mut merged = log.cloned().unwrap_or_default();

    let Some(queue) = queue else {
        return merged;
    };

    let mut shared = 0usize;
    for (id, record) in queue {
        let combined = match merged.get(id) {
            Some(base) => {
                shared += 1;
                record.overlay(base)
            }
            None => record.clone(),
        };
        merged.insert(id.clone(), combined);
    }

    debug!(
        queue = queue.len(),
        log = log.map_or(0, |l| l.len()),
        shared,
        total = merged.len(),
        "Merged record sets"
    );

    merged
}
