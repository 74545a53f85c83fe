//! Core data model: queue message records and record-set merging.

pub mod merge;
pub mod record;
