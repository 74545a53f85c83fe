//! `mailqscan`: parse the Postfix mail queue and mail log into filterable records.
//!
//! This crate provides the core library: the queue-listing and mail-log
//! parsers, year-less date resolution, record merging, the filter engine,
//! and JSON/YAML/count rendering.

pub mod config;
pub mod error;
pub mod export;
pub mod filter;
pub mod model;
pub mod parser;
pub mod source;
