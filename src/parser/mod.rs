//! Text parsers: queue listing, mail log, and year-less date resolution.

pub mod date;
pub mod maillog;
pub mod mailq;
