//! Run report export
//!
//! Serializes a finished replay run (effective settings, run log, counters,
//! summary statistics, final status) as one JSON document.

pub mod run_report;

pub use run_report::{ReportStatus, RunReport};
