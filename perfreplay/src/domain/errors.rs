//! Structured error types for perfreplay
//!
//! Using thiserror for automatic Display implementation and error chaining.
//! Expected stop conditions (duration, line limit, call-time breaker) are not
//! errors and never appear here.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Failed to open input {path}: {source}")]
    InputOpen { path: PathBuf, source: std::io::Error },

    #[error("Failed to open output {path}: {source}")]
    OutputOpen { path: PathBuf, source: std::io::Error },

    #[error("Failed to read input: {0}")]
    Read(std::io::Error),

    #[error("Failed to write trace: {0}")]
    Write(std::io::Error),
}

/// A raw log line the classifier could not make sense of.
///
/// Distinct from a line that parses fine but is rejected by a business rule
/// (those classify to `Ok(None)`).
#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error("Line is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Invalid timestamp {0:?}")]
    InvalidTimestamp(String),
}

#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("File {path} does not exist or is not a file")]
    InputUnreadable { path: PathBuf },

    #[error("Error processing input: {0}")]
    Read(std::io::Error),

    #[error("Failed to set up sender: {0}")]
    SenderSetup(String),

    #[error("Failed to write report: {0}")]
    ReportWrite(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// A single call that could not even be attempted (bad URL, client setup).
///
/// Ordinary failures such as HTTP 500 or a refused connection are a status
/// label, not an error.
#[derive(Error, Debug)]
#[error("Call could not be attempted: {0}")]
pub struct SendError(pub String);

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Duration {0:?} is not in valid format [number]d/h/m/s")]
    InvalidTimeSpec(String),

    #[error("Calltime constraint {0:?} not valid (expected CUTOFF/MAX-CALLS/WINDOW)")]
    InvalidCallTime(String),

    #[error("Replay speed {0:?} not valid (0 or a positive percentage)")]
    InvalidSpeed(String),

    #[error("Number of lines needs to be at least 1")]
    InvalidLimit,
}
