//! # Shared Vocabulary (Recorder ↔ Replayer)
//!
//! Defines the on-disk trace line format and the run status table shared by
//! the recorder, the replayer and helper tooling (`xtask gen-trace`).
//!
//! ## Trace Format
//!
//! One event per line, UTF-8:
//!
//! ```text
//! # perfreplay trace                 <- optional header comments
//! 0 q=*:*&rows=10&dbcPerfTest=true
//! 1250 q=title:london&dbcPerfTest=true
//! ```
//!
//! The first field is the offset in milliseconds relative to the first
//! recorded event, the rest of the line (after a single space) is the query.
//!
//! ## Key Types
//!
//! - [`TraceEntry`] - One persisted trace line
//! - [`RunStatusCode`] - Replay outcome, doubles as the process exit status

use std::fmt;
use std::str::FromStr;

// ============================================================================
// Trace Line Format
// ============================================================================

/// Lines starting with this prefix are header comments, skipped on read.
pub const HEADER_PREFIX: char = '#';

/// Query parameter appended to every recorded query.
///
/// Requests carrying it originate from a replay and are rejected on capture,
/// so a recorder listening on a service being replayed against never records
/// its own traffic.
pub const REPLAY_MARKER: &str = "dbcPerfTest=true";

/// One persisted trace line: `"<offset_ms> <query>"`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TraceEntry {
    /// Milliseconds since the first emitted event of the recording
    pub offset_ms: u64,
    /// Query exactly as it should be re-issued
    pub query: String,
}

impl TraceEntry {
    #[must_use]
    pub fn new(offset_ms: u64, query: impl Into<String>) -> Self {
        Self { offset_ms, query: query.into() }
    }

    /// Render as a trace line including the trailing newline
    #[must_use]
    pub fn to_line(&self) -> String {
        format!("{self}\n")
    }
}

impl fmt::Display for TraceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.offset_ms, self.query)
    }
}

/// Why a trace line could not be parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseTraceLineError {
    /// No space separating offset and query
    MissingSeparator,
    /// Offset is not a non-negative integer
    InvalidOffset(String),
    /// Nothing after the separator
    EmptyQuery,
}

impl fmt::Display for ParseTraceLineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSeparator => write!(f, "missing space between offset and query"),
            Self::InvalidOffset(raw) => write!(f, "invalid offset: {raw:?}"),
            Self::EmptyQuery => write!(f, "empty query"),
        }
    }
}

impl std::error::Error for ParseTraceLineError {}

impl FromStr for TraceEntry {
    type Err = ParseTraceLineError;

    /// Parse a line without its trailing newline (a trailing `\r` is tolerated)
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.strip_suffix('\r').unwrap_or(line);
        let (offset, query) = line.split_once(' ').ok_or(ParseTraceLineError::MissingSeparator)?;
        let offset_ms = offset
            .parse::<u64>()
            .map_err(|_| ParseTraceLineError::InvalidOffset(offset.to_string()))?;
        if query.is_empty() {
            return Err(ParseTraceLineError::EmptyQuery);
        }
        Ok(Self { offset_ms, query: query.to_string() })
    }
}

/// Returns `true` for lines the reader must skip (blank or header comment)
#[must_use]
pub fn is_comment_line(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || trimmed.starts_with(HEADER_PREFIX)
}

// ============================================================================
// Run Status
// ============================================================================

/// Replay outcome
///
/// The numeric value is the process exit status of the replayer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum RunStatusCode {
    Ok,
    #[cfg_attr(feature = "serde", serde(rename = "IOERROR"))]
    IoError,
    RuntimeExceeded,
    CalltimeExceeded,
    MaxlinesExceeded,
}

impl RunStatusCode {
    /// Exit status for this outcome
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Ok => 0,
            Self::IoError => 1,
            Self::RuntimeExceeded => 50,
            Self::CalltimeExceeded => 51,
            Self::MaxlinesExceeded => 52,
        }
    }

    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl fmt::Display for RunStatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ok => "OK",
            Self::IoError => "IOERROR",
            Self::RuntimeExceeded => "RUNTIME_EXCEEDED",
            Self::CalltimeExceeded => "CALLTIME_EXCEEDED",
            Self::MaxlinesExceeded => "MAXLINES_EXCEEDED",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_trace_line() {
        let entry = TraceEntry::new(1250, "q=title:london&rows=10");
        assert_eq!(entry.to_line(), "1250 q=title:london&rows=10\n");
    }

    #[test]
    fn test_parse_keeps_spaces_in_query() {
        let entry: TraceEntry = "40 /search?query=peter handke".parse().unwrap();
        assert_eq!(entry.offset_ms, 40);
        assert_eq!(entry.query, "/search?query=peter handke");
    }

    #[test]
    fn test_parse_tolerates_crlf() {
        let entry: TraceEntry = "7 q=a\r".parse().unwrap();
        assert_eq!(entry, TraceEntry::new(7, "q=a"));
    }

    #[test]
    fn test_parse_rejects_malformed_lines() {
        assert_eq!("1000".parse::<TraceEntry>(), Err(ParseTraceLineError::MissingSeparator));
        assert_eq!(
            "-5 q=a".parse::<TraceEntry>(),
            Err(ParseTraceLineError::InvalidOffset("-5".to_string()))
        );
        assert_eq!("5 ".parse::<TraceEntry>(), Err(ParseTraceLineError::EmptyQuery));
    }

    #[test]
    fn test_comment_lines() {
        assert!(is_comment_line("# perfreplay trace"));
        assert!(is_comment_line("   "));
        assert!(!is_comment_line("0 q=a"));
    }

    #[test]
    fn test_status_exit_codes() {
        assert_eq!(RunStatusCode::Ok.code(), 0);
        assert_eq!(RunStatusCode::IoError.code(), 1);
        assert_eq!(RunStatusCode::RuntimeExceeded.code(), 50);
        assert_eq!(RunStatusCode::CalltimeExceeded.code(), 51);
        assert_eq!(RunStatusCode::MaxlinesExceeded.code(), 52);
        assert_eq!(RunStatusCode::CalltimeExceeded.to_string(), "CALLTIME_EXCEEDED");
    }
}
