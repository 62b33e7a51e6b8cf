//! Capture session: lines → classifier → reorder buffer → trace
//!
//! Single threaded and strictly sequential; the only blocking point is the
//! line source waiting for input.

use std::io::Write;

use log::{debug, info, warn};

use super::buffer::{CaptureBuffer, CaptureProgress, CaptureSummary};
use super::classifier::Classifier;
use crate::domain::CaptureError;

/// Counters for one capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionStats {
    pub lines_read: u64,
    /// Well-formed lines the classifier chose not to record
    pub rejected: u64,
    /// Lines the classifier could not parse
    pub malformed: u64,
    /// Events dropped by the application filter
    pub filtered: u64,
    pub buffer: CaptureSummary,
}

/// Drive a capture session until the source runs dry or the buffer completes
///
/// The buffer is always closed, so the trace is flushed on every exit path.
/// A read error still closes (and drains) the buffer before it is returned.
///
/// # Errors
/// Returns `CaptureError::Read` if the source fails, or `CaptureError::Write`
/// if the trace cannot be written.
pub fn run_capture<W, I>(
    lines: I,
    classifier: &dyn Classifier,
    application: Option<&str>,
    mut buffer: CaptureBuffer<W>,
) -> Result<(SessionStats, W), CaptureError>
where
    W: Write,
    I: IntoIterator<Item = std::io::Result<String>>,
{
    let mut stats = SessionStats::default();

    for line in lines {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("Error processing input: {e}");
                let _ = buffer.close()?;
                return Err(CaptureError::Read(e));
            }
        };
        stats.lines_read += 1;

        let event = match classifier.classify(&line) {
            Ok(Some(event)) => event,
            Ok(None) => {
                stats.rejected += 1;
                continue;
            }
            Err(e) => {
                debug!("skipping line: {e}");
                stats.malformed += 1;
                continue;
            }
        };

        if application.is_some_and(|app| app != event.application) {
            stats.filtered += 1;
            continue;
        }

        if let CaptureProgress::Complete(completion) = buffer.accept(event)? {
            debug!("Completed output ({completion:?})");
            break;
        }
    }

    let (summary, out) = buffer.close()?;
    stats.buffer = summary;
    info!(
        "capture finished: {} lines read, {} written, {} rejected, {} malformed, {} filtered",
        stats.lines_read, summary.emitted, stats.rejected, stats.malformed, stats.filtered
    );
    Ok((stats, out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{SolrLogClassifier, TraceWriter};
    use crate::config::CaptureConfig;
    use crate::domain::Millis;

    fn solr(ts: &str, app: &str, params: &str) -> std::io::Result<String> {
        Ok(serde_json::json!({
            "timestamp": ts,
            "app": app,
            "message": format!("webapp=/solr path=/select params={{{params}}} status=0"),
        })
        .to_string())
    }

    fn buffer(limit: u64) -> CaptureBuffer<Vec<u8>> {
        let config = CaptureConfig {
            reorder_tolerance: 2,
            duration_limit: Millis(60_000),
            line_limit: limit,
            application: None,
        };
        CaptureBuffer::new(&config, TraceWriter::new(Vec::new()))
    }

    #[test]
    fn test_skips_rejected_and_malformed_lines() {
        let lines = vec![
            solr("2019-06-14T09:00:00.000+00:00", "a", "q=1"),
            Ok("garbage".to_string()),
            solr("2019-06-14T09:00:00.100+00:00", "a", "q=2&distrib=false"),
            solr("2019-06-14T09:00:00.200+00:00", "a", "q=3"),
        ];
        let (stats, out) = run_capture(lines, &SolrLogClassifier, None, buffer(100)).unwrap();

        assert_eq!(stats.lines_read, 4);
        assert_eq!(stats.malformed, 1);
        assert_eq!(stats.rejected, 1);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "0 q=1&dbcPerfTest=true\n200 q=3&dbcPerfTest=true\n"
        );
    }

    #[test]
    fn test_application_filter() {
        let lines = vec![
            solr("2019-06-14T09:00:00.000+00:00", "a", "q=1"),
            solr("2019-06-14T09:00:00.050+00:00", "b", "q=2"),
        ];
        let (stats, out) = run_capture(lines, &SolrLogClassifier, Some("b"), buffer(100)).unwrap();
        assert_eq!(stats.filtered, 1);
        assert_eq!(String::from_utf8(out).unwrap(), "0 q=2&dbcPerfTest=true\n");
    }

    #[test]
    fn test_stops_reading_once_complete() {
        let lines = (0..100)
            .map(|i| solr(&format!("2019-06-14T09:00:{:02}.000+00:00", i % 60), "a", &format!("q={i}")));
        let (stats, _) = run_capture(lines, &SolrLogClassifier, None, buffer(1)).unwrap();
        assert_eq!(stats.buffer.emitted, 1);
        assert_eq!(stats.lines_read, 3);
    }

    #[test]
    fn test_read_error_flushes_then_fails() {
        let lines = vec![
            solr("2019-06-14T09:00:00.000+00:00", "a", "q=1"),
            Err(std::io::Error::other("broker went away")),
        ];
        let err = run_capture(lines, &SolrLogClassifier, None, buffer(100)).unwrap_err();
        assert!(matches!(err, CaptureError::Read(_)));
    }
}
