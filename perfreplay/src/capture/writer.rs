//! Trace output: one `"<offset_ms> <query>"` line per emitted event

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use perfreplay_common::{TraceEntry, HEADER_PREFIX};

use super::CapturedEvent;
use crate::domain::CaptureError;

/// One-shot callback run with the first emitted event, before its line is written
pub type HeaderFn<W> = Box<dyn FnOnce(&mut TraceWriter<W>, &CapturedEvent) -> std::io::Result<()>>;

/// Line-oriented trace sink over any `Write`
pub struct TraceWriter<W: Write> {
    out: W,
    lines: u64,
}

impl TraceWriter<Box<dyn Write>> {
    /// Write to a file (buffered), truncating unless `append` is set
    ///
    /// # Errors
    /// Returns `CaptureError::OutputOpen` if the file cannot be opened.
    pub fn create(path: &Path, append: bool) -> Result<Self, CaptureError> {
        let file = if append {
            OpenOptions::new().create(true).append(true).open(path)
        } else {
            File::create(path)
        }
        .map_err(|source| CaptureError::OutputOpen { path: path.to_path_buf(), source })?;
        Ok(Self::new(Box::new(BufWriter::new(file))))
    }

    #[must_use]
    pub fn stdout() -> Self {
        Self::new(Box::new(BufWriter::new(std::io::stdout())))
    }
}

impl<W: Write> TraceWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out, lines: 0 }
    }

    /// Write one trace line
    ///
    /// # Errors
    /// Propagates I/O errors from the underlying writer.
    pub fn write_entry(&mut self, entry: &TraceEntry) -> std::io::Result<()> {
        writeln!(self.out, "{entry}")?;
        self.lines += 1;
        Ok(())
    }

    /// Write a header comment line (`# ...`), skipped by trace readers
    ///
    /// # Errors
    /// Propagates I/O errors from the underlying writer.
    pub fn write_comment(&mut self, text: &str) -> std::io::Result<()> {
        writeln!(self.out, "{HEADER_PREFIX} {text}")
    }

    /// Trace lines written so far (comments excluded)
    #[must_use]
    pub fn lines(&self) -> u64 {
        self.lines
    }

    /// Flush and hand back the underlying writer
    ///
    /// # Errors
    /// Propagates the flush error.
    pub fn finish(mut self) -> std::io::Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}

/// Header stamped at the top of every recorded trace
pub fn standard_header<W: Write>(application: Option<String>) -> HeaderFn<W> {
    Box::new(move |writer: &mut TraceWriter<W>, first: &CapturedEvent| {
        writer.write_comment("perfreplay trace")?;
        writer.write_comment(&format!("first-event: {}", first.timestamp.to_rfc3339()))?;
        let application = application.as_deref().unwrap_or(first.application.as_str());
        if !application.is_empty() {
            writer.write_comment(&format!("application: {application}"))?;
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_writes_entries_and_counts_lines() {
        let mut writer = TraceWriter::new(Vec::new());
        writer.write_comment("perfreplay trace").unwrap();
        writer.write_entry(&TraceEntry::new(0, "q=a")).unwrap();
        writer.write_entry(&TraceEntry::new(15, "q=b")).unwrap();
        assert_eq!(writer.lines(), 2);

        let out = String::from_utf8(writer.finish().unwrap()).unwrap();
        assert_eq!(out, "# perfreplay trace\n0 q=a\n15 q=b\n");
    }

    #[test]
    fn test_standard_header_uses_first_event() {
        let first = CapturedEvent::new(Utc.with_ymd_and_hms(2019, 8, 27, 6, 34, 27).unwrap(), "solr-1", "q=a");
        let mut writer = TraceWriter::new(Vec::new());
        standard_header(None)(&mut writer, &first).unwrap();

        let out = String::from_utf8(writer.finish().unwrap()).unwrap();
        assert_eq!(
            out,
            "# perfreplay trace\n# first-event: 2019-08-27T06:34:27+00:00\n# application: solr-1\n"
        );
    }

    #[test]
    fn test_append_mode_keeps_existing_lines() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "0 q=old\n").unwrap();

        let mut writer = TraceWriter::create(file.path(), true).unwrap();
        writer.write_entry(&TraceEntry::new(0, "q=new")).unwrap();
        drop(writer.finish().unwrap());

        assert_eq!(std::fs::read_to_string(file.path()).unwrap(), "0 q=old\n0 q=new\n");
    }
}
