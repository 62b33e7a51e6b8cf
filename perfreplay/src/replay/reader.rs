//! Sequential trace input for replay runs

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

use perfreplay_common::{is_comment_line, ParseTraceLineError, TraceEntry};

use crate::domain::ReplayError;

/// One non-comment line of a trace
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceLine {
    Entry(TraceEntry),
    /// Line that does not parse; logged and skipped by the scheduler
    Malformed { line_no: u64, error: ParseTraceLineError },
}

/// Iterator over the lines of a recorded trace, header comments skipped
pub struct TraceReader<R: BufRead> {
    lines: Lines<R>,
    line_no: u64,
}

impl TraceReader<BufReader<File>> {
    /// Open a trace file
    ///
    /// # Errors
    /// Returns `ReplayError::InputUnreadable` if the path is missing, is a
    /// directory, or cannot be opened.
    pub fn open(path: &Path) -> Result<Self, ReplayError> {
        let unreadable = || ReplayError::InputUnreadable { path: path.to_path_buf() };
        if !path.is_file() {
            return Err(unreadable());
        }
        let file = File::open(path).map_err(|_| unreadable())?;
        Ok(Self::from_reader(BufReader::new(file)))
    }
}

impl<R: BufRead> TraceReader<R> {
    pub fn from_reader(reader: R) -> Self {
        Self { lines: reader.lines(), line_no: 0 }
    }
}

impl<R: BufRead> Iterator for TraceReader<R> {
    type Item = Result<TraceLine, ReplayError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(ReplayError::Read(e))),
            };
            self.line_no += 1;
            if is_comment_line(&line) {
                continue;
            }
            return Some(Ok(match line.parse::<TraceEntry>() {
                Ok(entry) => TraceLine::Entry(entry),
                Err(error) => TraceLine::Malformed { line_no: self.line_no, error },
            }));
        }
    }
}
