//! Raw line input for capture sessions (stdin or a log file)

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::domain::CaptureError;

/// Lazy source of raw log lines
pub struct LineSource {
    reader: Box<dyn BufRead>,
}

impl LineSource {
    /// Read from standard input
    #[must_use]
    pub fn stdin() -> Self {
        Self::from_reader(BufReader::new(std::io::stdin()))
    }

    /// Read from a file
    ///
    /// # Errors
    /// Returns `CaptureError::InputOpen` if the file cannot be opened.
    pub fn open(path: &Path) -> Result<Self, CaptureError> {
        let file = File::open(path)
            .map_err(|source| CaptureError::InputOpen { path: path.to_path_buf(), source })?;
        Ok(Self::from_reader(BufReader::new(file)))
    }

    pub fn from_reader(reader: impl BufRead + 'static) -> Self {
        Self { reader: Box::new(reader) }
    }

    /// Iterate lines; blocks while the underlying source waits for input
    pub fn lines(self) -> impl Iterator<Item = std::io::Result<String>> {
        self.reader.lines()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_reads_lines_lazily() {
        let source = LineSource::from_reader(Cursor::new("a\nb\n\nc"));
        let lines: Vec<String> = source.lines().map(Result::unwrap).collect();
        assert_eq!(lines, vec!["a", "b", "", "c"]);
    }

    #[test]
    fn test_missing_file() {
        let err = LineSource::open(Path::new("/nonexistent/perfreplay.log")).err().unwrap();
        assert!(matches!(err, CaptureError::InputOpen { .. }));
    }
}
