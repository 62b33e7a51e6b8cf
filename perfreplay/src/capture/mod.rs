//! Capture side: record live query traffic into a time-ordered trace
//!
//! ```text
//! LineSource ──► Classifier ──► CaptureBuffer ──► TraceWriter ──► trace file
//!  (stdin/file)   (pluggable)    (reorder, limits)   ("<ms> <query>")
//! ```

pub mod buffer;
pub mod classifier;
pub mod event;
pub mod line_source;
pub mod session;
pub mod writer;

pub use buffer::{CaptureBuffer, CaptureProgress, CaptureSummary, Completion};
pub use classifier::{Classifier, MdcRequestClassifier, SolrLogClassifier};
pub use event::CapturedEvent;
pub use line_source::LineSource;
pub use session::{run_capture, SessionStats};
pub use writer::{standard_header, HeaderFn, TraceWriter};
