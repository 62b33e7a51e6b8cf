//! # Reorder Buffer
//!
//! Turns an event stream with no global ordering guarantee (several log
//! partitions interleaved) into a time-ordered trace with bounded memory.
//!
//! ## How it works
//!
//! ```text
//!   accept(e)                        emit(min)
//!  ──────────► [ min-heap, ≤ K+1 ] ──────────► TraceWriter
//!                keyed by (offset, query)
//! ```
//!
//! - The first accepted event fixes the origin; every event is keyed by
//!   `max(0, timestamp - origin)` and its query (tie-break, so equal offsets
//!   still come out in a deterministic order).
//! - Once more than K events are held, the smallest is emitted. Input that
//!   is at most K positions out of place therefore comes out sorted.
//! - Emitted offsets are rebased on the first emitted event. An entry that
//!   arrives too late to keep the output sorted is still written, with a
//!   warning.
//! - Capture ends (normally) when an emitted entry lies beyond the duration
//!   limit or the line limit is reached. Whatever is still buffered at that
//!   point lies beyond the cutoff and is discarded on [`CaptureBuffer::close`].

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::io::Write;

use chrono::{DateTime, Utc};
use log::{debug, warn};
use perfreplay_common::TraceEntry;

use super::writer::{HeaderFn, TraceWriter};
use super::CapturedEvent;
use crate::config::CaptureConfig;
use crate::domain::{CaptureError, Millis};

/// Why a capture session finished before its source ran dry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// An emitted event lay beyond the capture duration
    Duration,
    /// The configured number of lines was written
    LineLimit,
}

/// Result of feeding one event into the buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureProgress {
    Continue,
    Complete(Completion),
}

/// What a finished capture session produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CaptureSummary {
    pub accepted: u64,
    pub emitted: u64,
    /// Buffered events dropped because they lay beyond the cutoff
    pub discarded: u64,
    /// Emitted entries that broke the output ordering
    pub out_of_order: u64,
    pub completion: Option<Completion>,
}

/// Heap slot: an event keyed by its offset from the session origin
#[derive(Debug)]
struct Buffered {
    offset: u64,
    event: CapturedEvent,
}

impl Ord for Buffered {
    fn cmp(&self, other: &Self) -> Ordering {
        self.offset
            .cmp(&other.offset)
            .then_with(|| self.event.query.cmp(&other.event.query))
    }
}

impl PartialOrd for Buffered {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Buffered {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Buffered {}

/// Bounded reorder buffer in front of a [`TraceWriter`]
pub struct CaptureBuffer<W: Write> {
    heap: BinaryHeap<Reverse<Buffered>>,
    reorder_tolerance: usize,
    duration_limit: Millis,
    line_limit: u64,

    writer: TraceWriter<W>,
    header: Option<HeaderFn<W>>,

    origin: Option<DateTime<Utc>>,
    first_offset: Option<u64>,
    last_offset: u64,
    summary: CaptureSummary,
}

impl<W: Write> CaptureBuffer<W> {
    pub fn new(config: &CaptureConfig, writer: TraceWriter<W>) -> Self {
        debug!("reorder tolerance = {}", config.reorder_tolerance);
        debug!("duration limit = {}", config.duration_limit);
        debug!("line limit = {}", config.line_limit);
        Self {
            heap: BinaryHeap::with_capacity(config.reorder_tolerance.saturating_add(1).min(1 << 16)),
            reorder_tolerance: config.reorder_tolerance,
            duration_limit: config.duration_limit,
            line_limit: config.line_limit,
            writer,
            header: None,
            origin: None,
            first_offset: None,
            last_offset: 0,
            summary: CaptureSummary::default(),
        }
    }

    /// Run `header` once, with the first emitted event, before its line
    #[must_use]
    pub fn with_header(mut self, header: HeaderFn<W>) -> Self {
        self.header = Some(header);
        self
    }

    /// Events currently held back
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.heap.len()
    }

    #[must_use]
    pub fn completion(&self) -> Option<Completion> {
        self.summary.completion
    }

    /// Buffer one event, emitting the oldest once more than K are held
    ///
    /// After the session has completed this is a no-op that keeps
    /// reporting the latched completion.
    ///
    /// # Errors
    /// Returns `CaptureError::Write` if the trace cannot be written.
    pub fn accept(&mut self, event: CapturedEvent) -> Result<CaptureProgress, CaptureError> {
        if let Some(completion) = self.summary.completion {
            return Ok(CaptureProgress::Complete(completion));
        }

        let origin = *self.origin.get_or_insert(event.timestamp);
        let offset = event.offset_from(origin);
        self.heap.push(Reverse(Buffered { offset, event }));
        self.summary.accepted += 1;

        if self.heap.len() > self.reorder_tolerance {
            if let Some(Reverse(oldest)) = self.heap.pop() {
                return self.emit(oldest);
            }
        }
        Ok(CaptureProgress::Continue)
    }

    fn emit(&mut self, entry: Buffered) -> Result<CaptureProgress, CaptureError> {
        let first_offset = match self.first_offset {
            Some(first) => first,
            None => {
                self.first_offset = Some(entry.offset);
                if let Some(header) = self.header.take() {
                    header(&mut self.writer, &entry.event).map_err(CaptureError::Write)?;
                }
                entry.offset
            }
        };

        let relative = entry.offset.saturating_sub(first_offset);
        if relative > self.duration_limit.0 {
            debug!("entry at {} is beyond capture duration {}", Millis(relative), self.duration_limit);
            // The popped entry itself lies beyond the cutoff
            self.summary.discarded += 1;
            return Ok(self.complete(Completion::Duration));
        }

        if relative < self.last_offset {
            warn!(
                "Buffered output is out of order, increase buffer size? (outputted={}, next={relative})",
                self.last_offset
            );
            self.summary.out_of_order += 1;
        } else {
            self.last_offset = relative;
        }

        self.writer
            .write_entry(&TraceEntry::new(relative, entry.event.query))
            .map_err(CaptureError::Write)?;
        self.summary.emitted += 1;

        if self.summary.emitted >= self.line_limit {
            return Ok(self.complete(Completion::LineLimit));
        }
        Ok(CaptureProgress::Continue)
    }

    fn complete(&mut self, completion: Completion) -> CaptureProgress {
        debug!("capture complete: {completion:?}");
        self.summary.completion = Some(completion);
        CaptureProgress::Complete(completion)
    }

    /// End the session and release the writer
    ///
    /// If the source ran dry, everything still buffered is written in
    /// order. If the session completed, the remainder lies beyond the
    /// cutoff and is dropped.
    ///
    /// # Errors
    /// Returns `CaptureError::Write` if draining or flushing fails.
    pub fn close(mut self) -> Result<(CaptureSummary, W), CaptureError> {
        debug!("closing with {} buffered, completion = {:?}", self.heap.len(), self.summary.completion);

        while self.summary.completion.is_none() {
            let Some(Reverse(entry)) = self.heap.pop() else {
                break;
            };
            self.emit(entry)?;
        }
        self.summary.discarded += self.heap.len() as u64;
        self.heap.clear();

        let out = self.writer.finish().map_err(CaptureError::Write)?;
        Ok((self.summary, out))
    }
}
