//! Run statistics aggregated across concurrently completing calls
//!
//! # Architecture
//!
//! Every replay worker writes one [`CallRecord`] when its call completes.
//! Count/min/max/sum, the per-status counters, the retained samples and the
//! run log all live in one [`Aggregate`] behind a single mutex, so a record
//! is applied as a unit and never half-counted.
//!
//! # Percentiles
//!
//! Computed from every retained sample (exact, memory grows with the run).
//! Estimator: sort the samples, take `pos = p·(n+1)/100`; below 1 yields the
//! minimum, at or above `n` the maximum, otherwise interpolate linearly
//! between the `⌊pos⌋`-th and the next order statistic. Same input, same
//! output, every run.
//!
//! Under full throttle no samples are retained and no percentiles reported.

#![allow(clippy::cast_precision_loss)]

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use serde::Serialize;

/// Percentiles reported for paced runs
pub const REPORTED_PERCENTILES: [u8; 8] = [50, 60, 70, 75, 80, 90, 95, 99];

/// One dispatched call as it appears in the run log
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallRecord {
    /// Offset of the entry in the recorded trace
    #[serde(rename = "originalTimeDelta")]
    pub original_offset_ms: u64,
    /// Pacing delay waited before the call was dispatched
    #[serde(rename = "callDelay")]
    pub scheduled_delay_ms: u64,
    #[serde(rename = "callDuration")]
    pub call_duration_ms: u64,
    pub query: String,
    pub status: String,
    /// Wall-clock creation time, epoch milliseconds
    pub timestamp: i64,
}

impl CallRecord {
    #[must_use]
    pub fn new(original_offset_ms: u64, scheduled_delay_ms: u64, query: impl Into<String>) -> Self {
        Self {
            original_offset_ms,
            scheduled_delay_ms,
            call_duration_ms: 0,
            query: query.into(),
            status: String::new(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Status-only log line (empty query, never counted in statistics)
    #[must_use]
    pub fn status_entry(message: impl Into<String>) -> Self {
        Self { status: message.into(), ..Self::new(0, 0, "") }
    }

    #[must_use]
    pub fn completed(mut self, call_duration_ms: u64, status: impl Into<String>) -> Self {
        self.call_duration_ms = call_duration_ms;
        self.status = status.into();
        self
    }
}

/// Summary statistics over call durations
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CallStat {
    pub count: u64,
    pub min: u64,
    pub max: u64,
    pub average: f64,
    pub sum: u64,
}

/// Snapshot of everything needed for the run report
#[derive(Debug, Clone, PartialEq)]
pub struct StatsReport {
    pub call_stat: CallStat,
    pub counter: BTreeMap<String, u64>,
    /// `None` under full throttle
    pub percentiles: Option<BTreeMap<String, f64>>,
    pub records: Vec<CallRecord>,
}

#[derive(Debug, Default)]
struct Aggregate {
    count: u64,
    min: u64,
    max: u64,
    sum: u64,
    counters: BTreeMap<String, u64>,
    samples: Vec<u64>,
    records: Vec<CallRecord>,
}

impl Aggregate {
    /// Count a call unless its query is empty (nothing was sent)
    fn count(&mut self, duration_ms: u64, status: &str, query: &str, retain_sample: bool) -> bool {
        if query.is_empty() {
            return false;
        }
        self.add(duration_ms, status, retain_sample);
        true
    }

    fn add(&mut self, duration_ms: u64, status: &str, retain_sample: bool) {
        if self.count == 0 {
            self.min = duration_ms;
            self.max = duration_ms;
        } else {
            self.min = self.min.min(duration_ms);
            self.max = self.max.max(duration_ms);
        }
        self.count += 1;
        self.sum = self.sum.saturating_add(duration_ms);
        *self.counters.entry(status.to_string()).or_default() += 1;
        if retain_sample {
            self.samples.push(duration_ms);
        }
    }
}

/// Thread-safe aggregate shared by all replay workers
#[derive(Debug)]
pub struct RunStatistics {
    full_throttle: bool,
    inner: Mutex<Aggregate>,
}

impl RunStatistics {
    /// `full_throttle` disables sample retention and percentiles
    #[must_use]
    pub fn new(full_throttle: bool) -> Self {
        Self { full_throttle, inner: Mutex::new(Aggregate::default()) }
    }

    /// Count one call; ignored when `query` is empty (nothing was sent)
    ///
    /// Returns whether the call was counted.
    pub fn record(&self, duration_ms: u64, status: &str, query: &str) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.count(duration_ms, status, query, !self.full_throttle)
    }

    /// Append a record to the run log and count it (see [`record`](Self::record))
    pub fn record_call(&self, record: CallRecord) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.count(record.call_duration_ms, &record.status, &record.query, !self.full_throttle);
        inner.records.push(record);
    }

    #[must_use]
    pub fn call_stat(&self) -> CallStat {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        Self::call_stat_of(&inner)
    }

    fn call_stat_of(inner: &Aggregate) -> CallStat {
        let average = if inner.count == 0 { 0.0 } else { inner.sum as f64 / inner.count as f64 };
        CallStat { count: inner.count, min: inner.min, max: inner.max, average, sum: inner.sum }
    }

    /// Snapshot counters, summary, percentiles and the run log
    #[must_use]
    pub fn report(&self) -> StatsReport {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let percentiles = (!self.full_throttle).then(|| {
            let mut sorted = inner.samples.clone();
            sorted.sort_unstable();
            REPORTED_PERCENTILES
                .iter()
                .filter_map(|&p| {
                    percentile(&sorted, f64::from(p)).map(|value| (format!("percentile {p}"), value))
                })
                .collect()
        });

        StatsReport {
            call_stat: Self::call_stat_of(&inner),
            counter: inner.counters.clone(),
            percentiles,
            records: inner.records.clone(),
        }
    }
}

/// Percentile `p` (0 < p ≤ 100) of ascending `sorted` samples
///
/// `None` for an empty sample set.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn percentile(sorted: &[u64], p: f64) -> Option<f64> {
    let n = sorted.len();
    let (&first, &last) = (sorted.first()?, sorted.last()?);
    if n == 1 {
        return Some(first as f64);
    }

    let pos = p * (n as f64 + 1.0) / 100.0;
    if pos < 1.0 {
        return Some(first as f64);
    }
    if pos >= n as f64 {
        return Some(last as f64);
    }

    let floor = pos.floor();
    let index = floor as usize;
    let lower = sorted[index - 1] as f64;
    let upper = sorted[index] as f64;
    Some(lower + (pos - floor) * (upper - lower))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn with_durations(durations: &[u64], full_throttle: bool) -> RunStatistics {
        let stats = RunStatistics::new(full_throttle);
        for &d in durations {
            stats.record_call(CallRecord::new(0, 0, format!("a-query: duration={d}")).completed(d, "200"));
        }
        stats
    }

    #[test]
    fn test_summary() {
        let stats = with_durations(&[10, 20, 30], false);
        let call_stat = stats.call_stat();
        assert_eq!(call_stat.count, 3);
        assert_eq!(call_stat.min, 10);
        assert_eq!(call_stat.max, 30);
        assert_eq!(call_stat.sum, 60);
        assert!((call_stat.average - 20.0).abs() < f64::EPSILON);

        let report = stats.report();
        let percentiles = report.percentiles.unwrap();
        assert_eq!(percentiles["percentile 50"], 20.0);
        assert_eq!(percentiles.len(), REPORTED_PERCENTILES.len());
        assert_eq!(report.counter["200"], 3);
    }

    #[test]
    fn test_empty_query_ignored() {
        let stats = RunStatistics::new(false);
        assert!(!stats.record(999, "500", ""));
        assert!(stats.record(10, "200", "q=a"));
        stats.record_call(CallRecord::status_entry("Runtime exceeded (1000ms)"));
        stats.record_call(CallRecord::new(5, 0, String::new()).completed(750, "503"));

        let report = stats.report();
        assert_eq!(report.call_stat.count, 1);
        assert_eq!(report.call_stat.max, 10);
        assert_eq!(report.counter.len(), 1);
        assert_eq!(report.percentiles.unwrap()["percentile 99"], 10.0);
        // entries without a query are logged, just not counted
        assert_eq!(report.records.len(), 2);
        assert_eq!(report.records[0].status, "Runtime exceeded (1000ms)");
    }

    #[test]
    fn test_full_throttle_has_no_percentiles() {
        let report = with_durations(&[10, 20, 30], true).report();
        assert!(report.percentiles.is_none());
        assert_eq!(report.call_stat.count, 3);
    }

    #[test]
    fn test_empty_run() {
        let report = RunStatistics::new(false).report();
        assert_eq!(report.call_stat.count, 0);
        assert_eq!(report.call_stat.average, 0.0);
        assert!(report.percentiles.unwrap().is_empty());
    }

    #[test]
    fn test_percentile_interpolation() {
        let sorted: Vec<u64> = (1..=10).map(|i| i * 10).collect();
        // pos = 0.9 * 11 = 9.9 → 90 + 0.9 * (100 - 90)
        assert!((percentile(&sorted, 90.0).unwrap() - 99.0).abs() < 1e-9);
        // pos = 0.5 * 11 = 5.5 → halfway between 50 and 60
        assert!((percentile(&sorted, 50.0).unwrap() - 55.0).abs() < 1e-9);
        assert_eq!(percentile(&sorted, 5.0), Some(10.0));
        assert_eq!(percentile(&sorted, 99.0), Some(100.0));
        assert_eq!(percentile(&[42], 75.0), Some(42.0));
        assert_eq!(percentile(&[], 50.0), None);
    }

    #[test]
    fn test_concurrent_records() {
        let stats = Arc::new(RunStatistics::new(false));
        let handles: Vec<_> = (0..8u64)
            .map(|t| {
                let stats = Arc::clone(&stats);
                std::thread::spawn(move || {
                    for i in 0..250u64 {
                        let status = if i % 5 == 0 { "500" } else { "200" };
                        stats.record_call(CallRecord::new(i, 0, "q=x").completed(t * 1000 + i, status));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let report = stats.report();
        assert_eq!(report.call_stat.count, 2000);
        assert_eq!(report.call_stat.min, 0);
        assert_eq!(report.call_stat.max, 7249);
        assert_eq!(report.counter["500"], 400);
        assert_eq!(report.counter["200"], 1600);
        assert_eq!(report.records.len(), 2000);
    }
}
