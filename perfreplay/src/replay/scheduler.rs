//! Paced replay of a recorded trace against a live service
//!
//! # Architecture
//!
//! One task walks the trace sequentially and owns all pacing decisions. Each
//! entry becomes an independent worker task in a [`JoinSet`], so a slow call
//! never delays the dispatch of the next one. Workers report back through
//! shared state only: the run statistics, the call-time breaker, and a
//! one-way `breached` flag the dispatch loop polls.
//!
//! ```text
//!   trace ──▶ dispatch loop ──spawn──▶ worker ──▶ ServiceSender
//!                  ▲                     │
//!                  └──── breached ◀──────┤
//!                                        └──▶ RunStatistics
//! ```
//!
//! Before each entry the loop checks, in order: breaker, run duration, line
//! limit. The first to fire decides the status. The pacing wait never runs
//! past the run duration, and breaker and duration are checked again right
//! before the call leaves, so nothing is sent once a stop condition holds.
//! Entries beyond the replay window end the run normally.
//!
//! Time is `tokio::time::Instant`, so tests drive the schedule with a paused
//! clock.

use std::io::BufRead;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use perfreplay_common::RunStatusCode;
use tokio::task::JoinSet;
use tokio::time::Instant;

use super::health::{CallHealthMonitor, HealthVerdict};
use super::reader::{TraceLine, TraceReader};
use super::sender::ServiceSender;
use super::stats::{CallRecord, RunStatistics, StatsReport};
use crate::config::{HealthConfig, ReplayConfig};
use crate::domain::{Millis, ReplayError};

/// How long outstanding calls may finish after dispatch stops
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Final status of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunStatus {
    pub code: RunStatusCode,
    pub message: String,
}

impl RunStatus {
    #[must_use]
    pub fn ok() -> Self {
        Self { code: RunStatusCode::Ok, message: RunStatusCode::Ok.to_string() }
    }

    #[must_use]
    pub fn calltime_exceeded(health: &HealthConfig) -> Self {
        Self {
            code: RunStatusCode::CalltimeExceeded,
            message: format!(
                "CallTime exceeded (more than {} of the last {} calls slower than {}ms)",
                health.max_exceeding, health.window_size, health.cutoff.0
            ),
        }
    }

    #[must_use]
    pub fn runtime_exceeded(limit: Millis) -> Self {
        Self { code: RunStatusCode::RuntimeExceeded, message: format!("Runtime exceeded ({}ms)", limit.0) }
    }

    #[must_use]
    pub fn maxlines_exceeded(limit: u64) -> Self {
        Self {
            code: RunStatusCode::MaxlinesExceeded,
            message: format!("Max number of lines exceeded ({limit} lines)"),
        }
    }

    #[must_use]
    pub fn io_error(err: &ReplayError) -> Self {
        Self { code: RunStatusCode::IoError, message: err.to_string() }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {}", self.code, self.code.code(), self.message)
    }
}

/// Everything a finished run hands to the report
#[derive(Debug, Clone)]
pub struct ReplayOutcome {
    pub status: RunStatus,
    pub statistics: StatsReport,
    /// Trace lines consumed (comments excluded, malformed lines included)
    pub lines_read: u64,
    pub dispatched: u64,
    /// Calls still running when the shutdown grace ran out
    pub abandoned: usize,
    pub elapsed: Duration,
}

/// State shared between the dispatch loop and its workers
struct Shared {
    stats: RunStatistics,
    monitor: CallHealthMonitor,
    breached: AtomicBool,
}

pub struct ReplayScheduler {
    config: ReplayConfig,
    sender: Arc<dyn ServiceSender>,
    shutdown_grace: Duration,
}

impl ReplayScheduler {
    pub fn new(config: ReplayConfig, sender: Arc<dyn ServiceSender>) -> Self {
        Self { config, sender, shutdown_grace: DEFAULT_SHUTDOWN_GRACE }
    }

    #[must_use]
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Replay the trace at `path`
    ///
    /// An unreadable input ends the run with `IOERROR` before anything is sent.
    pub async fn run_file(&self, path: &Path) -> ReplayOutcome {
        match TraceReader::open(path) {
            Ok(trace) => self.run(trace).await,
            Err(e) => {
                error!("{e}");
                let shared = self.shared();
                let status = RunStatus::io_error(&e);
                shared.stats.record_call(CallRecord::status_entry(status.message.clone()));
                ReplayOutcome {
                    status,
                    statistics: shared.stats.report(),
                    lines_read: 0,
                    dispatched: 0,
                    abandoned: 0,
                    elapsed: Duration::ZERO,
                }
            }
        }
    }

    pub async fn run<R: BufRead>(&self, mut trace: TraceReader<R>) -> ReplayOutcome {
        let shared = self.shared();
        let mut workers = JoinSet::new();
        let mut lines_read: u64 = 0;
        let mut dispatched: u64 = 0;

        info!(
            "Replaying at {} (run limit {}, replay window {}, call constraint {})",
            self.config.speed, self.config.duration_limit, self.config.replay_time, self.config.health
        );
        let start = Instant::now();

        let status = loop {
            let Some(item) = trace.next() else {
                debug!("End of trace");
                break RunStatus::ok();
            };

            lines_read += 1;
            if let Some(stop) = self.stop_condition(&shared, start, lines_read) {
                break stop;
            }

            let entry = match item {
                Ok(TraceLine::Entry(entry)) => entry,
                Ok(TraceLine::Malformed { line_no, error }) => {
                    warn!("Skipping trace line {line_no}: {error}");
                    continue;
                }
                Err(e) => {
                    error!("{e}");
                    break RunStatus::io_error(&e);
                }
            };

            if entry.offset_ms > self.config.replay_time.0 {
                info!("Replay window of {} reached", self.config.replay_time);
                break RunStatus::ok();
            }

            let target = self.config.speed.scale(Millis(entry.offset_ms));
            let delay = target.0.saturating_sub(Millis::from_duration(start.elapsed()).0);
            if delay > 0 {
                let wake = Duration::from_millis(delay).min(self.time_left(start));
                tokio::time::sleep(wake).await;
                // Let calls completing at this instant report before deciding
                tokio::task::yield_now().await;
                if let Some(stop) = self.stop_condition(&shared, start, lines_read) {
                    break stop;
                }
            }

            let record = CallRecord::new(entry.offset_ms, delay, entry.query);
            workers.spawn(dispatch_call(Arc::clone(&self.sender), Arc::clone(&shared), record));
            dispatched += 1;
            if dispatched % 1000 == 0 {
                info!("Dispatched {dispatched} calls");
            }

            while let Some(joined) = workers.try_join_next() {
                if let Err(e) = joined {
                    warn!("Replay worker failed: {e}");
                }
            }
        };

        if status.code.is_ok() {
            info!("Stopping after {dispatched} calls");
        } else {
            warn!("Stopping after {dispatched} calls: {}", status.message);
            shared.stats.record_call(CallRecord::status_entry(status.message.clone()));
        }

        let abandoned = self.drain(&mut workers).await;
        let elapsed = start.elapsed();
        info!("Stopped: {status} after {}", Millis::from_duration(elapsed));

        ReplayOutcome {
            status,
            statistics: shared.stats.report(),
            lines_read,
            dispatched,
            abandoned,
            elapsed,
        }
    }

    /// First stop condition that holds, in priority order
    fn stop_condition(&self, shared: &Shared, start: Instant, lines_read: u64) -> Option<RunStatus> {
        if shared.breached.load(Ordering::Acquire) {
            return Some(RunStatus::calltime_exceeded(&self.config.health));
        }
        if start.elapsed() > self.config.duration_limit.as_duration() {
            return Some(RunStatus::runtime_exceeded(self.config.duration_limit));
        }
        if lines_read > self.config.line_limit {
            return Some(RunStatus::maxlines_exceeded(self.config.line_limit));
        }
        None
    }

    /// Time until the run duration is exceeded (just past the limit)
    fn time_left(&self, start: Instant) -> Duration {
        let deadline = self.config.duration_limit.as_duration() + Duration::from_millis(1);
        deadline.saturating_sub(start.elapsed())
    }

    fn shared(&self) -> Arc<Shared> {
        Arc::new(Shared {
            stats: RunStatistics::new(self.config.speed.is_full_throttle()),
            monitor: CallHealthMonitor::new(self.config.health),
            breached: AtomicBool::new(false),
        })
    }

    /// Wait up to the shutdown grace for outstanding calls
    ///
    /// Calls still running afterwards are detached, not cancelled. Returns
    /// how many there were.
    async fn drain(&self, workers: &mut JoinSet<()>) -> usize {
        let finished = tokio::time::timeout(self.shutdown_grace, async {
            while let Some(joined) = workers.join_next().await {
                if let Err(e) = joined {
                    warn!("Replay worker failed: {e}");
                }
            }
        })
        .await;

        if finished.is_ok() {
            return 0;
        }
        let outstanding = workers.len();
        warn!(
            "{outstanding} calls still outstanding after {}, not waiting for them",
            Millis::from_duration(self.shutdown_grace)
        );
        workers.detach_all();
        outstanding
    }
}

async fn dispatch_call(sender: Arc<dyn ServiceSender>, shared: Arc<Shared>, record: CallRecord) {
    match sender.send(&record.query).await {
        Ok(outcome) => {
            let verdict = shared.monitor.add_call_time(outcome.duration);
            debug!("{} -> {} in {}", record.query, outcome.status, outcome.duration);
            shared.stats.record_call(record.completed(outcome.duration.0, outcome.status));
            if verdict == HealthVerdict::Breached && !shared.breached.swap(true, Ordering::AcqRel) {
                warn!(
                    "Call time constraint breached: {} calls slower than {} in the window",
                    shared.monitor.exceeding(),
                    shared.monitor.cutoff()
                );
            }
        }
        Err(e) => {
            warn!("{}: {e}", record.query);
            shared.stats.record_call(CallRecord::status_entry(format!("{e}: {}", record.query)));
        }
    }
}
