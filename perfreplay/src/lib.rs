//! # perfreplay - Search Traffic Capture and Replay
//!
//! perfreplay records live query traffic from a search service's request log
//! into a time-ordered trace, then replays that trace against a target
//! service at the original pace (or scaled, or at full throttle) while
//! measuring call latency and watching for degradation.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────── record ─────────────────────────────────┐
//! │                                                                         │
//! │  LineSource ──▶ Classifier ──▶ CaptureBuffer ──▶ TraceWriter ──▶ trace  │
//! │  (stdin/file)   (solr/mdc)     (reorder K,       ("<ms> <query>")       │
//! │                                 duration/limit)                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//!
//! ┌──────────────────────────────── replay ─────────────────────────────────┐
//! │                                                                         │
//! │  TraceReader ──▶ ReplayScheduler ──spawn──▶ worker ──▶ ServiceSender    │
//! │                   (pacing, stop    ▲          │        (HTTP/dry-run)   │
//! │                    conditions)     │          ▼                         │
//! │                          breach ───┴── CallHealthMonitor                │
//! │                                              │                          │
//! │                               RunStatistics ◀┘ ──▶ RunReport (JSON)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`capture`]: classify raw log lines, reorder events within a bounded
//!   window, write the trace with offsets relative to the first event
//! - [`replay`]: read a trace, pace and dispatch calls concurrently, trip a
//!   sliding-window breaker on slow calls, aggregate statistics
//! - [`export`]: the JSON run report
//! - [`config`]: explicit capture/replay settings and their string forms
//! - [`cli`]: command-line argument parsing
//! - [`domain`]: newtypes and error enums
//!
//! ## Run Status
//!
//! Every replay ends with one of the statuses in
//! [`perfreplay_common::RunStatusCode`], which is also the process exit
//! status: `OK` (0), `IOERROR` (1), `RUNTIME_EXCEEDED` (50),
//! `CALLTIME_EXCEEDED` (51), `MAXLINES_EXCEEDED` (52).
//!
//! ## Typical Usage
//!
//! ```bash
//! # Record 30 minutes of traffic
//! tail -F solr.log | perfreplay record -o traffic.trace -d 30m
//!
//! # Replay it at double speed and keep a report
//! perfreplay replay -s http://localhost:8983/solr/core/select -i traffic.trace -r 200 -o report.json
//! ```

pub mod capture;
pub mod cli;
pub mod config;
pub mod domain;
pub mod export;
pub mod replay;
