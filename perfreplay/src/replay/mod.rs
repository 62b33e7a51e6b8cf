//! Replay: read a trace, pace its calls against a service, aggregate results

pub mod health;
pub mod reader;
pub mod scheduler;
pub mod sender;
pub mod stats;

pub use health::{CallHealthMonitor, HealthVerdict};
pub use reader::{TraceLine, TraceReader};
pub use scheduler::{ReplayOutcome, ReplayScheduler, RunStatus, DEFAULT_SHUTDOWN_GRACE};
pub use sender::{DryRunSender, HttpSender, SendOutcome, ServiceSender};
pub use stats::{CallRecord, CallStat, RunStatistics, StatsReport};
