use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::{
    parse_limit, parse_speed, parse_time_spec, CaptureConfig, HealthConfig, ReplayConfig,
    DEFAULT_REORDER_TOLERANCE,
};
use crate::domain::{Millis, SpeedFactor};

#[derive(Parser, Debug)]
#[command(
    name = "perfreplay",
    version,
    about = "Record live search traffic and replay it against a service",
    after_help = "\
EXAMPLES:
    tail -F solr.log | perfreplay record -o traffic.trace -d 30m
    perfreplay replay -s http://localhost:8983/solr/core/select -i traffic.trace -o report.json
    perfreplay replay -s http://localhost:8983/solr/core/select -i traffic.trace -r 200 -c 2s/5/50

EXIT STATUS:
    0 OK, 1 IOERROR, 50 RUNTIME_EXCEEDED, 51 CALLTIME_EXCEEDED, 52 MAXLINES_EXCEEDED"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Capture log lines into a time-ordered trace
    Record(RecordArgs),
    /// Replay a trace against a service and report call statistics
    Replay(ReplayArgs),
}

/// Built-in log line classifiers
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierKind {
    /// JSON lines with a Solr request log message
    Solr,
    /// JSON lines with an MDC block describing search/suggest requests
    Mdc,
}

#[derive(clap::Args, Debug)]
pub struct RecordArgs {
    /// Log file to read (default: stdin)
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Trace file to write (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Append to the output file instead of truncating it
    #[arg(long, requires = "output")]
    pub append: bool,

    /// Only record events of this application
    #[arg(short, long, value_name = "NAME")]
    pub application: Option<String>,

    #[arg(long, value_enum, default_value_t = ClassifierKind::Solr)]
    pub classifier: ClassifierKind,

    /// Reorder tolerance: events held back before the oldest is written
    #[arg(short = 'b', long, value_name = "K", default_value_t = DEFAULT_REORDER_TOLERANCE)]
    pub buffer: usize,

    /// Capture duration, e.g. 15s, 30m, 1h, 2d
    #[arg(short, long, value_name = "SPEC", default_value = "1h", value_parser = parse_time_spec)]
    pub duration: Millis,

    /// Stop after N trace lines
    #[arg(short, long, value_name = "N", value_parser = parse_limit)]
    pub limit: Option<u64>,
}

impl RecordArgs {
    #[must_use]
    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            reorder_tolerance: self.buffer,
            duration_limit: self.duration,
            line_limit: self.limit.unwrap_or(u64::MAX),
            application: self.application.clone(),
        }
    }
}

#[derive(clap::Args, Debug)]
pub struct ReplayArgs {
    /// Base URL of the service under test
    #[arg(short, long, value_name = "URL")]
    pub service: String,

    /// Trace file to replay
    #[arg(short, long, value_name = "FILE")]
    pub input: PathBuf,

    /// Write the JSON run report here
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Stop dispatching after this long, e.g. 15s, 30m, 1h
    #[arg(short, long, value_name = "SPEC", default_value = "1h", value_parser = parse_time_spec)]
    pub duration: Millis,

    /// Only replay entries recorded within this offset
    #[arg(short = 't', long, value_name = "SPEC", default_value = "1h", value_parser = parse_time_spec)]
    pub replay_time: Millis,

    /// Stop after N trace lines (at least 1)
    #[arg(short, long, value_name = "N", value_parser = parse_limit)]
    pub limit: Option<u64>,

    /// Call-time constraint CUTOFF/MAX-CALLS/WINDOW
    #[arg(short, long, value_name = "SPEC", default_value = "5s/10/100", value_parser = HealthConfig::parse)]
    pub calltime: HealthConfig,

    /// Replay speed in percent of the recorded pace (0 = full throttle)
    #[arg(short, long, value_name = "PCT", default_value = "100", value_parser = parse_speed)]
    pub replay: SpeedFactor,

    /// Walk the trace without sending anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,
}

impl ReplayArgs {
    #[must_use]
    pub fn replay_config(&self) -> ReplayConfig {
        ReplayConfig {
            speed: self.replay,
            duration_limit: self.duration,
            replay_time: self.replay_time,
            line_limit: self.limit.unwrap_or(u64::MAX),
            health: self.calltime,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_DURATION;

    fn replay_args(extra: &[&str]) -> ReplayArgs {
        let mut argv = vec!["perfreplay", "replay", "-s", "http://localhost:8983/select", "-i", "t.trace"];
        argv.extend_from_slice(extra);
        match Args::try_parse_from(argv).unwrap().command {
            Command::Replay(args) => args,
            Command::Record(_) => panic!("expected replay"),
        }
    }

    #[test]
    fn test_replay_defaults() {
        let config = replay_args(&[]).replay_config();
        assert_eq!(config, ReplayConfig::default());
        assert_eq!(config.duration_limit, DEFAULT_DURATION);
    }

    #[test]
    fn test_replay_options() {
        let args = replay_args(&["-d", "30m", "-t", "10m", "-l", "500", "-c", "2s/5/50", "-r", "0", "-n"]);
        let config = args.replay_config();
        assert_eq!(config.duration_limit, Millis(30 * 60 * 1000));
        assert_eq!(config.replay_time, Millis(10 * 60 * 1000));
        assert_eq!(config.line_limit, 500);
        assert_eq!(config.health, HealthConfig { cutoff: Millis(2000), max_exceeding: 5, window_size: 50 });
        assert!(config.speed.is_full_throttle());
        assert!(args.dry_run);
    }

    #[test]
    fn test_replay_requires_service_and_input() {
        assert!(Args::try_parse_from(["perfreplay", "replay", "-i", "t.trace"]).is_err());
        assert!(Args::try_parse_from(["perfreplay", "replay", "-s", "http://x/select"]).is_err());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let base = ["perfreplay", "replay", "-s", "http://x/select", "-i", "t.trace"];
        for bad in [["-l", "0"], ["-d", "15x"], ["-c", "5s/10"], ["-r", "fast"]] {
            let argv: Vec<&str> = base.iter().chain(bad.iter()).copied().collect();
            assert!(Args::try_parse_from(argv).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_record_options() {
        let args = Args::try_parse_from([
            "perfreplay", "record", "-o", "out.trace", "--append", "-a", "solr-1", "--classifier", "mdc", "-b", "50",
            "-d", "15s", "-l", "10",
        ])
        .unwrap();
        let Command::Record(record) = args.command else {
            panic!("expected record");
        };
        assert_eq!(record.classifier, ClassifierKind::Mdc);
        assert!(record.append);
        let config = record.capture_config();
        assert_eq!(config.reorder_tolerance, 50);
        assert_eq!(config.duration_limit, Millis(15_000));
        assert_eq!(config.line_limit, 10);
        assert_eq!(config.application.as_deref(), Some("solr-1"));
    }

    #[test]
    fn test_append_requires_output() {
        assert!(Args::try_parse_from(["perfreplay", "record", "--append"]).is_err());
    }
}
