use std::collections::BTreeMap;
use std::io::Write;

use serde::Serialize;

use perfreplay_common::RunStatusCode;

use crate::config::ReplayConfig;
use crate::domain::ReplayError;
use crate::replay::{CallRecord, CallStat, ReplayOutcome};

/// Final status block of the report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportStatus {
    /// Process exit status of the run
    pub code: i32,
    /// Symbolic form of `code`, e.g. `CALLTIME_EXCEEDED`
    pub name: RunStatusCode,
    pub message: String,
}

/// JSON run report
///
/// `percentiles` is absent under full throttle.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    configuration: BTreeMap<String, String>,
    loglines: Vec<CallRecord>,
    counter: BTreeMap<String, u64>,
    #[serde(rename = "callStat")]
    call_stat: CallStat,
    #[serde(skip_serializing_if = "Option::is_none")]
    percentiles: Option<BTreeMap<String, f64>>,
    status: ReportStatus,
}

impl RunReport {
    #[must_use]
    pub fn new(config: &ReplayConfig, outcome: &ReplayOutcome) -> Self {
        let stats = &outcome.statistics;
        Self {
            configuration: config.effective_settings(),
            loglines: stats.records.clone(),
            counter: stats.counter.clone(),
            call_stat: stats.call_stat,
            percentiles: stats.percentiles.clone(),
            status: ReportStatus {
                code: outcome.status.code.code(),
                name: outcome.status.code,
                message: outcome.status.message.clone(),
            },
        }
    }

    #[must_use]
    pub fn status(&self) -> &ReportStatus {
        &self.status
    }

    /// Write the report as pretty-printed JSON to any writer
    ///
    /// # Errors
    /// Returns `ReplayError::Json` if serialization or the write fails.
    pub fn export<W: Write>(&self, writer: W) -> Result<(), ReplayError> {
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SpeedFactor;
    use crate::replay::{RunStatistics, RunStatus};
    use std::time::Duration;

    fn outcome(full_throttle: bool, status: RunStatus) -> ReplayOutcome {
        let stats = RunStatistics::new(full_throttle);
        stats.record_call(CallRecord::new(0, 0, "q=a").completed(40, "200"));
        stats.record_call(CallRecord::new(1000, 1000, "q=b").completed(60, "200"));
        stats.record_call(CallRecord::new(2000, 1000, "q=c").completed(500, "500"));
        ReplayOutcome {
            status,
            statistics: stats.report(),
            lines_read: 3,
            dispatched: 3,
            abandoned: 0,
            elapsed: Duration::from_millis(2500),
        }
    }

    fn to_json(report: &RunReport) -> serde_json::Value {
        let mut buffer = Vec::new();
        report.export(&mut buffer).unwrap();
        serde_json::from_slice(&buffer).unwrap()
    }

    #[test]
    fn test_report_shape() {
        let config = ReplayConfig::default();
        let json = to_json(&RunReport::new(&config, &outcome(false, RunStatus::ok())));

        assert_eq!(json["configuration"]["replay"], "100");
        assert_eq!(json["configuration"]["callConstraint"], "5000/10/100");
        assert_eq!(json["counter"]["200"], 2);
        assert_eq!(json["counter"]["500"], 1);
        assert_eq!(json["callStat"]["count"], 3);
        assert_eq!(json["callStat"]["sum"], 600);
        assert_eq!(json["percentiles"]["percentile 50"], 60.0);
        assert_eq!(json["status"]["code"], 0);
        assert_eq!(json["status"]["message"], "OK");

        let first = &json["loglines"][0];
        assert_eq!(first["originalTimeDelta"], 0);
        assert_eq!(first["callDelay"], 0);
        assert_eq!(first["callDuration"], 40);
        assert_eq!(first["query"], "q=a");
        assert_eq!(first["status"], "200");
        assert!(first["timestamp"].is_i64());
    }

    #[test]
    fn test_full_throttle_omits_percentiles() {
        let config = ReplayConfig { speed: SpeedFactor::FULL_THROTTLE, ..ReplayConfig::default() };
        let json = to_json(&RunReport::new(&config, &outcome(true, RunStatus::ok())));
        assert!(json.get("percentiles").is_none());
        assert_eq!(json["configuration"]["replay"], "0");
    }

    #[test]
    fn test_status_code_follows_outcome() {
        let status = RunStatus::maxlines_exceeded(3);
        let report = RunReport::new(&ReplayConfig::default(), &outcome(false, status));
        assert_eq!(report.status().code, 52);
        assert_eq!(to_json(&report)["status"]["name"], "MAXLINES_EXCEEDED");
        assert_eq!(to_json(&report)["status"]["message"], "Max number of lines exceeded (3 lines)");
    }
}
