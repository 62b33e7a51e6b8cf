//! Structured events produced by a [`Classifier`](super::Classifier)

use chrono::{DateTime, Utc};

/// One accepted request from the live log stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedEvent {
    pub timestamp: DateTime<Utc>,
    /// Application tag of the emitting service instance
    pub application: String,
    /// Query exactly as it should be re-issued
    pub query: String,
}

impl CapturedEvent {
    #[must_use]
    pub fn new(timestamp: DateTime<Utc>, application: impl Into<String>, query: impl Into<String>) -> Self {
        Self { timestamp, application: application.into(), query: query.into() }
    }

    /// Milliseconds from `origin` to this event, clamped at zero
    #[must_use]
    pub fn offset_from(&self, origin: DateTime<Utc>) -> u64 {
        let millis = (self.timestamp - origin).num_milliseconds();
        u64::try_from(millis).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_offset_clamps_events_before_origin() {
        let origin = Utc.with_ymd_and_hms(2019, 6, 14, 9, 56, 50).unwrap();
        let late = CapturedEvent::new(origin + chrono::Duration::milliseconds(1250), "solr", "q=a");
        let early = CapturedEvent::new(origin - chrono::Duration::milliseconds(300), "solr", "q=b");

        assert_eq!(late.offset_from(origin), 1250);
        assert_eq!(early.offset_from(origin), 0);
    }
}
