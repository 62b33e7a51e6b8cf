//! Raw log line → [`CapturedEvent`] classification
//!
//! The rules deciding which requests are worth replaying are business logic
//! and differ per target service, so classification sits behind the
//! [`Classifier`] trait. Two classifiers ship with the tool:
//!
//! - [`SolrLogClassifier`] - SolR request logs (`path=/select params={...}`)
//! - [`MdcRequestClassifier`] - services logging the request in their MDC map
//!
//! A classifier returns `Ok(None)` for a well-formed line that should not be
//! recorded, and `Err` for a line it cannot parse at all. The capture session
//! skips both; only the log level differs.

use chrono::{DateTime, Utc};
use log::debug;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use perfreplay_common::REPLAY_MARKER;
use serde_json::Value as JsonValue;

use super::CapturedEvent;
use crate::domain::ClassifyError;

/// Characters escaped when a recorded query is made URI-safe.
///
/// Mirrors JavaScript's `encodeURI` except that `%` is left alone: SolR logs
/// the already-encoded query string and encoding it again would change the
/// request being replayed.
const URI_UNSAFE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Turns one raw log line into a replayable event, or rejects it
pub trait Classifier {
    /// Classify a raw line
    ///
    /// # Errors
    /// Returns a `ClassifyError` if the line is malformed.
    fn classify(&self, line: &str) -> Result<Option<CapturedEvent>, ClassifyError>;
}

impl<F> Classifier for F
where
    F: Fn(&str) -> Result<Option<CapturedEvent>, ClassifyError>,
{
    fn classify(&self, line: &str) -> Result<Option<CapturedEvent>, ClassifyError> {
        self(line)
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, ClassifyError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|_| ClassifyError::InvalidTimestamp(raw.to_string()))
}

fn str_field<'a>(json: &'a JsonValue, name: &'static str) -> Result<&'a str, ClassifyError> {
    json.get(name).and_then(JsonValue::as_str).ok_or(ClassifyError::MissingField(name))
}

// =============================================================================
// SOLR REQUEST LOG
// =============================================================================

/// Classifier for SolR request log lines
///
/// Expects a JSON object with `timestamp`, `app` and `message`, where the
/// message holds whitespace separated `key=value` pairs:
///
/// ```text
/// {"timestamp":"2019-06-14T09:56:50.076+00:00","app":"solr-1",
///  "message":"webapp=/solr path=/select params={q=*:*&rows=10} hits=3 status=0 QTime=1"}
/// ```
///
/// Only `/select` requests are kept. Sub-queries of a distributed request
/// (`distrib=false`) and requests already carrying the replay marker are
/// rejected, the `trackingId` parameter is dropped and the replay marker is
/// appended.
#[derive(Debug, Default, Clone, Copy)]
pub struct SolrLogClassifier;

impl SolrLogClassifier {
    /// Build the replayable query from a `params={...}` value, or reject it
    fn query_from_params(params: &str) -> Option<String> {
        let query_string = params.strip_prefix('{').unwrap_or(params);
        let query_string = query_string.strip_suffix('}').unwrap_or(query_string);
        if query_string.is_empty() {
            return None;
        }

        let matcher = format!("&{query_string}&");
        if matcher.contains("&distrib=false&") || matcher.contains(&format!("&{REPLAY_MARKER}&")) {
            debug!("filtered: {query_string}");
            return None;
        }

        let mut kept = Vec::new();
        let mut tracking_removed = false;
        for param in query_string.split('&') {
            if !tracking_removed && param.starts_with("trackingId=") {
                tracking_removed = true;
                continue;
            }
            kept.push(param);
        }
        kept.push(REPLAY_MARKER);
        let query = kept.join("&");

        // Block-join queries are logged unencoded and must stay that way
        if query.contains("child+of") {
            Some(query)
        } else {
            Some(utf8_percent_encode(&query, URI_UNSAFE).to_string())
        }
    }
}

impl Classifier for SolrLogClassifier {
    fn classify(&self, line: &str) -> Result<Option<CapturedEvent>, ClassifyError> {
        let json: JsonValue = serde_json::from_str(line)?;
        let timestamp = str_field(&json, "timestamp")?;
        let message = str_field(&json, "message")?;
        let app = json.get("app").and_then(JsonValue::as_str).unwrap_or_default();

        let mut path = None;
        let mut params = None;
        for part in message.split_whitespace() {
            match part.split_once('=') {
                Some(("path", value)) => path = Some(value),
                Some(("params", value)) => params = Some(value),
                _ => {}
            }
        }

        if path != Some("/select") {
            debug!("path not select: {path:?}");
            return Ok(None);
        }
        let Some(query) = params.and_then(Self::query_from_params) else {
            return Ok(None);
        };

        let timestamp = parse_timestamp(timestamp)?;
        Ok(Some(CapturedEvent::new(timestamp, app, query)))
    }
}

// =============================================================================
// MDC REQUEST LOG
// =============================================================================

/// Classifier for services that log each request's parameters in the MDC
///
/// ```text
/// {"@timestamp":"2019-08-27T07:03:44.692+00:00","message":"...",
///  "mdc":{"requestType":"search","query":"london","field":"","rows":"10"}}
/// ```
///
/// Produces `/<requestType>?query=<query>` for `suggest` and `search`
/// requests; search requests also carry `field` and `rows` when logged.
#[derive(Debug, Default, Clone, Copy)]
pub struct MdcRequestClassifier;

impl Classifier for MdcRequestClassifier {
    fn classify(&self, line: &str) -> Result<Option<CapturedEvent>, ClassifyError> {
        let json: JsonValue = serde_json::from_str(line)?;
        let timestamp = json
            .get("@timestamp")
            .or_else(|| json.get("timestamp"))
            .and_then(JsonValue::as_str)
            .ok_or(ClassifyError::MissingField("@timestamp"))?;

        let Some(mdc) = json.get("mdc").and_then(JsonValue::as_object) else {
            debug!("no mdc in line");
            return Ok(None);
        };
        let Some(request_type) = mdc.get("requestType").and_then(JsonValue::as_str) else {
            debug!("not a request");
            return Ok(None);
        };
        let Some(query) = mdc.get("query").and_then(JsonValue::as_str) else {
            debug!("request is missing query");
            return Ok(None);
        };

        let mut constructed =
            format!("/{request_type}?query={}", utf8_percent_encode(query, URI_UNSAFE));
        match request_type {
            "suggest" => {}
            "search" => {
                if let Some(field) = mdc.get("field").and_then(JsonValue::as_str) {
                    constructed.push_str("&field=");
                    constructed.push_str(field);
                }
                if let Some(rows) = mdc.get("rows").and_then(JsonValue::as_str) {
                    constructed.push_str("&rows=");
                    constructed.push_str(rows);
                }
            }
            other => {
                debug!("unknown requestType: {other}");
                return Ok(None);
            }
        }

        let timestamp = parse_timestamp(timestamp)?;
        Ok(Some(CapturedEvent::new(timestamp, "", constructed)))
    }
}
