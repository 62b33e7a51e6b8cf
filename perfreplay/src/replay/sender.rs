//! Service senders: the seam between the scheduler and the system under test
//!
//! A sender performs one call and reports how long it took plus a status
//! label. Ordinary failures (HTTP 5xx, refused connections, timeouts) are a
//! label, never an error; `Err` is reserved for calls that could not be
//! attempted at all.

use async_trait::async_trait;
use log::debug;
use tokio::time::Instant;

use crate::domain::{Millis, ReplayError, SendError};

/// Status label used when the request never got an HTTP response
pub const TRANSPORT_ERROR: &str = "transport-error";

/// Status label reported by [`DryRunSender`]
pub const DRY_RUN: &str = "dry-run";

/// Result of one call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendOutcome {
    pub duration: Millis,
    pub status: String,
}

impl SendOutcome {
    pub fn new(duration: Millis, status: impl Into<String>) -> Self {
        Self { duration, status: status.into() }
    }
}

/// Performs calls against the target service; shared by all replay workers
#[async_trait]
pub trait ServiceSender: Send + Sync {
    /// Send one recorded query
    ///
    /// # Errors
    /// Only when the call cannot be attempted; the run continues either way.
    async fn send(&self, query: &str) -> Result<SendOutcome, SendError>;
}

/// Issues `GET` requests against a base URL
pub struct HttpSender {
    client: reqwest::Client,
    service: String,
}

impl HttpSender {
    /// # Errors
    /// Returns `ReplayError::SenderSetup` if `service` is not an absolute URL
    /// or the HTTP client cannot be built.
    pub fn new(service: &str) -> Result<Self, ReplayError> {
        reqwest::Url::parse(service).map_err(|e| ReplayError::SenderSetup(format!("{service}: {e}")))?;
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ReplayError::SenderSetup(e.to_string()))?;
        Ok(Self { client, service: service.to_string() })
    }

    /// URL for a recorded query
    ///
    /// A query starting with `/` is a path (suggest style) and is appended to
    /// the service URL; anything else becomes its query string.
    #[must_use]
    pub fn url_for(&self, query: &str) -> String {
        if query.starts_with('/') {
            format!("{}{query}", self.service.trim_end_matches('/'))
        } else {
            format!("{}?{query}", self.service)
        }
    }
}

#[async_trait]
impl ServiceSender for HttpSender {
    async fn send(&self, query: &str) -> Result<SendOutcome, SendError> {
        let url = self.url_for(query);
        let start = Instant::now();

        let status = match self.client.get(&url).send().await {
            Ok(response) => {
                let status = response.status().as_u16().to_string();
                // Call time covers the full body, not just the headers
                match response.bytes().await {
                    Ok(_) => status,
                    Err(e) => {
                        debug!("Reading body of {url} failed: {e}");
                        TRANSPORT_ERROR.to_string()
                    }
                }
            }
            Err(e) if e.is_builder() => return Err(SendError(format!("{url}: {e}"))),
            Err(e) => {
                debug!("Call to {url} failed: {e}");
                TRANSPORT_ERROR.to_string()
            }
        };

        Ok(SendOutcome::new(Millis::from_duration(start.elapsed()), status))
    }
}

/// Sends nothing; every call takes 0ms
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunSender;

#[async_trait]
impl ServiceSender for DryRunSender {
    async fn send(&self, query: &str) -> Result<SendOutcome, SendError> {
        debug!("dry-run: {query}");
        Ok(SendOutcome::new(Millis(0), DRY_RUN))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_for_query_string_and_path() {
        let sender = HttpSender::new("http://localhost:8983/solr/core/select").unwrap();
        assert_eq!(sender.url_for("q=a&rows=10"), "http://localhost:8983/solr/core/select?q=a&rows=10");

        let sender = HttpSender::new("http://localhost:8080/").unwrap();
        assert_eq!(sender.url_for("/suggest?q=ab"), "http://localhost:8080/suggest?q=ab");
    }

    #[test]
    fn test_rejects_relative_service() {
        assert!(matches!(HttpSender::new("localhost/select"), Err(ReplayError::SenderSetup(_))));
    }

    #[tokio::test]
    async fn test_dry_run_takes_no_time() {
        let outcome = DryRunSender.send("q=a").await.unwrap();
        assert_eq!(outcome, SendOutcome::new(Millis(0), DRY_RUN));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_a_status_not_an_error() {
        // Port 9 (discard) is closed on any sane test host
        let sender = HttpSender::new("http://127.0.0.1:9/select").unwrap();
        let outcome = sender.send("q=a").await.unwrap();
        assert_eq!(outcome.status, TRANSPORT_ERROR);
    }
}
