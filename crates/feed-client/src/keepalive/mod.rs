// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Keep-alive pings over the dataset command endpoint.
//!
//! The pinger runs independently of the feed socket. It shares only the
//! correlation id with the supervisor and keeps its own failure counter.
//! After `max_failures` consecutive failures it raises one fatal event and
//! stops; recovering the socket is the supervisor's job.

mod task;

pub use task::KeepAliveTask;

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use url::Url;

use crate::correlation::CorrelationId;
use crate::error::KeepAliveError;

/// Keep-alive timing and failure threshold.
#[derive(Debug, Clone)]
pub struct KeepAliveConfig {
    /// Time between pings. The first ping fires one interval after start.
    pub interval: Duration,
    /// Consecutive failures that end the session.
    pub max_failures: u32,
    /// Per-request timeout for the HTTP pinger.
    pub request_timeout: Duration,
}

impl Default for KeepAliveConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_failures: 3,
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Result of recording a failed ping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingOutcome {
    /// Below the threshold.
    Missed { consecutive: u32 },
    /// This failure reached the threshold.
    Fatal,
    /// The threshold was already reached earlier.
    Exhausted,
}

/// Keep-alive failure counter for one session.
#[derive(Debug, Clone)]
pub struct KeepAlive {
    id: CorrelationId,
    max_failures: u32,
    failures: u32,
    exhausted: bool,
}

impl KeepAlive {
    #[must_use]
    pub fn new(id: CorrelationId, max_failures: u32) -> Self {
        Self {
            id,
            max_failures: max_failures.max(1),
            failures: 0,
            exhausted: false,
        }
    }

    #[must_use]
    pub fn correlation_id(&self) -> CorrelationId {
        self.id
    }

    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.failures
    }

    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Reset the failure run. Returns `true` when this success ends a run
    /// of missed pings.
    pub fn record_success(&mut self) -> bool {
        let recovered = self.failures > 0 && !self.exhausted;
        self.failures = 0;
        recovered
    }

    pub fn record_failure(&mut self) -> PingOutcome {
        if self.exhausted {
            return PingOutcome::Exhausted;
        }
        self.failures += 1;
        if self.failures >= self.max_failures {
            self.exhausted = true;
            PingOutcome::Fatal
        } else {
            PingOutcome::Missed {
                consecutive: self.failures,
            }
        }
    }
}

/// Sends one keep-alive ping.
#[async_trait]
pub trait PingSender: Send + Sync {
    async fn ping(&self, url: &Url) -> Result<(), KeepAliveError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Command<'a> {
    event_type: &'a str,
}

/// Pinger posting `{"eventType":"ping"}` to the command endpoint.
#[derive(Debug, Clone)]
pub struct HttpPinger {
    client: reqwest::Client,
}

impl HttpPinger {
    pub fn new(request_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PingSender for HttpPinger {
    async fn ping(&self, url: &Url) -> Result<(), KeepAliveError> {
        let response = self
            .client
            .post(url.clone())
            .json(&Command { event_type: "ping" })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(KeepAliveError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        serde_json::from_slice::<serde_json::Value>(&body)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn keep_alive(max_failures: u32) -> KeepAlive {
        KeepAlive::new(CorrelationId::from_raw(9), max_failures)
    }

    #[test]
    fn test_success_resets_failures() {
        let mut ka = keep_alive(3);
        assert_eq!(ka.record_failure(), PingOutcome::Missed { consecutive: 1 });
        assert_eq!(ka.record_failure(), PingOutcome::Missed { consecutive: 2 });
        assert!(ka.record_success());
        assert_eq!(ka.consecutive_failures(), 0);
        assert!(!ka.record_success());
        assert_eq!(ka.record_failure(), PingOutcome::Missed { consecutive: 1 });
    }

    #[test]
    fn test_threshold_fires_once() {
        let mut ka = keep_alive(3);
        ka.record_failure();
        ka.record_failure();
        assert_eq!(ka.record_failure(), PingOutcome::Fatal);
        assert!(ka.is_exhausted());
        for _ in 0..5 {
            assert_eq!(ka.record_failure(), PingOutcome::Exhausted);
        }
    }

    #[test]
    fn test_fatal_is_latched_across_success() {
        let mut ka = keep_alive(1);
        assert_eq!(ka.record_failure(), PingOutcome::Fatal);
        assert!(!ka.record_success());
        assert_eq!(ka.record_failure(), PingOutcome::Exhausted);
    }

    #[test]
    fn test_zero_threshold_treated_as_one() {
        let mut ka = keep_alive(0);
        assert_eq!(ka.record_failure(), PingOutcome::Fatal);
    }

    #[tokio::test]
    async fn test_http_pinger_posts_ping_event() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/admin/dataset/command"))
            .and(query_param("clientId", "9"))
            .and(body_json(serde_json::json!({ "eventType": "ping" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/admin/dataset/command?clientId=9", server.uri())).unwrap();
        let pinger = HttpPinger::new(Duration::from_secs(5)).unwrap();

        pinger.ping(&url).await.expect("ping ok");
    }

    #[tokio::test]
    async fn test_http_pinger_fails_on_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/admin/dataset/command", server.uri())).unwrap();
        let pinger = HttpPinger::new(Duration::from_secs(5)).unwrap();

        let err = pinger.ping(&url).await.unwrap_err();
        assert!(matches!(err, KeepAliveError::Status(503)));
    }

    #[tokio::test]
    async fn test_http_pinger_requires_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("pong"))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/admin/dataset/command", server.uri())).unwrap();
        let pinger = HttpPinger::new(Duration::from_secs(5)).unwrap();

        let err = pinger.ping(&url).await.unwrap_err();
        assert!(matches!(err, KeepAliveError::Decode(_)));
    }
}
