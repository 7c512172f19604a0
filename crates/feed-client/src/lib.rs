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

//! Live status feed client for CultureHub dataset administration.
//!
//! A dataset import runs on the server for a long time, moving through
//! `queued`, `parsing` and `processing` before it ends up `enabled` or in
//! `error`. This crate follows those updates over a WebSocket feed and keeps
//! the session alive. It is split into layers that can be used on their own:
//!
//! - **Supervisor**: connection state machine with a bounded reconnect budget,
//!   plus the background task that drives it over a transport
//! - **Keep-alive**: periodic pings over the HTTP command endpoint with a
//!   consecutive-failure threshold
//! - **Status**: mapping of server job states to badge classes
//!
//! # Quick Start
//!
//! ```no_run
//! use feed_client::{ClientConfig, FeedClient, FeedEndpoint, FeedEvent};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let endpoint = FeedEndpoint::new("http://localhost:9000", "delving", None)?;
//!     let mut client = FeedClient::connect(ClientConfig::new(endpoint))?;
//!     println!("session {}", client.correlation_id());
//!
//!     while let Some(event) = client.recv().await {
//!         if let FeedEvent::Message(payload) = &event {
//!             println!("{payload}");
//!         }
//!         if event.is_fatal() {
//!             break;
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Status labels
//!
//! ```
//! use feed_client::status::{badge_class, map_status};
//!
//! assert_eq!(map_status(Some("processing")), "processing");
//! assert_eq!(map_status(Some("bogus")), "");
//! assert_eq!(badge_class(Some("error")), "badge-error");
//! ```

pub mod correlation;
pub mod endpoint;
pub mod error;
pub mod event;
pub mod keepalive;
pub mod status;
pub mod supervisor;
pub mod transport;

use std::sync::Arc;

use log::info;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

pub use correlation::CorrelationId;
pub use endpoint::FeedEndpoint;
pub use error::{EndpointError, FeedError, KeepAliveError, TransportError};
pub use event::FeedEvent;
pub use keepalive::{HttpPinger, KeepAlive, KeepAliveConfig, KeepAliveTask, PingSender};
pub use status::{badge_class, map_status, JobStatus};
pub use supervisor::{
    ConnectionAlert, ConnectionStatus, Connection, Supervisor, SupervisorConfig, SupervisorState,
};
pub use transport::{FeedSocket, Transport, WsTransport};

/// Configuration for the full-stack client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Where the feed and command endpoints live.
    pub endpoint: FeedEndpoint,
    /// Reconnect policy for the feed socket.
    pub supervisor: SupervisorConfig,
    /// Keep-alive timing.
    pub keep_alive: KeepAliveConfig,
    /// Event channel buffer size.
    pub buffer_size: usize,
}

impl ClientConfig {
    #[must_use]
    pub fn new(endpoint: FeedEndpoint) -> Self {
        Self {
            endpoint,
            supervisor: SupervisorConfig::default(),
            keep_alive: KeepAliveConfig::default(),
            buffer_size: 256,
        }
    }
}

/// Full-stack feed client.
///
/// Owns one supervised feed connection and one keep-alive loop for a freshly
/// generated correlation id. Both stop on [`FeedClient::shutdown`] or drop.
pub struct FeedClient {
    id: CorrelationId,
    events: mpsc::Receiver<FeedEvent>,
    connection: Connection,
    keep_alive: KeepAliveTask,
    cancel_token: CancellationToken,
}

impl std::fmt::Debug for FeedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedClient")
            .field("id", &self.id)
            .field("connection", &self.connection)
            .finish_non_exhaustive()
    }
}

impl FeedClient {
    /// Connect over WebSocket and ping over HTTP.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn connect(config: ClientConfig) -> Result<Self, FeedError> {
        let pinger =
            HttpPinger::new(config.keep_alive.request_timeout).map_err(FeedError::HttpClient)?;
        Self::connect_with(config, Arc::new(WsTransport), Arc::new(pinger))
    }

    /// Connect with caller-supplied transport and pinger.
    pub fn connect_with(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        pinger: Arc<dyn PingSender>,
    ) -> Result<Self, FeedError> {
        let id = CorrelationId::generate();
        let feed_url = config.endpoint.feed_url(id)?;
        let command_url = config.endpoint.command_url(id)?;

        let (event_tx, events) = mpsc::channel(config.buffer_size.max(1));
        let cancel_token = CancellationToken::new();

        info!("[{}] Starting feed session for organization '{}'", id, config.endpoint.org_id());

        let connection = Connection::spawn(
            transport,
            feed_url,
            Supervisor::new(id, config.supervisor),
            event_tx.clone(),
            cancel_token.child_token(),
        );
        let keep_alive = KeepAliveTask::spawn(
            pinger,
            command_url,
            KeepAlive::new(id, config.keep_alive.max_failures),
            config.keep_alive.interval,
            event_tx,
            cancel_token.child_token(),
        );

        Ok(Self {
            id,
            events,
            connection,
            keep_alive,
            cancel_token,
        })
    }

    #[must_use]
    pub fn correlation_id(&self) -> CorrelationId {
        self.id
    }

    /// Receive the next event.
    ///
    /// Returns `None` once both the connection and keep-alive loops ended.
    pub async fn recv(&mut self) -> Option<FeedEvent> {
        self.events.recv().await
    }

    /// Latest connection snapshot.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.connection.status()
    }

    /// Watch connection snapshots.
    #[must_use]
    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.connection.subscribe()
    }

    /// Whether the keep-alive loop is still pinging.
    #[must_use]
    pub fn keep_alive_running(&self) -> bool {
        !self.keep_alive.is_finished()
    }

    /// Stop both the connection and the keep-alive loop.
    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }
}

impl Drop for FeedClient {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use url::Url;

    struct RefusingTransport;

    #[async_trait]
    impl Transport for RefusingTransport {
        async fn open(&self, _url: &Url) -> Result<Box<dyn FeedSocket>, TransportError> {
            Err(TransportError::Connect("refused".to_string()))
        }
    }

    #[derive(Default)]
    struct CountingPinger {
        seen: std::sync::Mutex<Vec<String>>,
        calls: AtomicU32,
    }

    #[async_trait]
    impl PingSender for CountingPinger {
        async fn ping(&self, url: &Url) -> Result<(), KeepAliveError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(url.to_string());
            Ok(())
        }
    }

    fn config() -> ClientConfig {
        let endpoint = FeedEndpoint::new("http://localhost:9000", "delving", None).unwrap();
        let mut config = ClientConfig::new(endpoint);
        config.supervisor.max_retries = 1;
        config
    }

    #[tokio::test(start_paused = true)]
    async fn test_channels_share_only_the_correlation_id() {
        let pinger = Arc::new(CountingPinger::default());
        let mut client = FeedClient::connect_with(
            config(),
            Arc::new(RefusingTransport),
            Arc::clone(&pinger) as Arc<dyn PingSender>,
        )
        .unwrap();

        let mut fatal = Vec::new();
        while let Some(event) = client.recv().await {
            if event.is_fatal() {
                fatal.push(event);
                break;
            }
        }
        assert_eq!(fatal, vec![FeedEvent::ReloadRequired]);
        assert_eq!(client.status().state, SupervisorState::Disconnected);

        // The socket giving up does not stop the keep-alive channel.
        assert!(client.keep_alive_running());
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(pinger.calls.load(Ordering::SeqCst) >= 1);

        let expected = format!(
            "http://localhost:9000/admin/dataset/command?clientId={}",
            client.correlation_id()
        );
        assert!(pinger.seen.lock().unwrap().iter().all(|u| *u == expected));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_ends_event_stream() {
        let mut client = FeedClient::connect_with(
            config(),
            Arc::new(RefusingTransport),
            Arc::new(CountingPinger::default()),
        )
        .unwrap();

        client.shutdown();
        while client.recv().await.is_some() {}
        assert!(!client.keep_alive_running());
    }
}
