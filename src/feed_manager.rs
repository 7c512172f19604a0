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

use feed_client::{FeedClient, HttpPinger, PingSender, Transport, WsTransport};
use log::{info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::{AppConfig, FeedConfig};
use crate::status::SharedMonitorStatus;

/// Transport and pinger shared by every feed
#[derive(Clone)]
struct Connector {
    transport: Arc<dyn Transport>,
    pinger: Arc<dyn PingSender>,
}

/// A single configured feed and its running session, if any
struct FeedConnection {
    config: FeedConfig,

    /// Cancels the event pump, which shuts the client down
    cancel_token: Option<CancellationToken>,
}

impl FeedConnection {
    fn new(config: FeedConfig) -> Self {
        Self {
            config,
            cancel_token: None,
        }
    }

    fn is_running(&self) -> bool {
        self.cancel_token.is_some()
    }

    /// Start the feed client and its event pump
    fn start(&mut self, connector: &Connector, app: &AppConfig, status: &SharedMonitorStatus) {
        if self.is_running() {
            return;
        }

        let feed_id = self.config.id.clone();
        if let Ok(mut s) = status.lock() {
            s.register_feed(feed_id.clone(), self.config.name.clone());
        }

        let client = self
            .config
            .to_client_config(app)
            .map_err(|e| e.to_string())
            .and_then(|config| {
                FeedClient::connect_with(
                    config,
                    Arc::clone(&connector.transport),
                    Arc::clone(&connector.pinger),
                )
                .map_err(|e| e.to_string())
            });

        let mut client = match client {
            Ok(client) => client,
            Err(e) => {
                warn!("[{}] Failed to start feed: {}", self.config.name, e);
                if let Ok(mut s) = status.lock() {
                    s.record_start_failure(&feed_id, &e);
                }
                return;
            }
        };

        info!(
            "[{}] Starting feed for organization '{}' (client {})",
            self.config.name,
            self.config.org_id,
            client.correlation_id()
        );
        if let Ok(mut s) = status.lock() {
            s.set_client_id(&feed_id, client.correlation_id().value());
        }

        let cancel_token = CancellationToken::new();
        let pump_cancel = cancel_token.clone();
        let pump_status = Arc::clone(status);
        let feed_name = self.config.name.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;

                    () = pump_cancel.cancelled() => {
                        client.shutdown();
                        break;
                    }
                    event = client.recv() => {
                        let Some(event) = event else { break };
                        if let Ok(mut s) = pump_status.lock() {
                            // A replacement may already own this feed id.
                            if pump_cancel.is_cancelled() {
                                continue;
                            }
                            s.apply_event(&feed_id, &event);
                        }
                        // A fatal notification means the session is over; stop
                        // the other channel too and drain what is left.
                        if event.is_fatal() {
                            client.shutdown();
                        }
                    }
                }
            }
            info!("[{}] Feed session ended", feed_name);
        });

        self.cancel_token = Some(cancel_token);
    }

    /// Stop the feed session gracefully
    fn stop(&mut self, status: &SharedMonitorStatus) {
        if let Some(token) = self.cancel_token.take() {
            info!("[{}] Stopping feed", self.config.name);
            token.cancel();
        }
        if let Ok(mut s) = status.lock() {
            s.unregister_feed(&self.config.id);
        }
    }
}

/// Manages multiple dataset feeds with independent lifecycle control
pub struct FeedManager {
    /// Configured feeds (keyed by feed id)
    connections: HashMap<String, FeedConnection>,

    /// Monitor status shared with the renderer
    status: SharedMonitorStatus,

    /// Tuning applied to every feed
    app: AppConfig,

    connector: Connector,
}

impl std::fmt::Debug for FeedManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedManager")
            .field("feeds", &self.connections.len())
            .finish_non_exhaustive()
    }
}

impl FeedManager {
    /// Create a manager using WebSocket feeds and HTTP keep-alive
    pub fn new(status: SharedMonitorStatus, app: &AppConfig) -> Result<Self, feed_client::FeedError> {
        let pinger = HttpPinger::new(app.keep_alive_config().request_timeout)
            .map_err(feed_client::FeedError::HttpClient)?;
        Ok(Self::with_connector(
            status,
            app,
            Arc::new(WsTransport),
            Arc::new(pinger),
        ))
    }

    /// Create a manager with a custom transport and pinger
    pub fn with_connector(
        status: SharedMonitorStatus,
        app: &AppConfig,
        transport: Arc<dyn Transport>,
        pinger: Arc<dyn PingSender>,
    ) -> Self {
        Self {
            connections: HashMap::new(),
            status,
            app: app.clone(),
            connector: Connector { transport, pinger },
        }
    }

    /// Add a feed, starting it if enabled
    pub fn add_feed(&mut self, config: FeedConfig) {
        info!(
            "Adding feed '{}' ({}) - enabled: {}",
            config.name, config.base_url, config.enabled
        );

        if let Some(mut previous) = self.connections.remove(&config.id) {
            warn!("Replacing feed '{}' with the same id", previous.config.name);
            previous.stop(&self.status);
        }

        let feed_id = config.id.clone();
        let mut connection = FeedConnection::new(config);
        if connection.config.enabled {
            connection.start(&self.connector, &self.app, &self.status);
        }
        self.connections.insert(feed_id, connection);
    }

    /// Remove a feed
    #[allow(dead_code)]
    pub fn remove_feed(&mut self, feed_id: &str) {
        if let Some(mut connection) = self.connections.remove(feed_id) {
            info!("Removing feed '{}'", connection.config.name);
            connection.stop(&self.status);
        } else {
            warn!("Attempted to remove non-existent feed: {}", feed_id);
        }
    }

    /// Enable a feed (start its session)
    #[allow(dead_code)]
    pub fn enable_feed(&mut self, feed_id: &str) {
        if let Some(connection) = self.connections.get_mut(feed_id) {
            if !connection.config.enabled {
                info!("Enabling feed '{}'", connection.config.name);
                connection.config.enabled = true;
                connection.start(&self.connector, &self.app, &self.status);
            }
        } else {
            warn!("Attempted to enable non-existent feed: {}", feed_id);
        }
    }

    /// Disable a feed (stop its session, keep config)
    #[allow(dead_code)]
    pub fn disable_feed(&mut self, feed_id: &str) {
        if let Some(connection) = self.connections.get_mut(feed_id) {
            if connection.config.enabled {
                info!("Disabling feed '{}'", connection.config.name);
                connection.config.enabled = false;
                connection.stop(&self.status);
            }
        } else {
            warn!("Attempted to disable non-existent feed: {}", feed_id);
        }
    }

    /// Get the number of managed feeds
    #[allow(dead_code)]
    pub fn feed_count(&self) -> usize {
        self.connections.len()
    }

    /// Get the number of feeds with a running session
    pub fn active_feed_count(&self) -> usize {
        self.connections.values().filter(|c| c.is_running()).count()
    }

    /// Stop every feed session
    pub fn shutdown_all(&mut self) {
        for connection in self.connections.values_mut() {
            connection.stop(&self.status);
        }
    }
}

impl Drop for FeedManager {
    fn drop(&mut self) {
        info!("Shutting down FeedManager - stopping all feeds");
        self.shutdown_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::MonitorStatus;
    use async_trait::async_trait;
    use feed_client::{FeedSocket, KeepAliveError, SupervisorState, TransportError};
    use std::sync::Mutex;
    use std::time::Duration;
    use url::Url;

    struct RefusingTransport;

    #[async_trait]
    impl Transport for RefusingTransport {
        async fn open(&self, _url: &Url) -> Result<Box<dyn FeedSocket>, TransportError> {
            Err(TransportError::Connect("refused".to_string()))
        }
    }

    struct OkPinger;

    #[async_trait]
    impl PingSender for OkPinger {
        async fn ping(&self, _url: &Url) -> Result<(), KeepAliveError> {
            Ok(())
        }
    }

    fn manager(app: &AppConfig) -> (FeedManager, SharedMonitorStatus) {
        let status: SharedMonitorStatus = Arc::new(Mutex::new(MonitorStatus::new()));
        let manager = FeedManager::with_connector(
            Arc::clone(&status),
            app,
            Arc::new(RefusingTransport),
            Arc::new(OkPinger),
        );
        (manager, status)
    }

    async fn wait_until(mut done: impl FnMut() -> bool) -> bool {
        for _ in 0..200 {
            if done() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        false
    }

    #[tokio::test(start_paused = true)]
    async fn test_enabled_feed_runs_until_budget_exhausted() {
        let mut app = AppConfig::default();
        app.max_retries = 1;
        let (mut manager, status) = manager(&app);

        let feed = FeedConfig::default_local();
        let feed_id = feed.id.clone();
        manager.add_feed(feed);
        assert_eq!(manager.active_feed_count(), 1);

        assert!(wait_until(|| status.lock().unwrap().all_terminated()).await);

        let s = status.lock().unwrap();
        let feed = s.get_feed_status(&feed_id).unwrap();
        assert_eq!(feed.state, SupervisorState::Disconnected);
        assert_eq!(feed.reconnect_attempt, 1);
        assert!(feed.client_id.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_feed_is_not_started() {
        let (mut manager, status) = manager(&AppConfig::default());

        let mut feed = FeedConfig::default_local();
        feed.enabled = false;
        let feed_id = feed.id.clone();
        manager.add_feed(feed);

        assert_eq!(manager.feed_count(), 1);
        assert_eq!(manager.active_feed_count(), 0);
        assert!(status.lock().unwrap().get_feed_status(&feed_id).is_none());

        manager.enable_feed(&feed_id);
        assert_eq!(manager.active_feed_count(), 1);
        assert!(status.lock().unwrap().get_feed_status(&feed_id).is_some());

        manager.disable_feed(&feed_id);
        assert_eq!(manager.active_feed_count(), 0);
        assert!(status.lock().unwrap().get_feed_status(&feed_id).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_bad_feed_config_is_reported() {
        let (mut manager, status) = manager(&AppConfig::default());

        let mut feed = FeedConfig::default_local();
        feed.base_url = "gopher://nowhere".to_string();
        let feed_id = feed.id.clone();
        manager.add_feed(feed);

        assert_eq!(manager.active_feed_count(), 0);
        let s = status.lock().unwrap();
        assert!(s.get_feed_status(&feed_id).unwrap().is_terminated());
        assert!(s.diagnostics.back().unwrap().message.contains("Failed to start"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_replacing_feed_stops_previous_session() {
        let mut app = AppConfig::default();
        app.max_retries = 1;
        let (mut manager, status) = manager(&app);

        let first = FeedConfig::default_local();
        let feed_id = first.id.clone();
        manager.add_feed(first.clone());
        let first_client = status.lock().unwrap().get_feed_status(&feed_id).unwrap().client_id;

        let mut second = first;
        second.name = "Replacement".to_string();
        manager.add_feed(second);
        assert_eq!(manager.feed_count(), 1);
        assert_eq!(manager.active_feed_count(), 1);

        assert!(wait_until(|| status.lock().unwrap().all_terminated()).await);

        let s = status.lock().unwrap();
        let feed = s.get_feed_status(&feed_id).unwrap();
        assert_eq!(feed.feed_name, "Replacement");
        assert_ne!(feed.client_id, first_client);
        let gave_up = s
            .diagnostics
            .iter()
            .filter(|d| d.message.contains("Reconnect budget exhausted"))
            .count();
        assert_eq!(gave_up, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_feed() {
        let (mut manager, status) = manager(&AppConfig::default());
        let feed = FeedConfig::default_local();
        let feed_id = feed.id.clone();
        manager.add_feed(feed);

        manager.remove_feed(&feed_id);
        assert_eq!(manager.feed_count(), 0);
        assert!(status.lock().unwrap().feeds.is_empty());
    }
}
