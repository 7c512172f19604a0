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

use chrono::{DateTime, Utc};
use feed_client::{ConnectionAlert, FeedEvent, SupervisorState};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use crate::dataset::{parse_updates, DataSetUpdate};

/// Diagnostic message with timestamp
#[derive(Debug, Clone)]
pub struct DiagnosticMessage {
    pub timestamp: DateTime<Utc>,
    pub level: DiagnosticLevel,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticLevel {
    Info,
    Warning,
    Error,
}

/// Keep-alive health of a feed session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepAliveHealth {
    Healthy,
    Missed(u32),
    Exhausted,
}

/// Latest known state of one dataset
#[derive(Debug, Clone)]
pub struct DataSetRow {
    pub update: DataSetUpdate,
    pub updated_at: DateTime<Utc>,
}

/// Per-feed connection status and statistics
#[derive(Debug, Clone)]
pub struct FeedStatus {
    /// Feed display name
    pub feed_name: String,

    /// Correlation id of the running session
    pub client_id: Option<u32>,

    pub state: SupervisorState,
    pub alert: ConnectionAlert,
    pub reconnect_attempt: u32,
    pub keep_alive: KeepAliveHealth,

    /// Total payloads received on this feed
    pub message_count: u64,

    /// Payloads that did not decode as dataset updates
    pub undecoded_count: u64,

    /// When the socket last opened
    pub connected_at: Option<DateTime<Utc>>,

    /// Last time a payload was received
    pub last_message_at: Option<DateTime<Utc>>,

    /// Datasets keyed by spec
    pub datasets: BTreeMap<String, DataSetRow>,
}

impl FeedStatus {
    pub fn new(feed_name: String) -> Self {
        Self {
            feed_name,
            client_id: None,
            state: SupervisorState::Idle,
            alert: ConnectionAlert::Hidden,
            reconnect_attempt: 0,
            keep_alive: KeepAliveHealth::Healthy,
            message_count: 0,
            undecoded_count: 0,
            connected_at: None,
            last_message_at: None,
            datasets: BTreeMap::new(),
        }
    }

    /// Whether nothing more will arrive on this feed
    pub fn is_terminated(&self) -> bool {
        self.state.is_terminal() || self.keep_alive == KeepAliveHealth::Exhausted
    }
}

/// Monitor status tracking every feed and recent diagnostics
#[derive(Debug)]
pub struct MonitorStatus {
    pub feeds: HashMap<String, FeedStatus>,

    // Diagnostic messages (keep last 50)
    pub diagnostics: VecDeque<DiagnosticMessage>,
    max_diagnostics: usize,
}

impl Default for MonitorStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorStatus {
    pub fn new() -> Self {
        Self {
            feeds: HashMap::new(),
            diagnostics: VecDeque::with_capacity(50),
            max_diagnostics: 50,
        }
    }

    /// Add a diagnostic message
    pub fn add_diagnostic(&mut self, level: DiagnosticLevel, message: String) {
        self.diagnostics.push_back(DiagnosticMessage {
            timestamp: Utc::now(),
            level,
            message,
        });

        // Keep only the last N messages
        while self.diagnostics.len() > self.max_diagnostics {
            self.diagnostics.pop_front();
        }
    }

    /// Register a feed for tracking
    pub fn register_feed(&mut self, feed_id: String, feed_name: String) {
        self.feeds.insert(feed_id, FeedStatus::new(feed_name));
    }

    /// Remove a feed from tracking
    pub fn unregister_feed(&mut self, feed_id: &str) {
        self.feeds.remove(feed_id);
    }

    /// Record the session id once the feed client is running
    pub fn set_client_id(&mut self, feed_id: &str, client_id: u32) {
        if let Some(feed) = self.feeds.get_mut(feed_id) {
            feed.client_id = Some(client_id);
        }
    }

    /// Record a feed that could not be started at all
    pub fn record_start_failure(&mut self, feed_id: &str, error: &str) {
        let name = if let Some(feed) = self.feeds.get_mut(feed_id) {
            feed.state = SupervisorState::Disconnected;
            feed.alert = ConnectionAlert::ReloadRequired;
            feed.feed_name.clone()
        } else {
            return;
        };
        self.add_diagnostic(
            DiagnosticLevel::Error,
            format!("[{}] Failed to start feed: {}", name, error),
        );
    }

    /// Apply one feed event
    pub fn apply_event(&mut self, feed_id: &str, event: &FeedEvent) {
        // Extract feed info first to avoid borrow conflicts
        let diagnostics = if let Some(feed) = self.feeds.get_mut(feed_id) {
            apply_to_feed(feed, event)
        } else {
            return;
        };

        for (level, message) in diagnostics {
            self.add_diagnostic(level, message);
        }
    }

    #[allow(dead_code)]
    pub fn get_feed_status(&self, feed_id: &str) -> Option<&FeedStatus> {
        self.feeds.get(feed_id)
    }

    /// Number of feeds with an open socket
    pub fn open_feed_count(&self) -> usize {
        self.feeds
            .values()
            .filter(|f| f.state == SupervisorState::Open)
            .count()
    }

    /// True when every registered feed has terminated
    pub fn all_terminated(&self) -> bool {
        !self.feeds.is_empty() && self.feeds.values().all(FeedStatus::is_terminated)
    }
}

fn apply_to_feed(feed: &mut FeedStatus, event: &FeedEvent) -> Vec<(DiagnosticLevel, String)> {
    let name = feed.feed_name.clone();
    let mut diagnostics = Vec::new();

    match event {
        FeedEvent::StateChanged(state) => {
            feed.state = *state;
            if *state != SupervisorState::Open {
                feed.connected_at = None;
            }
        }
        FeedEvent::AlertChanged(alert) => {
            feed.alert = *alert;
        }
        FeedEvent::Opened => {
            feed.connected_at = Some(Utc::now());
            feed.reconnect_attempt = 0;
            diagnostics.push((DiagnosticLevel::Info, format!("[{}] Feed open", name)));
        }
        FeedEvent::Message(payload) => {
            feed.message_count += 1;
            feed.last_message_at = Some(Utc::now());
            match parse_updates(payload) {
                Ok(updates) => {
                    for update in updates {
                        if update.has_unknown_state() {
                            diagnostics.push((
                                DiagnosticLevel::Warning,
                                format!(
                                    "[{}] Dataset '{}' reported unrecognized state {:?}",
                                    name,
                                    update.spec,
                                    update.state.as_deref().unwrap_or_default()
                                ),
                            ));
                        }
                        if let Some(error) = &update.error_message {
                            diagnostics.push((
                                DiagnosticLevel::Error,
                                format!("[{}] Dataset '{}': {}", name, update.spec, error),
                            ));
                        }
                        feed.datasets.insert(
                            update.spec.clone(),
                            DataSetRow {
                                update,
                                updated_at: Utc::now(),
                            },
                        );
                    }
                }
                Err(e) => {
                    feed.undecoded_count += 1;
                    diagnostics.push((
                        DiagnosticLevel::Warning,
                        format!("[{}] Ignoring undecodable payload: {}", name, e),
                    ));
                }
            }
        }
        FeedEvent::ReconnectScheduled { attempt, delay } => {
            feed.reconnect_attempt = *attempt;
            diagnostics.push((
                DiagnosticLevel::Warning,
                format!(
                    "[{}] Connection lost, reconnect {} in {} ms",
                    name,
                    attempt,
                    delay.as_millis()
                ),
            ));
        }
        FeedEvent::ReloadRequired => {
            diagnostics.push((
                DiagnosticLevel::Error,
                format!("[{}] Reconnect budget exhausted, reload required", name),
            ));
        }
        FeedEvent::KeepAliveMissed { consecutive } => {
            feed.keep_alive = KeepAliveHealth::Missed(*consecutive);
        }
        FeedEvent::KeepAliveRecovered => {
            if feed.keep_alive != KeepAliveHealth::Exhausted {
                feed.keep_alive = KeepAliveHealth::Healthy;
            }
        }
        FeedEvent::KeepAliveExhausted => {
            feed.keep_alive = KeepAliveHealth::Exhausted;
            diagnostics.push((
                DiagnosticLevel::Error,
                format!("[{}] Keep-alive lost, refresh required", name),
            ));
        }
    }

    diagnostics
}

/// Thread-safe wrapper for MonitorStatus
pub type SharedMonitorStatus = Arc<Mutex<MonitorStatus>>;
