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

//! Connection supervision with a bounded reconnect budget.
//!
//! [`Supervisor`] is the pure state machine:
//!
//! ```text
//! Idle -> Connecting -> Open <-> Reconnecting -> Disconnected
//! ```
//!
//! It decides what happens on open and close but performs no I/O, so it can
//! be driven step by step in tests. [`Connection`] runs it against a real
//! [`Transport`](crate::transport::Transport) in a background task.

mod task;

pub use task::Connection;

use std::time::Duration;

use crate::correlation::CorrelationId;

/// Retry policy for a supervised connection.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Reconnects allowed before giving up. Reset by every successful open.
    pub max_retries: u32,
    /// Fixed delay before each reconnect.
    pub reconnect_delay: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            reconnect_delay: Duration::from_secs(5),
        }
    }
}

/// Lifecycle state of a supervised connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SupervisorState {
    /// Created, never connected.
    Idle,
    /// Opening the transport.
    Connecting,
    /// Transport open, messages flowing.
    Open,
    /// Closed, waiting out the reconnect delay.
    Reconnecting,
    /// Retry budget exhausted. Terminal.
    Disconnected,
}

impl SupervisorState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Disconnected)
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Reconnecting => "reconnecting",
            Self::Disconnected => "disconnected",
        }
    }
}

/// What the user should be shown about the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionAlert {
    /// Nothing to show.
    #[default]
    Hidden,
    /// Non-blocking banner while a reconnect is pending.
    Reconnecting,
    /// Blocking alert: the connection is gone and the page must be reloaded.
    ReloadRequired,
}

impl ConnectionAlert {
    /// Banner text for this alert, if any.
    #[must_use]
    pub const fn message(self) -> Option<&'static str> {
        match self {
            Self::Hidden => None,
            Self::Reconnecting => Some("Connection to the server lost, reconnecting..."),
            Self::ReloadRequired => {
                Some("Connection to the server lost. Please reload the page to continue.")
            }
        }
    }
}

/// Decision taken by the supervisor when the transport closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// Schedule exactly one reconnect after `delay`.
    Reconnect { attempt: u32, delay: Duration },
    /// Budget exhausted, the connection is now terminal.
    Disconnected,
    /// Close arrived in a state where it means nothing.
    Ignored,
}

/// Snapshot of a connection for observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub state: SupervisorState,
    pub alert: ConnectionAlert,
    pub retry_count: u32,
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self {
            state: SupervisorState::Idle,
            alert: ConnectionAlert::Hidden,
            retry_count: 0,
        }
    }
}

/// Connection supervisor state machine.
#[derive(Debug, Clone)]
pub struct Supervisor {
    id: CorrelationId,
    config: SupervisorConfig,
    state: SupervisorState,
    retry_count: u32,
    alert: ConnectionAlert,
}

impl Supervisor {
    #[must_use]
    pub fn new(id: CorrelationId, config: SupervisorConfig) -> Self {
        Self {
            id,
            config,
            state: SupervisorState::Idle,
            retry_count: 0,
            alert: ConnectionAlert::Hidden,
        }
    }

    #[must_use]
    pub fn correlation_id(&self) -> CorrelationId {
        self.id
    }

    #[must_use]
    pub fn current_state(&self) -> SupervisorState {
        self.state
    }

    #[must_use]
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    #[must_use]
    pub fn alert(&self) -> ConnectionAlert {
        self.alert
    }

    #[must_use]
    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        ConnectionStatus {
            state: self.state,
            alert: self.alert,
            retry_count: self.retry_count,
        }
    }

    /// Start a connection attempt.
    ///
    /// Returns `false` when no attempt may be made (already connecting or
    /// open, or terminal).
    pub fn begin_connect(&mut self) -> bool {
        match self.state {
            SupervisorState::Idle | SupervisorState::Reconnecting => {
                self.state = SupervisorState::Connecting;
                true
            }
            SupervisorState::Connecting | SupervisorState::Open | SupervisorState::Disconnected => {
                false
            }
        }
    }

    /// The transport opened.
    ///
    /// Resets the retry budget and hides any reconnect banner.
    pub fn on_open(&mut self) {
        if self.state != SupervisorState::Connecting {
            return;
        }
        self.state = SupervisorState::Open;
        self.retry_count = 0;
        self.alert = ConnectionAlert::Hidden;
    }

    /// The transport closed, failed, or could not be opened.
    pub fn on_close(&mut self) -> CloseOutcome {
        match self.state {
            SupervisorState::Idle | SupervisorState::Disconnected => CloseOutcome::Ignored,
            SupervisorState::Connecting | SupervisorState::Open | SupervisorState::Reconnecting => {
                if self.retry_count < self.config.max_retries {
                    self.retry_count += 1;
                    self.state = SupervisorState::Reconnecting;
                    self.alert = ConnectionAlert::Reconnecting;
                    CloseOutcome::Reconnect {
                        attempt: self.retry_count,
                        delay: self.config.reconnect_delay,
                    }
                } else {
                    self.state = SupervisorState::Disconnected;
                    self.alert = ConnectionAlert::ReloadRequired;
                    CloseOutcome::Disconnected
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn supervisor(max_retries: u32) -> Supervisor {
        Supervisor::new(
            CorrelationId::from_raw(7),
            SupervisorConfig {
                max_retries,
                reconnect_delay: Duration::from_millis(5000),
            },
        )
    }

    #[test]
    fn test_starts_idle() {
        let sup = supervisor(3);
        assert_eq!(sup.current_state(), SupervisorState::Idle);
        assert_eq!(sup.retry_count(), 0);
        assert_eq!(sup.alert(), ConnectionAlert::Hidden);
    }

    #[test]
    fn test_open_resets_retry_count() {
        let mut sup = supervisor(3);
        assert!(sup.begin_connect());
        assert!(matches!(sup.on_close(), CloseOutcome::Reconnect { attempt: 1, .. }));
        assert!(sup.begin_connect());
        sup.on_open();

        assert_eq!(sup.current_state(), SupervisorState::Open);
        assert_eq!(sup.retry_count(), 0);
        assert_eq!(sup.alert(), ConnectionAlert::Hidden);
    }

    #[test]
    fn test_close_under_budget_schedules_one_reconnect() {
        let mut sup = supervisor(3);
        sup.begin_connect();
        sup.on_open();

        for expected in 1..=3 {
            let before = sup.retry_count();
            let outcome = sup.on_close();
            assert_eq!(
                outcome,
                CloseOutcome::Reconnect {
                    attempt: expected,
                    delay: Duration::from_millis(5000)
                }
            );
            assert_eq!(sup.retry_count(), before + 1);
            assert_eq!(sup.current_state(), SupervisorState::Reconnecting);
            assert_eq!(sup.alert(), ConnectionAlert::Reconnecting);
            assert!(sup.begin_connect());
        }
    }

    #[test]
    fn test_three_retries_then_terminal() {
        let mut sup = supervisor(3);
        let mut reconnects = 0;
        let mut fatal = 0;

        sup.begin_connect();
        for _ in 0..4 {
            match sup.on_close() {
                CloseOutcome::Reconnect { .. } => {
                    reconnects += 1;
                    assert!(sup.begin_connect());
                }
                CloseOutcome::Disconnected => fatal += 1,
                CloseOutcome::Ignored => {}
            }
        }

        assert_eq!(reconnects, 3);
        assert_eq!(fatal, 1);
        assert_eq!(sup.current_state(), SupervisorState::Disconnected);
        assert_eq!(sup.alert(), ConnectionAlert::ReloadRequired);
    }

    #[test]
    fn test_terminal_state_is_sticky() {
        let mut sup = supervisor(0);
        sup.begin_connect();
        assert_eq!(sup.on_close(), CloseOutcome::Disconnected);

        for _ in 0..5 {
            assert_eq!(sup.on_close(), CloseOutcome::Ignored);
        }
        assert!(!sup.begin_connect());
        sup.on_open();
        assert_eq!(sup.current_state(), SupervisorState::Disconnected);
    }

    #[test]
    fn test_close_while_idle_is_ignored() {
        let mut sup = supervisor(3);
        assert_eq!(sup.on_close(), CloseOutcome::Ignored);
        assert_eq!(sup.retry_count(), 0);
    }

    #[test]
    fn test_open_outside_connecting_is_ignored() {
        let mut sup = supervisor(3);
        sup.on_open();
        assert_eq!(sup.current_state(), SupervisorState::Idle);
    }

    #[test]
    fn test_cannot_begin_twice() {
        let mut sup = supervisor(3);
        assert!(sup.begin_connect());
        assert!(!sup.begin_connect());
    }

    #[test]
    fn test_alert_messages() {
        assert_eq!(ConnectionAlert::Hidden.message(), None);
        assert!(ConnectionAlert::ReloadRequired
            .message()
            .unwrap()
            .contains("reload"));
    }
}
