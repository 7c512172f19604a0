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

use std::time::Duration;

use crate::supervisor::{ConnectionAlert, SupervisorState};

/// Events emitted by a running feed session.
///
/// The supervisor and the keep-alive pinger each hold their own sender for
/// the same channel; events from one source arrive in order, events from the
/// two sources are not ordered against each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    /// Supervisor state changed.
    StateChanged(SupervisorState),
    /// Connection alert visibility changed.
    AlertChanged(ConnectionAlert),
    /// The feed socket opened.
    Opened,
    /// A text payload arrived, unparsed.
    Message(String),
    /// The feed closed and a reconnect is scheduled.
    ReconnectScheduled { attempt: u32, delay: Duration },
    /// Retry budget exhausted; only a reload of the session can recover.
    ReloadRequired,
    /// A keep-alive ping failed below the failure threshold.
    KeepAliveMissed { consecutive: u32 },
    /// A keep-alive ping succeeded after one or more misses.
    KeepAliveRecovered,
    /// Keep-alive pings failed up to the threshold. The pinger has stopped.
    KeepAliveExhausted,
}

impl FeedEvent {
    /// Whether this event means the user has to refresh the session.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::ReloadRequired | Self::KeepAliveExhausted)
    }
}
