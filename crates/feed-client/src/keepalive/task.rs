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

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::{KeepAlive, PingOutcome, PingSender};
use crate::event::FeedEvent;

/// Shortest ping period accepted; tokio intervals reject a zero period.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Handle to a running keep-alive loop.
pub struct KeepAliveTask {
    cancel_token: CancellationToken,
    task: JoinHandle<()>,
}

impl std::fmt::Debug for KeepAliveTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeepAliveTask")
            .field("cancel_token", &self.cancel_token)
            .finish_non_exhaustive()
    }
}

impl KeepAliveTask {
    /// Start pinging `url` every `period`.
    ///
    /// A zero `period` is raised to one millisecond. Must be called from
    /// within a Tokio runtime.
    #[must_use]
    pub fn spawn(
        sender: Arc<dyn PingSender>,
        url: Url,
        session: KeepAlive,
        period: Duration,
        event_tx: mpsc::Sender<FeedEvent>,
        cancel_token: CancellationToken,
    ) -> Self {
        let period = period.max(MIN_PERIOD);
        let task_cancel = cancel_token.clone();
        let task = tokio::spawn(async move {
            ping_loop(sender, url, session, period, event_tx, task_cancel).await;
        });

        Self { cancel_token, task }
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }
}

impl Drop for KeepAliveTask {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

async fn ping_loop(
    sender: Arc<dyn PingSender>,
    url: Url,
    mut session: KeepAlive,
    period: Duration,
    event_tx: mpsc::Sender<FeedEvent>,
    cancel_token: CancellationToken,
) {
    let id = session.correlation_id();
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            () = cancel_token.cancelled() => {
                info!("[{}] Keep-alive cancelled", id);
                return;
            }
        }

        let result = tokio::select! {
            result = sender.ping(&url) => result,
            () = cancel_token.cancelled() => {
                info!("[{}] Keep-alive cancelled", id);
                return;
            }
        };

        let event = match result {
            Ok(()) => {
                if !session.record_success() {
                    continue;
                }
                info!("[{}] Keep-alive recovered", id);
                FeedEvent::KeepAliveRecovered
            }
            Err(e) => match session.record_failure() {
                PingOutcome::Missed { consecutive } => {
                    debug!("[{}] Keep-alive ping failed ({}): {}", id, consecutive, e);
                    FeedEvent::KeepAliveMissed { consecutive }
                }
                PingOutcome::Fatal => {
                    error!(
                        "[{}] Keep-alive failed {} times in a row, refresh required: {}",
                        id,
                        session.consecutive_failures(),
                        e
                    );
                    let _ = event_tx.send(FeedEvent::KeepAliveExhausted).await;
                    return;
                }
                PingOutcome::Exhausted => return,
            },
        };

        if event_tx.send(event).await.is_err() {
            return;
        }
    }
}
