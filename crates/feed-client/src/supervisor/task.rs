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

//! Background task driving a [`Supervisor`] over a transport.

use std::sync::Arc;

use log::{error, info, warn};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::{CloseOutcome, ConnectionStatus, Supervisor};
use crate::error::TransportError;
use crate::event::FeedEvent;
use crate::transport::Transport;

/// Handle to a supervised feed connection.
///
/// The connection runs in a background task, reconnecting within its retry
/// budget. Events go to the sender passed to [`Connection::spawn`].
pub struct Connection {
    status_rx: watch::Receiver<ConnectionStatus>,
    cancel_token: CancellationToken,
    task: JoinHandle<()>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("status", &*self.status_rx.borrow())
            .field("cancel_token", &self.cancel_token)
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Spawn the supervision task.
    ///
    /// Must be called from within a Tokio runtime. The task stops when
    /// `cancel_token` is cancelled, when the retry budget runs out, or when
    /// the event receiver is dropped.
    #[must_use]
    pub fn spawn(
        transport: Arc<dyn Transport>,
        url: Url,
        supervisor: Supervisor,
        event_tx: mpsc::Sender<FeedEvent>,
        cancel_token: CancellationToken,
    ) -> Self {
        let (status_tx, status_rx) = watch::channel(supervisor.status());
        let task_cancel = cancel_token.clone();

        let task = tokio::spawn(async move {
            let reporter = Reporter {
                event_tx,
                status_tx,
                last: supervisor.status(),
            };
            connection_loop(transport, url, supervisor, reporter, task_cancel).await;
        });

        Self {
            status_rx,
            cancel_token,
            task,
        }
    }

    /// Latest connection snapshot.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        *self.status_rx.borrow()
    }

    /// Watch connection snapshots.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_rx.clone()
    }

    /// Whether the supervision task has ended.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the connection.
    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

/// Publishes supervisor changes as events and snapshots.
struct Reporter {
    event_tx: mpsc::Sender<FeedEvent>,
    status_tx: watch::Sender<ConnectionStatus>,
    last: ConnectionStatus,
}

impl Reporter {
    /// Returns `false` once the event receiver is gone.
    async fn emit(&self, event: FeedEvent) -> bool {
        self.event_tx.send(event).await.is_ok()
    }

    async fn sync(&mut self, supervisor: &Supervisor) -> bool {
        let current = supervisor.status();
        let previous = std::mem::replace(&mut self.last, current);
        self.status_tx.send_replace(current);

        let mut alive = true;
        if current.state != previous.state {
            alive &= self.emit(FeedEvent::StateChanged(current.state)).await;
        }
        if current.alert != previous.alert {
            alive &= self.emit(FeedEvent::AlertChanged(current.alert)).await;
        }
        alive
    }
}

enum SessionEnd {
    Closed,
    Failed(TransportError),
    ReceiverDropped,
    Cancelled,
}

async fn connection_loop(
    transport: Arc<dyn Transport>,
    url: Url,
    mut supervisor: Supervisor,
    mut reporter: Reporter,
    cancel_token: CancellationToken,
) {
    let id = supervisor.correlation_id();

    while supervisor.begin_connect() {
        if !reporter.sync(&supervisor).await {
            return;
        }
        info!("[{}] Connecting to {}...", id, url);

        let end = tokio::select! {
            end = run_session(transport.as_ref(), &url, &mut supervisor, &mut reporter) => end,
            () = cancel_token.cancelled() => SessionEnd::Cancelled,
        };

        match end {
            SessionEnd::Closed => info!("[{}] Feed closed", id),
            SessionEnd::Failed(e) => error!("[{}] Feed error: {}", id, e),
            SessionEnd::ReceiverDropped => return,
            SessionEnd::Cancelled => {
                info!("[{}] Feed cancelled", id);
                return;
            }
        }

        match supervisor.on_close() {
            CloseOutcome::Reconnect { attempt, delay } => {
                warn!(
                    "[{}] Reconnecting in {} ms (attempt {}/{})",
                    id,
                    delay.as_millis(),
                    attempt,
                    supervisor.config().max_retries
                );
                if !reporter.sync(&supervisor).await
                    || !reporter
                        .emit(FeedEvent::ReconnectScheduled { attempt, delay })
                        .await
                {
                    return;
                }

                tokio::select! {
                    () = sleep(delay) => {}
                    () = cancel_token.cancelled() => {
                        info!("[{}] Feed cancelled during reconnect delay", id);
                        return;
                    }
                }
            }
            CloseOutcome::Disconnected => {
                error!(
                    "[{}] Giving up after {} reconnect attempts, reload required",
                    id,
                    supervisor.config().max_retries
                );
                reporter.sync(&supervisor).await;
                reporter.emit(FeedEvent::ReloadRequired).await;
                return;
            }
            CloseOutcome::Ignored => return,
        }
    }
}

async fn run_session(
    transport: &dyn Transport,
    url: &Url,
    supervisor: &mut Supervisor,
    reporter: &mut Reporter,
) -> SessionEnd {
    let mut socket = match transport.open(url).await {
        Ok(socket) => socket,
        Err(e) => return SessionEnd::Failed(e),
    };

    supervisor.on_open();
    info!("[{}] Feed open", supervisor.correlation_id());
    if !reporter.sync(supervisor).await || !reporter.emit(FeedEvent::Opened).await {
        return SessionEnd::ReceiverDropped;
    }

    loop {
        match socket.next_text().await {
            Some(Ok(text)) => {
                if !reporter.emit(FeedEvent::Message(text)).await {
                    return SessionEnd::ReceiverDropped;
                }
            }
            Some(Err(e)) => return SessionEnd::Failed(e),
            None => return SessionEnd::Closed,
        }
    }
}
