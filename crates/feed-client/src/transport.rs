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

//! Message-oriented transport for the status feed.
//!
//! The supervisor only needs two things from a transport: open a session and
//! pull the next text payload. [`WsTransport`] implements this over a
//! WebSocket; tests plug in scripted transports.

use async_trait::async_trait;
use futures_util::StreamExt;
use log::debug;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::error::TransportError;

/// Opens feed sessions.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open one session to `url`.
    async fn open(&self, url: &Url) -> Result<Box<dyn FeedSocket>, TransportError>;
}

/// One open feed session.
#[async_trait]
pub trait FeedSocket: Send {
    /// Next text payload in transport order.
    ///
    /// Returns `None` once the session is closed.
    async fn next_text(&mut self) -> Option<Result<String, TransportError>>;
}

/// WebSocket transport backed by tokio-tungstenite.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsTransport;

#[async_trait]
impl Transport for WsTransport {
    async fn open(&self, url: &Url) -> Result<Box<dyn FeedSocket>, TransportError> {
        let (stream, response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        debug!("Feed handshake completed with status {}", response.status());
        Ok(Box::new(WsSocket { stream }))
    }
}

struct WsSocket {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl FeedSocket for WsSocket {
    async fn next_text(&mut self) -> Option<Result<String, TransportError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                Ok(Message::Close(frame)) => {
                    debug!("Feed closed by server: {frame:?}");
                    return None;
                }
                // Pings are answered by tungstenite itself; nothing else is a payload.
                Ok(Message::Binary(_) | Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {}
                Err(e) => return Some(Err(TransportError::Read(e.to_string()))),
            }
        }
    }
}
