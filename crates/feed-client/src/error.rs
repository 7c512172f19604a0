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

//! Error types for the feed client.

use thiserror::Error;

/// Errors raised while building feed and command URLs.
#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("invalid base url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("unsupported url scheme '{0}' (expected http, https, ws or wss)")]
    UnsupportedScheme(String),

    #[error("base url cannot carry a path: {0}")]
    CannotBeABase(String),

    #[error("organization id must not be empty")]
    MissingOrganization,
}

/// Errors raised by a feed transport.
///
/// The supervisor does not classify these: every variant ends the current
/// session and counts against the retry budget.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to open feed: {0}")]
    Connect(String),

    #[error("feed read failed: {0}")]
    Read(String),
}

/// Errors raised by a single keep-alive ping.
#[derive(Debug, Error)]
pub enum KeepAliveError {
    #[error("ping request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("ping rejected with status {0}")]
    Status(u16),

    #[error("ping response was not json: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Umbrella error for client construction.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error(transparent)]
    Endpoint(#[from] EndpointError),

    #[error("failed to build http client: {0}")]
    HttpClient(#[source] reqwest::Error),
}
