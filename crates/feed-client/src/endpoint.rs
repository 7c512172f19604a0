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

//! Feed and command endpoint addressing.
//!
//! Both channels of a session hang off the same server base URL. The feed
//! socket lives at `/organizations/<org>/dataset/feed` and the keep-alive
//! command endpoint at `/admin/dataset/command`; both carry the session's
//! correlation id as `clientId`.

use url::Url;

use crate::correlation::CorrelationId;
use crate::error::EndpointError;

/// Server location and dataset selection for one feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEndpoint {
    base: Url,
    org_id: String,
    spec: Option<String>,
}

impl FeedEndpoint {
    /// Create an endpoint from a base URL such as `http://localhost:9000`.
    ///
    /// `ws`/`wss` base URLs are accepted too and map back to `http`/`https`
    /// for the command channel.
    pub fn new(
        base_url: &str,
        org_id: impl Into<String>,
        spec: Option<String>,
    ) -> Result<Self, EndpointError> {
        let base = Url::parse(base_url)?;
        if base.cannot_be_a_base() {
            return Err(EndpointError::CannotBeABase(base_url.to_string()));
        }
        match base.scheme() {
            "http" | "https" | "ws" | "wss" => {}
            other => return Err(EndpointError::UnsupportedScheme(other.to_string())),
        }

        let org_id = org_id.into();
        if org_id.trim().is_empty() {
            return Err(EndpointError::MissingOrganization);
        }

        Ok(Self {
            base,
            org_id,
            spec: spec.filter(|s| !s.is_empty()),
        })
    }

    #[must_use]
    pub fn org_id(&self) -> &str {
        &self.org_id
    }

    #[must_use]
    pub fn spec(&self) -> Option<&str> {
        self.spec.as_deref()
    }

    /// WebSocket URL of the status feed for the given session.
    pub fn feed_url(&self, id: CorrelationId) -> Result<Url, EndpointError> {
        let mut url = self.with_scheme(Channel::Socket)?;
        url.path_segments_mut()
            .map_err(|()| EndpointError::CannotBeABase(self.base.to_string()))?
            .clear()
            .extend(["organizations", self.org_id.as_str(), "dataset", "feed"]);
        url.set_fragment(None);
        {
            let mut query = url.query_pairs_mut();
            query.clear();
            query.append_pair("clientId", &id.to_string());
            if let Some(spec) = &self.spec {
                query.append_pair("spec", spec);
            }
        }
        Ok(url)
    }

    /// HTTP URL of the dataset command endpoint used for keep-alive pings.
    pub fn command_url(&self, id: CorrelationId) -> Result<Url, EndpointError> {
        let mut url = self.with_scheme(Channel::Http)?;
        url.set_path("/admin/dataset/command");
        url.set_fragment(None);
        url.query_pairs_mut()
            .clear()
            .append_pair("clientId", &id.to_string());
        Ok(url)
    }

    fn with_scheme(&self, channel: Channel) -> Result<Url, EndpointError> {
        let secure = matches!(self.base.scheme(), "https" | "wss");
        let scheme = match (channel, secure) {
            (Channel::Socket, false) => "ws",
            (Channel::Socket, true) => "wss",
            (Channel::Http, false) => "http",
            (Channel::Http, true) => "https",
        };

        let mut url = self.base.clone();
        url.set_scheme(scheme)
            .map_err(|()| EndpointError::UnsupportedScheme(scheme.to_string()))?;
        Ok(url)
    }
}

#[derive(Debug, Clone, Copy)]
enum Channel {
    Socket,
    Http,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: CorrelationId = CorrelationId::from_raw(42);

    #[test]
    fn test_feed_url_with_spec() {
        let endpoint =
            FeedEndpoint::new("http://localhost:9000", "delving", Some("musip".to_string()))
                .unwrap();
        assert_eq!(
            endpoint.feed_url(ID).unwrap().as_str(),
            "ws://localhost:9000/organizations/delving/dataset/feed?clientId=42&spec=musip"
        );
    }

    #[test]
    fn test_feed_url_without_spec() {
        let endpoint = FeedEndpoint::new("http://localhost:9000", "delving", None).unwrap();
        assert_eq!(
            endpoint.feed_url(ID).unwrap().as_str(),
            "ws://localhost:9000/organizations/delving/dataset/feed?clientId=42"
        );
    }

    #[test]
    fn test_org_id_stays_one_path_segment() {
        let endpoint = FeedEndpoint::new("http://localhost:9000", "a/b c", None).unwrap();
        let url = endpoint.feed_url(ID).unwrap();
        assert_eq!(url.path(), "/organizations/a%2Fb%20c/dataset/feed");
        assert_eq!(url.path_segments().unwrap().count(), 4);
    }

    #[test]
    fn test_empty_spec_is_dropped() {
        let endpoint =
            FeedEndpoint::new("http://localhost:9000", "delving", Some(String::new())).unwrap();
        assert_eq!(endpoint.spec(), None);
    }

    #[test]
    fn test_secure_base_maps_to_wss() {
        let endpoint = FeedEndpoint::new("https://hub.example.org", "delving", None).unwrap();
        assert_eq!(endpoint.feed_url(ID).unwrap().scheme(), "wss");
        assert_eq!(endpoint.command_url(ID).unwrap().scheme(), "https");
    }

    #[test]
    fn test_ws_base_maps_back_to_http_for_commands() {
        let endpoint = FeedEndpoint::new("ws://localhost:9000/", "delving", None).unwrap();
        assert_eq!(
            endpoint.command_url(ID).unwrap().as_str(),
            "http://localhost:9000/admin/dataset/command?clientId=42"
        );
    }

    #[test]
    fn test_base_path_and_query_are_replaced() {
        let endpoint =
            FeedEndpoint::new("http://localhost:9000/ignored?x=1#frag", "delving", None).unwrap();
        assert_eq!(
            endpoint.command_url(ID).unwrap().as_str(),
            "http://localhost:9000/admin/dataset/command?clientId=42"
        );
    }

    #[test]
    fn test_rejects_unsupported_scheme() {
        let err = FeedEndpoint::new("ftp://localhost", "delving", None).unwrap_err();
        assert!(matches!(err, EndpointError::UnsupportedScheme(s) if s == "ftp"));
    }

    #[test]
    fn test_rejects_missing_organization() {
        let err = FeedEndpoint::new("http://localhost:9000", "  ", None).unwrap_err();
        assert!(matches!(err, EndpointError::MissingOrganization));
    }

    #[test]
    fn test_rejects_garbage_url() {
        assert!(matches!(
            FeedEndpoint::new("not a url", "delving", None),
            Err(EndpointError::InvalidUrl(_))
        ));
    }
}
