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

//! Application configuration management.
//!
//! Configuration is persisted as TOML through confy. It holds the list of
//! dataset feeds to monitor and the reconnect and keep-alive tuning shared
//! by all of them.

use std::time::Duration;

use feed_client::{
    ClientConfig, EndpointError, FeedEndpoint, KeepAliveConfig, SupervisorConfig,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const APP_NAME: &str = "culturehub-feed";
const CONFIG_NAME: &str = "config";

/// Default CultureHub server for a fresh configuration
pub const DEFAULT_BASE_URL: &str = "http://localhost:9000";

/// One dataset feed to monitor
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct FeedConfig {
    /// Unique identifier for this feed (stable across renames)
    pub id: String,

    /// User-friendly display name
    pub name: String,

    /// Server base URL, e.g. `http://localhost:9000`
    pub base_url: String,

    /// Organization whose datasets are followed
    pub org_id: String,

    /// Restrict the feed to one dataset spec
    #[serde(default)]
    pub spec: Option<String>,

    /// Whether this feed should connect on startup
    pub enabled: bool,
}

impl FeedConfig {
    /// Create a new feed configuration with a generated UUID
    pub fn new(name: String, base_url: String, org_id: String, spec: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            base_url,
            org_id,
            spec,
            enabled: true,
        }
    }

    /// Create the default local feed
    pub fn default_local() -> Self {
        Self::new(
            "Local CultureHub".to_string(),
            DEFAULT_BASE_URL.to_string(),
            "delving".to_string(),
            None,
        )
    }

    /// Build the client configuration for this feed
    pub fn to_client_config(&self, app: &AppConfig) -> Result<ClientConfig, EndpointError> {
        let endpoint = FeedEndpoint::new(&self.base_url, self.org_id.clone(), self.spec.clone())?;
        let mut config = ClientConfig::new(endpoint);
        config.supervisor = app.supervisor_config();
        config.keep_alive = app.keep_alive_config();
        Ok(config)
    }
}

/// Application configuration stored in TOML format
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Configuration schema version
    #[serde(default = "default_config_version")]
    pub config_version: u32,

    /// Configured dataset feeds
    #[serde(default = "default_feeds")]
    pub feeds: Vec<FeedConfig>,

    /// Reconnects allowed before a feed gives up
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before each reconnect
    #[serde(default = "default_interval_ms")]
    pub reconnect_delay_ms: u64,

    /// Time between keep-alive pings
    #[serde(default = "default_interval_ms")]
    pub ping_interval_ms: u64,

    /// Consecutive failed pings before the session is declared dead
    #[serde(default = "default_ping_max_failures")]
    pub ping_max_failures: u32,

    /// How often the console board is redrawn
    #[serde(default = "default_render_interval_ms")]
    pub render_interval_ms: u64,
}

// Default value functions for serde
fn default_config_version() -> u32 {
    1
}

fn default_feeds() -> Vec<FeedConfig> {
    vec![FeedConfig::default_local()]
}

fn default_max_retries() -> u32 {
    3
}

fn default_interval_ms() -> u64 {
    5000
}

fn default_ping_max_failures() -> u32 {
    3
}

fn default_render_interval_ms() -> u64 {
    2000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_version: default_config_version(),
            feeds: default_feeds(),
            max_retries: default_max_retries(),
            reconnect_delay_ms: default_interval_ms(),
            ping_interval_ms: default_interval_ms(),
            ping_max_failures: default_ping_max_failures(),
            render_interval_ms: default_render_interval_ms(),
        }
    }
}

impl AppConfig {
    /// Load configuration from disk
    pub fn load() -> Result<Self, confy::ConfyError> {
        confy::load(APP_NAME, CONFIG_NAME)
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<(), confy::ConfyError> {
        confy::store(APP_NAME, CONFIG_NAME, self)
    }

    /// Get the config file path for display to user
    pub fn get_config_path() -> Result<std::path::PathBuf, confy::ConfyError> {
        confy::get_configuration_file_path(APP_NAME, CONFIG_NAME)
    }

    pub fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            max_retries: self.max_retries,
            reconnect_delay: Duration::from_millis(self.reconnect_delay_ms),
        }
    }

    pub fn keep_alive_config(&self) -> KeepAliveConfig {
        KeepAliveConfig {
            interval: Duration::from_millis(self.ping_interval_ms.max(100)),
            max_failures: self.ping_max_failures,
            ..KeepAliveConfig::default()
        }
    }

    pub fn render_interval(&self) -> Duration {
        Duration::from_millis(self.render_interval_ms.max(100))
    }

    /// Replace every configured feed with a single one
    pub fn replace_feeds(&mut self, feed: FeedConfig) {
        self.feeds = vec![feed];
    }
}
