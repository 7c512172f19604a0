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

//! Dataset status payloads carried by the feed.
//!
//! The feed client hands payloads over untouched; decoding them is done
//! here. A payload is either a single dataset object or an array of them.

use feed_client::status::{badge_class, map_status};
use feed_client::JobStatus;
use serde::Deserialize;

/// One dataset status update as sent by the server
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DataSetUpdate {
    pub spec: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub records_indexed: Option<u64>,
    #[serde(default)]
    pub record_count: Option<u64>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl DataSetUpdate {
    /// Known job status, if the server sent one we recognize
    pub fn job_status(&self) -> Option<JobStatus> {
        self.state.as_deref().and_then(|s| s.parse().ok())
    }

    /// Badge class for the reported state
    pub fn badge(&self) -> String {
        badge_class(self.state.as_deref())
    }

    /// True when a state was sent but maps to no display class
    pub fn has_unknown_state(&self) -> bool {
        self.state.is_some() && map_status(self.state.as_deref()).is_empty()
    }

    /// Indexing progress in percent, when both counts are known
    pub fn progress_percent(&self) -> Option<u8> {
        match (self.records_indexed, self.record_count) {
            (Some(done), Some(total)) if total > 0 => {
                let pct = done.min(total) * 100 / total;
                u8::try_from(pct).ok()
            }
            _ => None,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Payload {
    Many(Vec<DataSetUpdate>),
    One(DataSetUpdate),
}

/// Decode a feed payload into dataset updates
pub fn parse_updates(payload: &str) -> Result<Vec<DataSetUpdate>, serde_json::Error> {
    Ok(match serde_json::from_str::<Payload>(payload)? {
        Payload::Many(updates) => updates,
        Payload::One(update) => vec![update],
    })
}
