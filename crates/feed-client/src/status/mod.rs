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

//! Dataset job status labels.
//!
//! The server reports the processing state of a dataset import as a plain
//! string. The mapper turns it into the presentation class used to render a
//! status badge. It is total: states it does not know about render with the
//! empty class instead of failing.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Server-reported state of an asynchronous dataset ingestion job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    Uploaded,
    Incomplete,
    Error,
    Enabled,
    Disabled,
    Processing,
    Queued,
    Parsing,
}

impl JobStatus {
    /// Every known status, in no particular order.
    pub const ALL: [Self; 8] = [
        Self::Uploaded,
        Self::Incomplete,
        Self::Error,
        Self::Enabled,
        Self::Disabled,
        Self::Processing,
        Self::Queued,
        Self::Parsing,
    ];

    /// The wire literal, which doubles as the display class.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Uploaded => "uploaded",
            Self::Incomplete => "incomplete",
            Self::Error => "error",
            Self::Enabled => "enabled",
            Self::Disabled => "disabled",
            Self::Processing => "processing",
            Self::Queued => "queued",
            Self::Parsing => "parsing",
        }
    }

    /// Whether the job is still moving through the pipeline.
    #[must_use]
    pub const fn is_in_progress(self) -> bool {
        matches!(self, Self::Queued | Self::Parsing | Self::Processing)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized job status: {0:?}")]
pub struct UnknownStatus(pub String);

impl FromStr for JobStatus {
    type Err = UnknownStatus;

    /// Exact, case-sensitive match against the wire literals.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// Map a server-reported status to its display class.
///
/// Known literals map to themselves; anything else, including a missing
/// value, maps to `""`.
#[must_use]
pub fn map_status(status: Option<&str>) -> &'static str {
    status
        .and_then(|s| s.parse::<JobStatus>().ok())
        .map_or("", JobStatus::as_str)
}

/// Full badge class for a status, e.g. `badge-processing`.
///
/// Unknown states yield the bare `badge-` class.
#[must_use]
pub fn badge_class(status: Option<&str>) -> String {
    format!("badge-{}", map_status(status))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_literals_map_to_themselves() {
        for literal in [
            "uploaded",
            "incomplete",
            "error",
            "enabled",
            "disabled",
            "processing",
            "queued",
            "parsing",
        ] {
            assert_eq!(map_status(Some(literal)), literal);
        }
    }

    #[test]
    fn test_unknown_values_map_to_empty() {
        assert_eq!(map_status(Some("bogus")), "");
        assert_eq!(map_status(Some("")), "");
        assert_eq!(map_status(None), "");
    }

    #[test]
    fn test_mapping_is_case_sensitive() {
        assert_eq!(map_status(Some("Processing")), "");
        assert_eq!(map_status(Some(" queued")), "");
    }

    #[test]
    fn test_from_str_round_trips_all() {
        for status in JobStatus::ALL {
            assert_eq!(status.as_str().parse::<JobStatus>(), Ok(status));
        }
        assert_eq!(
            "indexing".parse::<JobStatus>(),
            Err(UnknownStatus("indexing".to_string()))
        );
    }

    #[test]
    fn test_badge_class() {
        assert_eq!(badge_class(Some("error")), "badge-error");
        assert_eq!(badge_class(Some("bogus")), "badge-");
        assert_eq!(badge_class(None), "badge-");
    }

    #[test]
    fn test_in_progress_states() {
        assert!(JobStatus::Parsing.is_in_progress());
        assert!(!JobStatus::Enabled.is_in_progress());
        assert!(!JobStatus::Error.is_in_progress());
    }
}
