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

//! Plain-text status board.

use chrono::{DateTime, Utc};
use std::fmt::Write;

use crate::status::{DiagnosticLevel, FeedStatus, KeepAliveHealth, MonitorStatus};

/// Diagnostics shown under the board
const RECENT_DIAGNOSTICS: usize = 5;

/// Render the whole board
pub fn render_board(status: &MonitorStatus, now: DateTime<Utc>) -> String {
    let mut out = String::new();

    let mut feeds: Vec<&FeedStatus> = status.feeds.values().collect();
    feeds.sort_by(|a, b| a.feed_name.cmp(&b.feed_name));

    if feeds.is_empty() {
        out.push_str("No feeds running\n");
    } else {
        let _ = writeln!(
            out,
            "CultureHub feeds: {}/{} open",
            status.open_feed_count(),
            feeds.len()
        );
    }
    for feed in feeds {
        render_feed(&mut out, feed, now);
    }

    let skip = status.diagnostics.len().saturating_sub(RECENT_DIAGNOSTICS);
    let mut recent = status.diagnostics.iter().skip(skip).peekable();
    if recent.peek().is_some() {
        out.push_str("-- recent --\n");
        for diagnostic in recent {
            let _ = writeln!(
                out,
                "   {} {:<5} {}",
                diagnostic.timestamp.format("%H:%M:%S"),
                level_label(diagnostic.level),
                diagnostic.message
            );
        }
    }

    out
}

fn render_feed(out: &mut String, feed: &FeedStatus, now: DateTime<Utc>) {
    let client = feed
        .client_id
        .map_or_else(|| "-".to_string(), |id| id.to_string());
    let keep_alive = match feed.keep_alive {
        KeepAliveHealth::Healthy => "ok".to_string(),
        KeepAliveHealth::Missed(n) => format!("missed {}", n),
        KeepAliveHealth::Exhausted => "lost".to_string(),
    };
    let idle = feed.last_message_at.map_or_else(
        || "never".to_string(),
        |at| format!("{}s ago", seconds_since(at, now)),
    );
    let undecoded = if feed.undecoded_count > 0 {
        format!(" ({} undecoded)", feed.undecoded_count)
    } else {
        String::new()
    };

    let _ = write!(
        out,
        "== {} [{}] client {} | messages {}{} | last {} | keep-alive {}",
        feed.feed_name,
        feed.state.label(),
        client,
        feed.message_count,
        undecoded,
        idle,
        keep_alive
    );
    if let Some(at) = feed.connected_at {
        let _ = write!(out, " | up {}s", seconds_since(at, now));
    }
    out.push('\n');

    if let Some(banner) = feed.alert.message() {
        let _ = writeln!(out, "   !! {}", banner);
    }
    if feed.keep_alive == KeepAliveHealth::Exhausted {
        let _ = writeln!(out, "   !! Lost contact with the server. Please refresh the page.");
    }

    for (spec, row) in &feed.datasets {
        let update = &row.update;
        let records = match (update.records_indexed, update.record_count) {
            (Some(done), Some(total)) => match update.progress_percent() {
                Some(pct) => format!("{}/{} ({}%)", done, total, pct),
                None => format!("{}/{}", done, total),
            },
            (None, Some(total)) => total.to_string(),
            _ => String::new(),
        };
        let marker = if update.job_status().is_some_and(|s| s.is_in_progress()) {
            '*'
        } else {
            ' '
        };
        let _ = writeln!(
            out,
            "  {}{:<16} {:<24} {:<18} {:<18} {}",
            marker,
            spec,
            update.name.as_deref().unwrap_or(""),
            update.badge(),
            records,
            row.updated_at.format("%H:%M:%S")
        );
    }
}

fn seconds_since(at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - at).num_seconds().max(0)
}

fn level_label(level: DiagnosticLevel) -> &'static str {
    match level {
        DiagnosticLevel::Info => "INFO",
        DiagnosticLevel::Warning => "WARN",
        DiagnosticLevel::Error => "ERROR",
    }
}
