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

mod config;
mod console;
mod dataset;
mod feed_manager;
mod status;

use std::sync::{Arc, Mutex};

use clap::Parser;
use log::{info, warn};

use config::{AppConfig, FeedConfig, DEFAULT_BASE_URL};
use feed_manager::FeedManager;
use status::{MonitorStatus, SharedMonitorStatus};

/// Follow CultureHub dataset processing over the live status feed
#[derive(Parser, Debug)]
#[command(name = "culturehub-feed", version, about)]
struct Cli {
    /// Server base URL (replaces the configured feeds)
    #[arg(long)]
    base_url: Option<String>,

    /// Organization id (replaces the configured feeds)
    #[arg(long)]
    org: Option<String>,

    /// Follow a single dataset spec
    #[arg(long)]
    spec: Option<String>,

    /// Reconnects allowed before a feed gives up
    #[arg(long)]
    max_retries: Option<u32>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Print the configuration file path and exit
    #[arg(long)]
    config_path: bool,

    /// Persist the effective configuration
    #[arg(long)]
    save: bool,
}

/// Apply command line overrides on top of the loaded configuration
fn apply_overrides(config: &mut AppConfig, cli: &Cli) {
    if cli.base_url.is_some() || cli.org.is_some() || cli.spec.is_some() {
        let feed = FeedConfig::new(
            "Command line".to_string(),
            cli.base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            cli.org.clone().unwrap_or_else(|| "delving".to_string()),
            cli.spec.clone(),
        );
        config.replace_feeds(feed);
    }
    if let Some(max_retries) = cli.max_retries {
        config.max_retries = max_retries;
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&cli.log_level))
        .init();

    if cli.config_path {
        println!("{}", AppConfig::get_config_path()?.display());
        return Ok(());
    }

    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!("Failed to load configuration, using defaults: {}", e);
        AppConfig::default()
    });
    apply_overrides(&mut config, &cli);

    if cli.save {
        config.save()?;
        info!("Configuration saved to {}", AppConfig::get_config_path()?.display());
    }

    let status: SharedMonitorStatus = Arc::new(Mutex::new(MonitorStatus::new()));
    let mut manager = FeedManager::new(Arc::clone(&status), &config)?;
    for feed in config.feeds.clone() {
        manager.add_feed(feed);
    }

    if manager.active_feed_count() == 0 {
        if let Ok(snapshot) = status.lock() {
            println!("{}", console::render_board(&snapshot, chrono::Utc::now()));
        }
        warn!("No feed could be started");
        return Ok(());
    }

    let mut ticker = tokio::time::interval(config.render_interval());
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let Ok(snapshot) = status.lock() else { break };
                println!("{}", console::render_board(&snapshot, chrono::Utc::now()));
                if snapshot.all_terminated() {
                    warn!("All feeds have stopped, restart to reconnect");
                    break;
                }
            }
            result = tokio::signal::ctrl_c() => {
                result?;
                info!("Interrupted, shutting down");
                break;
            }
        }
    }

    manager.shutdown_all();
    Ok(())
}
