//! Config file loading
//!
//! ```toml
//! event_capacity = 128
//! discovery_wait_secs = 10
//!
//! [channel]
//! bind = "[::]:61616"
//! multicast_group = "ff02::1"
//! interface = 2
//! recv_timeout_ms = 3000
//! # multicast_group = "" binds unicast only
//! ```

use anyhow::{Context, Result};
use hexabus_client::DEFAULT_EVENT_CAPACITY;
use hexabus_transport::ChannelConfig;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub channel: ChannelConfig,
    pub event_capacity: usize,
    /// How long `list` and friends wait for discovery to settle
    pub discovery_wait_secs: u64,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            channel: ChannelConfig::default(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
            discovery_wait_secs: 10,
        }
    }
}

impl CliConfig {
    /// Read `path`, or fall back to defaults when no file was given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let config: CliConfig = toml::from_str(text)?;
        config.channel.validate()?;
        Ok(config)
    }

    pub fn discovery_wait(&self) -> Duration {
        Duration::from_secs(self.discovery_wait_secs)
    }
}
