//! Channel configuration

use hexabus_core::{DEFAULT_PORT, MAX_PACKET_SIZE, MULTICAST_GROUP};
use serde::{Deserialize, Deserializer, Serialize};
use std::net::{Ipv6Addr, SocketAddr};
use std::time::Duration;

use crate::error::{Result, TransportError};

/// Multicast channel configuration
///
/// Every field has a default, so a TOML `[channel]` table only needs to name
/// what it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Local address the socket binds to
    pub bind: SocketAddr,
    /// Group joined after binding; `None` (or `""` in a config file) for
    /// plain unicast
    #[serde(deserialize_with = "group_or_none")]
    pub multicast_group: Option<Ipv6Addr>,
    /// IPv6 interface index used for the group join, 0 lets the kernel pick
    pub interface: u32,
    /// Upper bound on a single receive before the loop flushes again
    pub recv_timeout_ms: u64,
    /// First delay after a failed socket open
    pub retry_initial_ms: u64,
    /// Cap for the doubling reopen delay
    pub retry_max_ms: u64,
    /// Receive buffer size
    pub max_packet_size: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from((Ipv6Addr::UNSPECIFIED, DEFAULT_PORT)),
            multicast_group: Some(MULTICAST_GROUP),
            interface: 0,
            recv_timeout_ms: 3000,
            retry_initial_ms: 5000,
            retry_max_ms: 60_000,
            max_packet_size: MAX_PACKET_SIZE,
        }
    }
}

impl ChannelConfig {
    /// Unicast configuration bound to `bind`, with no group membership
    pub fn unicast(bind: SocketAddr) -> Self {
        Self {
            bind,
            multicast_group: None,
            ..Default::default()
        }
    }

    pub fn recv_timeout(&self) -> Duration {
        Duration::from_millis(self.recv_timeout_ms)
    }

    pub fn retry_initial(&self) -> Duration {
        Duration::from_millis(self.retry_initial_ms)
    }

    pub fn retry_max(&self) -> Duration {
        Duration::from_millis(self.retry_max_ms)
    }

    /// Check the configuration before a channel is built from it
    pub fn validate(&self) -> Result<()> {
        if self.recv_timeout_ms == 0 {
            return Err(TransportError::Config(
                "recv_timeout_ms must be positive".into(),
            ));
        }
        if self.retry_initial_ms == 0 {
            return Err(TransportError::Config(
                "retry_initial_ms must be positive".into(),
            ));
        }
        if self.retry_max_ms < self.retry_initial_ms {
            return Err(TransportError::Config(format!(
                "retry_max_ms ({}) is below retry_initial_ms ({})",
                self.retry_max_ms, self.retry_initial_ms
            )));
        }
        if self.max_packet_size < MAX_PACKET_SIZE {
            return Err(TransportError::Config(format!(
                "max_packet_size must be at least {}",
                MAX_PACKET_SIZE
            )));
        }
        if let Some(group) = self.multicast_group {
            if !group.is_multicast() {
                return Err(TransportError::Config(format!(
                    "{} is not a multicast address",
                    group
                )));
            }
            if !self.bind.is_ipv6() {
                return Err(TransportError::Config(format!(
                    "joining {} needs an IPv6 bind address, got {}",
                    group, self.bind
                )));
            }
        }
        Ok(())
    }

    /// Delay after `current` failed, doubling up to the configured cap
    pub fn next_retry(&self, current: Duration) -> Duration {
        current.saturating_mul(2).min(self.retry_max())
    }
}

fn group_or_none<'de, D>(deserializer: D) -> std::result::Result<Option<Ipv6Addr>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(text) if !text.is_empty() => text.parse().map(Some).map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ChannelConfig::default();
        assert_eq!(config.bind, "[::]:61616".parse().unwrap());
        assert_eq!(config.multicast_group, Some("ff02::1".parse().unwrap()));
        assert_eq!(config.recv_timeout(), Duration::from_millis(3000));
        assert_eq!(config.retry_initial(), Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_retry_doubles_until_cap() {
        let config = ChannelConfig::default();
        let mut delay = config.retry_initial();
        let mut seen = Vec::new();
        for _ in 0..6 {
            seen.push(delay.as_secs());
            delay = config.next_retry(delay);
        }
        assert_eq!(seen, vec![5, 10, 20, 40, 60, 60]);
    }

    #[test]
    fn test_unicast_skips_group() {
        let config = ChannelConfig::unicast("127.0.0.1:0".parse().unwrap());
        assert_eq!(config.multicast_group, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = ChannelConfig::default();
        config.multicast_group = Some("fe80::1".parse().unwrap());
        assert!(matches!(config.validate(), Err(TransportError::Config(_))));

        let mut config = ChannelConfig::default();
        config.bind = "0.0.0.0:61616".parse().unwrap();
        assert!(config.validate().is_err());

        let mut config = ChannelConfig::default();
        config.retry_max_ms = 10;
        assert!(config.validate().is_err());

        let mut config = ChannelConfig::default();
        config.max_packet_size = 64;
        assert!(config.validate().is_err());
    }
}
