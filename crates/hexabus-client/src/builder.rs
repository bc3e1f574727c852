//! Client builder pattern

use hexabus_transport::ChannelConfig;
use std::net::{Ipv6Addr, SocketAddr};
use std::time::Duration;

use crate::device::DEFAULT_EVENT_CAPACITY;
use crate::{Hexabus, Result};

/// Builder for [`Hexabus`]
#[derive(Debug, Clone)]
pub struct HexabusBuilder {
    config: ChannelConfig,
    event_capacity: usize,
}

impl Default for HexabusBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HexabusBuilder {
    pub fn new() -> Self {
        Self {
            config: ChannelConfig::default(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }

    /// Replace the whole channel configuration
    pub fn config(mut self, config: ChannelConfig) -> Self {
        self.config = config;
        self
    }

    /// Local address to bind
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.config.bind = addr;
        self
    }

    /// Multicast group to join, `None` for unicast only
    pub fn multicast_group(mut self, group: Option<Ipv6Addr>) -> Self {
        self.config.multicast_group = group;
        self
    }

    /// IPv6 interface index for the group join
    pub fn interface(mut self, index: u32) -> Self {
        self.config.interface = index;
        self
    }

    /// How long the channel waits for a datagram before resending
    pub fn recv_timeout(mut self, timeout: Duration) -> Self {
        self.config.recv_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Buffer size of discovery and endpoint event streams
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Build and start the channel
    pub async fn open(self) -> Result<Hexabus> {
        Hexabus::start(self.config, self.event_capacity)
    }
}
