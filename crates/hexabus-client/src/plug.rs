//! Smart plug convenience wrapper
//!
//! Hexabus sockets expose their relay as a Bool at eid 1 and the measured
//! load as a UInt32 (watts) at eid 2.

use hexabus_core::Data;
use std::sync::Arc;
use std::time::Duration;

use crate::device::Device;
use crate::error::Result;

pub const SWITCH_EID: u8 = 1;
pub const POWER_EID: u8 = 2;

#[derive(Debug, Clone)]
pub struct SmartPlug {
    device: Arc<Device>,
}

impl SmartPlug {
    pub fn new(device: Arc<Device>) -> Self {
        Self { device }
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    /// Both plug endpoints have been discovered
    pub fn is_ready(&self) -> bool {
        self.device.endpoint(SWITCH_EID).is_some() && self.device.endpoint(POWER_EID).is_some()
    }

    /// Queue a relay write; false until the switch endpoint is known
    pub fn switch(&self, on: bool) -> bool {
        self.device.write(Data::bool(SWITCH_EID, on))
    }

    pub fn is_on(&self) -> Option<bool> {
        self.device.value(SWITCH_EID)?.as_bool()
    }

    pub fn power(&self) -> Option<u32> {
        self.device.value(POWER_EID)?.as_u32()
    }

    /// Ask for a fresh load reading and wait for it
    pub async fn read_power(&self, timeout: Duration) -> Result<Option<u32>> {
        let value = self.device.query_and_wait(POWER_EID, timeout).await?;
        Ok(value.as_u32())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hexabus_core::{DataKind, Packet};
    use hexabus_transport::{ListenerRegistry, PacketHandler};
    use std::net::SocketAddr;

    #[test]
    fn test_switch_needs_discovery() {
        let remote: SocketAddr = "[fe80::1]:61616".parse().unwrap();
        let device = Arc::new(Device::new(remote, 8));
        let plug = SmartPlug::new(Arc::clone(&device));
        let listeners = ListenerRegistry::new();

        assert!(!plug.switch(true));
        assert!(!plug.is_ready());

        device.handle_packet(
            Packet::endpoint_info(remote, SWITCH_EID, DataKind::Bool, "Main Switch"),
            &listeners,
        );
        device.handle_packet(
            Packet::endpoint_info(remote, POWER_EID, DataKind::UInt32, "Power Meter"),
            &listeners,
        );
        device.handle_packet(Packet::info(remote, Data::uint32(POWER_EID, 230)), &listeners);

        assert!(plug.is_ready());
        assert!(plug.switch(true));
        assert_eq!(plug.is_on(), None);
        assert_eq!(plug.power(), Some(230));
        assert!(device
            .queued_requests()
            .contains(&Packet::write(remote, Data::bool(SWITCH_EID, true))));
    }
}
