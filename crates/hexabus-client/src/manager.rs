//! Device manager
//!
//! The channel's fallback handler. A packet from a remote without a session
//! creates one, registers it with the channel and hands it the packet.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use hexabus_core::Packet;
use hexabus_transport::{ListenerRegistry, PacketHandler};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

use crate::device::Device;
use crate::events::DeviceEvent;

/// Owns every device session on the bus
pub struct DeviceManager {
    devices: DashMap<SocketAddr, Arc<Device>>,
    discoveries: broadcast::Sender<DeviceEvent>,
    event_capacity: usize,
}

impl DeviceManager {
    /// `event_capacity` bounds both the discovery stream and every session's
    /// endpoint event stream
    pub fn new(event_capacity: usize) -> Self {
        let (discoveries, _) = broadcast::channel(event_capacity.max(1));
        Self {
            devices: DashMap::new(),
            discoveries,
            event_capacity,
        }
    }

    pub fn device(&self, remote: &SocketAddr) -> Option<Arc<Device>> {
        self.devices.get(remote).map(|d| Arc::clone(d.value()))
    }

    /// Every session, ordered by remote address
    pub fn devices(&self) -> Vec<Arc<Device>> {
        let mut devices: Vec<Arc<Device>> =
            self.devices.iter().map(|d| Arc::clone(d.value())).collect();
        devices.sort_by_key(|d| d.remote());
        devices
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.discoveries.subscribe()
    }

    /// Session for `remote`, creating and registering it on first use.
    ///
    /// A known session whose listener was removed is registered again.
    pub fn get_or_create(&self, remote: SocketAddr, listeners: &ListenerRegistry) -> Arc<Device> {
        let device = match self.devices.entry(remote) {
            Entry::Occupied(entry) => {
                let device = Arc::clone(entry.get());
                listeners.register(remote, Arc::clone(&device) as Arc<dyn PacketHandler>);
                return device;
            }
            Entry::Vacant(entry) => {
                let device = Arc::new(Device::with_waker(
                    remote,
                    self.event_capacity,
                    listeners.waker(),
                ));
                entry.insert(Arc::clone(&device));
                device
            }
        };

        listeners.register(remote, Arc::clone(&device) as Arc<dyn PacketHandler>);
        info!("Discovered device {}", remote);
        let _ = self.discoveries.send(DeviceEvent::Discovered(remote));
        device
    }
}

impl PacketHandler for DeviceManager {
    fn handle_packet(&self, packet: Packet, listeners: &ListenerRegistry) -> bool {
        let device = self.get_or_create(packet.remote, listeners);
        device.handle_packet(packet, listeners)
    }

    fn next_request(&self) -> Option<Packet> {
        None
    }
}
