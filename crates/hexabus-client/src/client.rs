//! Hexabus client facade

use hexabus_transport::{ChannelConfig, MulticastChannel, PacketHandler};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

use crate::builder::HexabusBuilder;
use crate::device::Device;
use crate::error::Result;
use crate::events::DeviceEvent;
use crate::manager::DeviceManager;
use crate::plug::SmartPlug;

/// A running Hexabus stack: one channel plus every device session on it
pub struct Hexabus {
    channel: MulticastChannel,
    manager: Arc<DeviceManager>,
}

impl Hexabus {
    pub fn builder() -> HexabusBuilder {
        HexabusBuilder::new()
    }

    /// Open with the default configuration (`[::]:61616`, group `ff02::1`)
    pub async fn open() -> Result<Self> {
        HexabusBuilder::new().open().await
    }

    pub(crate) fn start(config: ChannelConfig, event_capacity: usize) -> Result<Self> {
        let manager = Arc::new(DeviceManager::new(event_capacity));
        let channel = MulticastChannel::new(
            config,
            Arc::clone(&manager) as Arc<dyn PacketHandler>,
        )?;
        channel.open()?;

        info!("Hexabus started on {}", channel.config().bind);
        Ok(Self { channel, manager })
    }

    pub fn device(&self, remote: &SocketAddr) -> Option<Arc<Device>> {
        self.manager.device(remote)
    }

    pub fn devices(&self) -> Vec<Arc<Device>> {
        self.manager.devices()
    }

    /// Session for a device known up-front. Discovery starts right away
    /// instead of waiting for the device to speak first.
    pub fn connect(&self, remote: SocketAddr) -> Arc<Device> {
        let device = self.manager.get_or_create(remote, self.channel.listeners());
        self.channel.listeners().wake();
        device
    }

    /// [`connect`](Self::connect), wrapped as a smart plug
    pub fn plug(&self, remote: SocketAddr) -> SmartPlug {
        SmartPlug::new(self.connect(remote))
    }

    pub fn discoveries(&self) -> broadcast::Receiver<DeviceEvent> {
        self.manager.subscribe()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.channel.local_addr()
    }

    pub fn is_open(&self) -> bool {
        self.channel.is_running()
    }

    /// Stop the channel. Sessions keep their cached endpoints.
    pub async fn close(&self) -> Result<()> {
        self.channel.close().await?;
        info!("Hexabus stopped");
        Ok(())
    }
}

impl std::fmt::Debug for Hexabus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hexabus")
            .field("channel", &self.channel)
            .field("devices", &self.manager.len())
            .finish()
    }
}
