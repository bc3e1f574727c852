//! Hexabus Client Library
//!
//! Device sessions on top of the multicast channel. Every remote that talks
//! on the bus (or that the caller connects to) gets a [`Device`] session that
//! discovers its endpoints, caches their values and serializes requests.
//!
//! # Example
//!
//! ```ignore
//! use hexabus_client::{Hexabus, EndpointEvent};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let bus = Hexabus::open().await?;
//!     let plug = bus.plug("[fe80::50:c4ff:fe04:819a%2]:61616".parse()?);
//!
//!     let mut events = plug.device().subscribe();
//!     while let Ok(EndpointEvent::Updated { endpoint, .. }) = events.recv().await {
//!         println!("{}", endpoint);
//!     }
//!
//!     bus.close().await?;
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod client;
pub mod device;
pub mod endpoint;
pub mod error;
pub mod events;
pub mod manager;
pub mod plug;

pub use builder::HexabusBuilder;
pub use client::Hexabus;
pub use device::{Device, DEFAULT_EVENT_CAPACITY, DEFAULT_QUERY_TIMEOUT};
pub use endpoint::{Endpoint, EndpointRole};
pub use error::{ClientError, Result};
pub use events::{DeviceEvent, EndpointEvent};
pub use manager::DeviceManager;
pub use plug::SmartPlug;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::builder::HexabusBuilder;
    pub use crate::client::Hexabus;
    pub use crate::device::Device;
    pub use crate::endpoint::{Endpoint, EndpointRole};
    pub use crate::error::{ClientError, Result};
    pub use crate::events::{DeviceEvent, EndpointEvent};
    pub use crate::plug::SmartPlug;
    pub use hexabus_core::{Data, DataKind, Value};
    pub use hexabus_transport::ChannelConfig;
}
