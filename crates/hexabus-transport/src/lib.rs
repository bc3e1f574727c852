//! Hexabus Transport Layer
//!
//! The UDP side of the bus: a single [`MulticastChannel`] bound to the
//! Hexabus port, shared by every device session. Sessions plug in as
//! [`PacketHandler`]s keyed by remote address in a [`ListenerRegistry`].

pub mod channel;
pub mod config;
pub mod error;
pub mod listeners;
pub mod traits;

pub use channel::MulticastChannel;
pub use config::ChannelConfig;
pub use error::{Result, TransportError};
pub use listeners::ListenerRegistry;
pub use traits::PacketHandler;
