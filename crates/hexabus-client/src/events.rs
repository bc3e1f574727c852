//! Notifications published by sessions and the device manager

use hexabus_core::{ErrorCode, Packet};
use std::net::SocketAddr;

use crate::endpoint::Endpoint;

/// Per-device endpoint notification
#[derive(Debug, Clone, PartialEq)]
pub enum EndpointEvent {
    /// The device reported a value; `endpoint` carries it
    Updated {
        remote: SocketAddr,
        endpoint: Endpoint,
    },
    /// The device answered a request with an error other than a CRC failure.
    /// The request is not retried.
    Failed {
        remote: SocketAddr,
        request: Option<Packet>,
        code: ErrorCode,
    },
}

impl EndpointEvent {
    pub fn remote(&self) -> SocketAddr {
        match self {
            EndpointEvent::Updated { remote, .. } | EndpointEvent::Failed { remote, .. } => *remote,
        }
    }
}

/// Bus-wide notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceEvent {
    /// A session was created for a remote not seen before
    Discovered(SocketAddr),
}
