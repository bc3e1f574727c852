//! Protocol packets

use crate::data::{Data, DataKind};
use crate::registry::Coded;
use std::fmt;
use std::net::SocketAddr;

/// Packet kind codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketKind {
    Error = 0,
    Info = 1,
    Query = 2,
    Write = 4,
    EndpointInfo = 9,
    EndpointQuery = 10,
}

impl PacketKind {
    pub const ALL: [PacketKind; 6] = [
        PacketKind::EndpointInfo,
        PacketKind::EndpointQuery,
        PacketKind::Error,
        PacketKind::Info,
        PacketKind::Query,
        PacketKind::Write,
    ];
}

impl Coded for PacketKind {
    fn code(&self) -> u8 {
        *self as u8
    }
}

/// Error codes carried by [`Payload::Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorCode {
    UnknownEid = 1,
    WriteReadOnly = 2,
    CrcFailed = 3,
    DataType = 4,
}

impl ErrorCode {
    pub fn from_u8(code: u8) -> Option<Self> {
        match code {
            1 => Some(ErrorCode::UnknownEid),
            2 => Some(ErrorCode::WriteReadOnly),
            3 => Some(ErrorCode::CrcFailed),
            4 => Some(ErrorCode::DataType),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCode::UnknownEid => "unknown eid",
            ErrorCode::WriteReadOnly => "write to read-only endpoint",
            ErrorCode::CrcFailed => "crc failed",
            ErrorCode::DataType => "data type mismatch",
        };
        f.write_str(name)
    }
}

/// Kind-specific packet contents
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Ask for the declared kind and description of an endpoint
    EndpointQuery { eid: u8 },
    /// Declared kind and description of an endpoint
    EndpointInfo {
        eid: u8,
        kind: DataKind,
        description: String,
    },
    /// Ask for the current value of an endpoint
    Query { eid: u8 },
    /// Current value of an endpoint, solicited or not
    Info(Data),
    /// Set the value of an endpoint
    Write(Data),
    /// Failure response
    Error(ErrorCode),
}

impl Payload {
    pub fn kind(&self) -> PacketKind {
        match self {
            Payload::EndpointQuery { .. } => PacketKind::EndpointQuery,
            Payload::EndpointInfo { .. } => PacketKind::EndpointInfo,
            Payload::Query { .. } => PacketKind::Query,
            Payload::Info(_) => PacketKind::Info,
            Payload::Write(_) => PacketKind::Write,
            Payload::Error(_) => PacketKind::Error,
        }
    }

    /// Endpoint id the payload refers to, if any
    pub fn eid(&self) -> Option<u8> {
        match self {
            Payload::EndpointQuery { eid }
            | Payload::EndpointInfo { eid, .. }
            | Payload::Query { eid } => Some(*eid),
            Payload::Info(data) | Payload::Write(data) => Some(data.eid),
            Payload::Error(_) => None,
        }
    }
}

/// A packet exchanged with a remote device.
///
/// Two packets are equal when remote, kind and payload all match; outgoing
/// queues rely on this to drop duplicate requests.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub remote: SocketAddr,
    pub payload: Payload,
}

impl Packet {
    pub fn new(remote: SocketAddr, payload: Payload) -> Self {
        Self { remote, payload }
    }

    pub fn endpoint_query(remote: SocketAddr, eid: u8) -> Self {
        Self::new(remote, Payload::EndpointQuery { eid })
    }

    pub fn endpoint_info(
        remote: SocketAddr,
        eid: u8,
        kind: DataKind,
        description: impl Into<String>,
    ) -> Self {
        Self::new(
            remote,
            Payload::EndpointInfo {
                eid,
                kind,
                description: description.into(),
            },
        )
    }

    pub fn query(remote: SocketAddr, eid: u8) -> Self {
        Self::new(remote, Payload::Query { eid })
    }

    pub fn info(remote: SocketAddr, data: Data) -> Self {
        Self::new(remote, Payload::Info(data))
    }

    pub fn write(remote: SocketAddr, data: Data) -> Self {
        Self::new(remote, Payload::Write(data))
    }

    pub fn error(remote: SocketAddr, code: ErrorCode) -> Self {
        Self::new(remote, Payload::Error(code))
    }

    pub fn kind(&self) -> PacketKind {
        self.payload.kind()
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.payload {
            Payload::EndpointQuery { eid } => {
                write!(f, "EndpointQuery [{}] (eid={})", self.remote, eid)
            }
            Payload::EndpointInfo {
                eid,
                kind,
                description,
            } => write!(
                f,
                "EndpointInfo [{}] (eid={}, kind={}, {:?})",
                self.remote, eid, kind, description
            ),
            Payload::Query { eid } => write!(f, "Query [{}] (eid={})", self.remote, eid),
            Payload::Info(data) => write!(f, "Info [{}] ({})", self.remote, data),
            Payload::Write(data) => write!(f, "Write [{}] ({})", self.remote, data),
            Payload::Error(code) => write!(f, "Error [{}] ({})", self.remote, code),
        }
    }
}
