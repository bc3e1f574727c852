//! Hexabus Core
//!
//! Core types and wire encoding for the Hexabus home-automation protocol.
//!
//! This crate provides:
//! - Packet types ([`Packet`], [`Payload`], [`ErrorCode`])
//! - Typed endpoint values ([`Data`], [`Value`], [`DataKind`])
//! - Binary frame encoding/decoding ([`Codec`])
//! - The frame checksum ([`checksum::crc16`])
//! - Wire-code lookup tables ([`TypeRegistry`])
//!
//! Nothing in here performs I/O; see `hexabus-transport` for the socket side.

pub mod checksum;
pub mod codec;
pub mod data;
pub mod error;
pub mod packet;
pub mod registry;

pub use codec::{Codec, HexDump};
pub use data::{Data, DataKind, DateTime, Value, TEXT_LEN};
pub use error::{Error, Result};
pub use packet::{ErrorCode, Packet, PacketKind, Payload};
pub use registry::{Coded, TypeRegistry};

use std::net::Ipv6Addr;

/// Frame magic, "HX0B"
pub const MAGIC: u32 = 0x4858_3042;

/// Largest frame on the wire: an `EndpointInfo` with a full text payload
pub const MAX_PACKET_SIZE: usize = 138;

/// UDP port devices listen and answer on
pub const DEFAULT_PORT: u16 = 61616;

/// Link-local all-nodes group the bus is reachable on
pub const MULTICAST_GROUP: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 1);
